// SPDX-License-Identifier: MIT

//! Prompt construction (C5): builds the per-finding prompt text, including
//! an optional memory-context block with source citations.

use crate::memory::RetrievedMemory;
use rf_core::Finding;

/// Build the prompt sent to `create_session` for `finding`, optionally
/// prefixed with a memory-context block drawn from prior runs.
pub fn build_prompt(finding: &Finding, memories: &[RetrievedMemory], narratives: &[(String, String)]) -> String {
    let mut prompt = String::new();

    if !memories.is_empty() {
        prompt.push_str("## Prior remediation context\n\n");
        for memory in memories {
            let narrative = narratives
                .iter()
                .find(|(id, _)| id == &memory.item_id)
                .map(|(_, body)| body.as_str())
                .unwrap_or("");
            prompt.push_str(&format!("### Source: {}\n\n{narrative}\n\n", memory.citation));
        }
    }

    prompt.push_str("## Finding\n\n");
    prompt.push_str(&format!("- id: {}\n", finding.id));
    prompt.push_str(&format!("- service: {}\n", finding.service_name));
    prompt.push_str(&format!("- category: {}\n", finding.category));
    prompt.push_str(&format!("- severity: {}\n", finding.severity));
    prompt.push_str(&format!(
        "- location: {}{}\n",
        finding.file_path,
        finding
            .line_number
            .map(|l| format!(":{l}"))
            .unwrap_or_default()
    ));
    if let Some(cwe) = &finding.cwe_id {
        prompt.push_str(&format!("- cwe: {cwe}\n"));
    }
    if let Some(dep) = &finding.dependency_name {
        prompt.push_str(&format!("- dependency: {dep}"));
        if let (Some(current), Some(fixed)) = (&finding.current_version, &finding.fixed_version) {
            prompt.push_str(&format!(" ({current} -> {fixed})"));
        }
        prompt.push('\n');
    }
    if let Some(language) = &finding.language {
        prompt.push_str(&format!("- language: {language}\n"));
    }
    prompt.push_str(&format!("\n{}\n\n{}\n\n", finding.title, finding.description));

    prompt.push_str(
        "Emit structured output at every stage with finding_id, status, progress_pct, \
         and current_step populated, plus fix_approach, files_modified, tests_passed, \
         tests_added, pr_url, error_message, and confidence as they become known.",
    );

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use rf_core::{Category, FindingId, Severity};

    fn finding() -> Finding {
        Finding {
            id: FindingId::new("f-1"),
            scanner: "semgrep".into(),
            category: Category::SqlInjection,
            severity: Severity::High,
            title: "SQL injection in query builder".into(),
            description: "user input concatenated into query".into(),
            service_name: "payments".into(),
            repo_url: "https://example/repo".into(),
            file_path: "app/db.py".into(),
            line_number: Some(42),
            cwe_id: Some("CWE-89".into()),
            dependency_name: None,
            current_version: None,
            fixed_version: None,
            language: Some("python".into()),
            priority_score: 85,
        }
    }

    #[test]
    fn prompt_includes_core_finding_fields() {
        let prompt = build_prompt(&finding(), &[], &[]);
        assert!(prompt.contains("f-1"));
        assert!(prompt.contains("payments"));
        assert!(prompt.contains("sql_injection"));
        assert!(prompt.contains("app/db.py:42"));
        assert!(prompt.contains("CWE-89"));
        assert!(prompt.contains("structured output"));
    }

    #[test]
    fn memory_context_is_injected_with_citation() {
        let memories = vec![RetrievedMemory {
            item_id: "run-0-f-0".to_string(),
            score: 12.0,
            citation: "run run-0 (live)".to_string(),
        }];
        let narratives = vec![("run-0-f-0".to_string(), "parameterized the query".to_string())];
        let prompt = build_prompt(&finding(), &memories, &narratives);
        assert!(prompt.contains("Prior remediation context"));
        assert!(prompt.contains("run run-0 (live)"));
        assert!(prompt.contains("parameterized the query"));
    }
}
