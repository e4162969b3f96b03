// SPDX-License-Identifier: MIT

//! Memory retrieval ranking (C8): given a query finding, score every index
//! entry, drop anything with zero relevance, and return the top-k with
//! source citations for prompt injection.

use rf_core::{DataSource, Finding, MemoryGraph, MemoryIndexEntry, Outcome};

/// A ranked memory item plus the citation text the prompt builder quotes
/// verbatim.
#[derive(Debug, Clone)]
pub struct RetrievedMemory {
    pub item_id: String,
    pub score: f64,
    pub citation: String,
}

/// Score one index entry against `query`. Returns 0.0 (excluded by the
/// caller) when neither category nor service matches — the zero-relevance
/// gate.
fn score(entry: &MemoryIndexEntry, query: &Finding, now: chrono::DateTime<chrono::Utc>) -> f64 {
    let category_match = entry.category == query.category;
    let service_match = entry.service == query.service_name;
    if !category_match && !service_match {
        return 0.0;
    }

    let mut total = 0.0;
    if category_match {
        total += 10.0;
    }
    if service_match {
        total += 5.0;
    }
    if entry.severity == query.severity {
        total += 2.0;
    }
    total += entry.confidence.bonus();
    if entry.data_source == DataSource::Live {
        total += 2.0;
    }
    if entry.outcome == Outcome::Success {
        total += 3.0;
    }

    let age_days = (now - entry.created_at).num_seconds().max(0) as f64 / 86_400.0;
    total * 0.5f64.powf(age_days / 30.0)
}

fn citation(entry: &MemoryIndexEntry) -> String {
    let mut citation = format!("run {} ({})", entry.run_id, entry.data_source);
    if entry.data_source == DataSource::Mock {
        citation.push_str(" — simulated data, not a real remediation");
    }
    citation
}

/// Rank every entry in `graph` against `query`, drop zero-relevance items,
/// and return the top `top_k` by score descending.
pub fn retrieve(
    graph: &MemoryGraph,
    query: &Finding,
    now: chrono::DateTime<chrono::Utc>,
    top_k: usize,
) -> Vec<RetrievedMemory> {
    let mut scored: Vec<RetrievedMemory> = graph
        .items
        .iter()
        .filter_map(|entry| {
            let s = score(entry, query, now);
            (s > 0.0).then(|| RetrievedMemory {
                item_id: entry.id.clone(),
                score: s,
                citation: citation(entry),
            })
        })
        .collect();
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use rf_core::{Category, Confidence, FindingId, Severity};

    fn query(category: Category, service: &str, severity: Severity) -> Finding {
        Finding {
            id: FindingId::new("f-query"),
            scanner: "semgrep".into(),
            category,
            severity,
            title: "t".into(),
            description: "d".into(),
            service_name: service.into(),
            repo_url: "https://repo".into(),
            file_path: "a.py".into(),
            line_number: None,
            cwe_id: None,
            dependency_name: None,
            current_version: None,
            fixed_version: None,
            language: None,
            priority_score: 0,
        }
    }

    fn entry(
        id: &str,
        category: Category,
        service: &str,
        severity: Severity,
        outcome: Outcome,
        confidence: Confidence,
        data_source: DataSource,
        age_days: i64,
        now: chrono::DateTime<chrono::Utc>,
    ) -> MemoryIndexEntry {
        MemoryIndexEntry {
            id: id.to_string(),
            run_id: "run-1".to_string(),
            category,
            service: service.to_string(),
            severity,
            outcome,
            confidence,
            data_source,
            created_at: now - chrono::Duration::days(age_days),
        }
    }

    #[test]
    fn zero_relevance_items_are_excluded() {
        let now = chrono::Utc::now();
        let graph = MemoryGraph {
            items: vec![entry(
                "a",
                Category::Xss,
                "svc-other",
                Severity::Low,
                Outcome::Success,
                Confidence::Low,
                DataSource::Mock,
                0,
                now,
            )],
            same_category: vec![],
            same_service: vec![],
        };
        let results = retrieve(&graph, &query(Category::SqlInjection, "svc", Severity::High), now, 5);
        assert!(results.is_empty());
    }

    #[test]
    fn results_sorted_by_score_descending() {
        let now = chrono::Utc::now();
        let weak = entry(
            "weak",
            Category::SqlInjection,
            "other-svc",
            Severity::Low,
            Outcome::Failed,
            Confidence::Low,
            DataSource::Mock,
            60,
            now,
        );
        let strong = entry(
            "strong",
            Category::SqlInjection,
            "svc",
            Severity::High,
            Outcome::Success,
            Confidence::High,
            DataSource::Live,
            0,
            now,
        );
        let graph = MemoryGraph {
            items: vec![weak, strong],
            same_category: vec![],
            same_service: vec![],
        };
        let results = retrieve(&graph, &query(Category::SqlInjection, "svc", Severity::High), now, 5);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].item_id, "strong");
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn mock_items_carry_a_warning_in_citation() {
        let now = chrono::Utc::now();
        let graph = MemoryGraph {
            items: vec![entry(
                "a",
                Category::Xss,
                "svc",
                Severity::High,
                Outcome::Success,
                Confidence::High,
                DataSource::Mock,
                0,
                now,
            )],
            same_category: vec![],
            same_service: vec![],
        };
        let results = retrieve(&graph, &query(Category::Xss, "svc", Severity::High), now, 5);
        assert!(results[0].citation.contains("simulated"));
    }

    #[test]
    fn top_k_truncates_results() {
        let now = chrono::Utc::now();
        let items: Vec<MemoryIndexEntry> = (0..10)
            .map(|i| {
                entry(
                    &format!("item-{i}"),
                    Category::Xss,
                    "svc",
                    Severity::High,
                    Outcome::Success,
                    Confidence::High,
                    DataSource::Live,
                    i,
                    now,
                )
            })
            .collect();
        let graph = MemoryGraph {
            items,
            same_category: vec![],
            same_service: vec![],
        };
        let results = retrieve(&graph, &query(Category::Xss, "svc", Severity::High), now, 3);
        assert_eq!(results.len(), 3);
    }
}
