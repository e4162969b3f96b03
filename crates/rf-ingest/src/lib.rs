// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rf-ingest: the CSV wire format for scanner findings — parsing, row
//! validation, dedup, and priority scoring. A pure, filesystem-free
//! pipeline so the boundary HTTP surface and the preflight check can both
//! call it against an in-memory buffer.

mod raw_row;
mod score;

pub use raw_row::RawRow;
pub use score::ServiceWeights;

use rf_core::{Category, Finding, FindingId, Severity};
use std::collections::HashMap;
use std::io::Read;
use thiserror::Error;

pub const REQUIRED_COLUMNS: [&str; 9] = [
    "finding_id",
    "scanner",
    "category",
    "severity",
    "title",
    "description",
    "service_name",
    "repo_url",
    "file_path",
];

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("missing required column: {0}")]
    MissingColumn(String),
    #[error("CSV has no data rows")]
    EmptyData,
    #[error("CSV exceeds the maximum row count of {max}")]
    TooManyRows { max: usize },
    #[error("malformed CSV: {0}")]
    Malformed(String),
}

/// Parse a CSV buffer into deduplicated, priority-scored findings, sorted
/// by priority descending. Rows with an unparseable `category` or
/// `severity` are dropped (logged, not fatal to the whole ingest). `max_rows`
/// bounds the number of data rows accepted before the whole upload is
/// rejected — the boundary surface's 5000-row cap.
pub fn parse_csv<R: Read>(
    reader: R,
    service_weights: &ServiceWeights,
    max_rows: usize,
) -> Result<Vec<Finding>, IngestError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|err| IngestError::Malformed(err.to_string()))?
        .clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(IngestError::MissingColumn(column.to_string()));
        }
    }

    let mut by_key: HashMap<(String, String, Option<u32>, Category), Finding> = HashMap::new();
    let mut row_count = 0usize;
    let mut order: Vec<(String, String, Option<u32>, Category)> = Vec::new();

    for record in rdr.deserialize::<RawRow>() {
        row_count += 1;
        if row_count > max_rows {
            return Err(IngestError::TooManyRows { max: max_rows });
        }
        let row = record.map_err(|err| IngestError::Malformed(err.to_string()))?;

        let Some(category) = Category::parse(&row.category) else {
            tracing::warn!(finding_id = %row.finding_id, category = %row.category, "dropping row with unrecognized category");
            continue;
        };
        let Some(severity) = Severity::parse(&row.severity) else {
            tracing::warn!(finding_id = %row.finding_id, severity = %row.severity, "dropping row with unrecognized severity");
            continue;
        };

        let service_weight = service_weights.weight_for(&row.service_name);
        let priority_score = severity.weight() + category.weight() + service_weight;

        let finding = Finding {
            id: FindingId::new(row.finding_id),
            scanner: row.scanner,
            category,
            severity,
            title: row.title,
            description: row.description,
            service_name: row.service_name,
            repo_url: row.repo_url,
            file_path: row.file_path,
            line_number: row.line_number,
            cwe_id: non_empty(row.cwe_id),
            dependency_name: non_empty(row.dependency_name),
            current_version: non_empty(row.current_version),
            fixed_version: non_empty(row.fixed_version),
            language: non_empty(row.language),
            priority_score,
        };

        let key = finding.dedup_key();
        match by_key.get(&key) {
            Some(existing) if existing.severity >= finding.severity => {
                // Lower- or equal-severity duplicate loses; keep the incumbent.
            }
            _ => {
                if !by_key.contains_key(&key) {
                    order.push(key.clone());
                }
                by_key.insert(key, finding);
            }
        }
    }

    if row_count == 0 {
        return Err(IngestError::EmptyData);
    }

    let mut findings: Vec<Finding> = order
        .into_iter()
        .filter_map(|key| by_key.remove(&key))
        .collect();
    findings.sort_by(|a, b| b.priority_score.cmp(&a.priority_score));
    Ok(findings)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "finding_id,scanner,category,severity,title,description,service_name,repo_url,file_path,line_number,cwe_id,dependency_name,current_version,fixed_version,language";

    fn row(id: &str, category: &str, severity: &str, service: &str, file: &str, line: &str) -> String {
        format!("{id},semgrep,{category},{severity},t,d,{service},https://repo,{file},{line},,,,,")
    }

    #[test]
    fn missing_required_column_is_rejected() {
        let csv = "finding_id,scanner\nf-1,semgrep\n";
        let err = parse_csv(csv.as_bytes(), &ServiceWeights::default(), 5000).unwrap_err();
        assert!(matches!(err, IngestError::MissingColumn(col) if col == "category"));
    }

    #[test]
    fn zero_data_rows_is_rejected() {
        let csv = format!("{HEADER}\n");
        let err = parse_csv(csv.as_bytes(), &ServiceWeights::default(), 5000).unwrap_err();
        assert!(matches!(err, IngestError::EmptyData));
    }

    #[test]
    fn too_many_rows_is_rejected() {
        let mut csv = format!("{HEADER}\n");
        for i in 0..3 {
            csv.push_str(&row(&format!("f-{i}"), "xss", "high", "svc", "a.py", "1"));
            csv.push('\n');
        }
        let err = parse_csv(csv.as_bytes(), &ServiceWeights::default(), 2).unwrap_err();
        assert!(matches!(err, IngestError::TooManyRows { max: 2 }));
    }

    #[test]
    fn invalid_category_row_is_dropped_not_fatal() {
        let mut csv = format!("{HEADER}\n");
        csv.push_str(&row("f-1", "not_a_category", "high", "svc", "a.py", "1"));
        csv.push('\n');
        csv.push_str(&row("f-2", "xss", "high", "svc", "b.py", "2"));
        csv.push('\n');
        let findings = parse_csv(csv.as_bytes(), &ServiceWeights::default(), 5000).expect("parse");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].id.as_str(), "f-2");
    }

    #[test]
    fn duplicate_key_keeps_higher_severity() {
        let mut csv = format!("{HEADER}\n");
        csv.push_str(&row("f-1", "xss", "low", "svc", "a.py", "1"));
        csv.push('\n');
        csv.push_str(&row("f-2", "xss", "critical", "svc", "a.py", "1"));
        csv.push('\n');
        let findings = parse_csv(csv.as_bytes(), &ServiceWeights::default(), 5000).expect("parse");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].id.as_str(), "f-2");
        assert_eq!(findings[0].severity, Severity::Critical);
    }

    #[test]
    fn results_are_sorted_by_priority_descending() {
        let mut csv = format!("{HEADER}\n");
        csv.push_str(&row("f-low", "other", "low", "svc", "a.py", "1"));
        csv.push('\n');
        csv.push_str(&row("f-high", "sql_injection", "critical", "svc", "b.py", "2"));
        csv.push('\n');
        let findings = parse_csv(csv.as_bytes(), &ServiceWeights::default(), 5000).expect("parse");
        assert_eq!(findings[0].id.as_str(), "f-high");
        assert_eq!(findings[1].id.as_str(), "f-low");
    }

    #[test]
    fn empty_optional_cells_map_to_none() {
        let mut csv = format!("{HEADER}\n");
        csv.push_str(&row("f-1", "xss", "high", "svc", "a.py", ""));
        csv.push('\n');
        let findings = parse_csv(csv.as_bytes(), &ServiceWeights::default(), 5000).expect("parse");
        assert_eq!(findings[0].line_number, None);
        assert_eq!(findings[0].cwe_id, None);
    }
}
