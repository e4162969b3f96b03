// SPDX-License-Identifier: MIT

//! The raw CSV row shape, deserialized before category/severity parsing and
//! priority scoring are applied.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct RawRow {
    pub finding_id: String,
    pub scanner: String,
    pub category: String,
    pub severity: String,
    pub title: String,
    pub description: String,
    pub service_name: String,
    pub repo_url: String,
    pub file_path: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub line_number: Option<u32>,
    #[serde(default)]
    pub cwe_id: Option<String>,
    #[serde(default)]
    pub dependency_name: Option<String>,
    #[serde(default)]
    pub current_version: Option<String>,
    #[serde(default)]
    pub fixed_version: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.map(|s| s.trim().to_string()) {
        Some(s) if !s.is_empty() => s
            .parse::<u32>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}
