// SPDX-License-Identifier: MIT

//! Category-to-playbook resolution. The playbook *content* is an external
//! collaborator (out of scope); this module only resolves a category to a
//! playbook id and validates that the corresponding file exists on disk.

use rf_core::{Category, Finding};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Playbook id for a category — currently just the category's wire name.
pub fn playbook_id(category: Category) -> String {
    category.to_string()
}

/// Path to the playbook file for a category, under `playbooks_dir`.
pub fn playbook_path(playbooks_dir: &Path, category: Category) -> PathBuf {
    playbooks_dir.join(format!("{category}.md"))
}

/// Every category referenced by `findings`, in a stable (alphabetical)
/// order, that has no corresponding playbook file under `playbooks_dir`.
pub fn missing_playbooks(playbooks_dir: &Path, findings: &[Finding]) -> Vec<String> {
    let categories: HashSet<Category> = findings.iter().map(|f| f.category).collect();
    let mut missing: Vec<String> = categories
        .into_iter()
        .filter(|category| !playbook_path(playbooks_dir, *category).is_file())
        .map(|category| category.to_string())
        .collect();
    missing.sort();
    missing
}
