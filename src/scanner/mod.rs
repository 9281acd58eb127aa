pub mod cloud_sigs;
pub mod rules;

use std::path::Path;

use crate::collector::collect;
use crate::finding::Finding;

/// Run the C3 pattern scanner over every collected file in `path`.
/// Findings are ordered by file then rule, mirroring collection order.
pub fn scan_patterns(path: &Path) -> Vec<Finding> {
    let (entries, _profile) = collect(path);
    let mut findings = Vec::new();
    for entry in &entries {
        findings.extend(rules::scan_file(&entry.path, &entry.content));
    }
    findings
}
