//! Report diffing — compare two reports to identify new and resolved findings.

use crate::finding::{Finding, Report, ReportResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ScanDiff {
    pub new_findings: Vec<Finding>,
    pub resolved_findings: Vec<Finding>,
    pub unchanged_findings: Vec<Finding>,
    pub score_delta: i64,
    pub previous_result: ReportResult,
    pub current_result: ReportResult,
    pub summary: String,
}

fn same_finding(a: &Finding, b: &Finding) -> bool {
    a.pattern_id == b.pattern_id && a.file == b.file && a.line == b.line
}

/// Compare two reports and produce a diff, matching findings by
/// (pattern_id, file, line).
pub fn diff_scans(previous: &Report, current: &Report) -> ScanDiff {
    let mut new_findings = Vec::new();
    let mut resolved_findings = Vec::new();
    let mut unchanged_findings = Vec::new();

    for finding in &current.findings {
        let exists_in_previous = previous.findings.iter().any(|f| same_finding(f, finding));
        if exists_in_previous {
            unchanged_findings.push(finding.clone());
        } else {
            new_findings.push(finding.clone());
        }
    }

    for finding in &previous.findings {
        let exists_in_current = current.findings.iter().any(|f| same_finding(f, finding));
        if !exists_in_current {
            resolved_findings.push(finding.clone());
        }
    }

    let score_delta = current.risk_score as i64 - previous.risk_score as i64;
    let summary = format!(
        "{} new, {} resolved, {} unchanged (risk: {} -> {}, {}{})",
        new_findings.len(),
        resolved_findings.len(),
        unchanged_findings.len(),
        previous.risk_score,
        current.risk_score,
        if score_delta >= 0 { "+" } else { "" },
        score_delta,
    );

    ScanDiff {
        new_findings,
        resolved_findings,
        unchanged_findings,
        score_delta,
        previous_result: previous.result,
        current_result: current.result,
        summary,
    }
}
