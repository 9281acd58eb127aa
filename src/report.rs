use sha2::{Digest, Sha256};
use std::collections::HashSet;

use crate::finding::{Finding, Report};

/// Canonical JSON emission, matching the teacher's `--format json`
/// convention throughout `output.rs`.
pub fn to_json(report: &Report) -> String {
    serde_json::to_string_pretty(report).unwrap_or_default()
}

/// `partialFingerprints.primaryLocationLineHash`: SHA-256 of
/// `ruleId:file:line` (or `ruleId:title` when file/line are unset),
/// truncated to 16 hex chars.
fn line_hash(finding: &Finding) -> String {
    let key = match (&finding.file, finding.line) {
        (Some(file), Some(line)) => format!("{}:{}:{}", finding.pattern_id, file, line),
        _ => format!("{}:{}", finding.pattern_id, finding.title),
    };
    let digest = Sha256::digest(key.as_bytes());
    hex::encode(digest)[..16].to_string()
}

fn generate_rules(findings: &[Finding]) -> Vec<serde_json::Value> {
    let mut seen = HashSet::new();
    findings
        .iter()
        .filter_map(|f| {
            if seen.insert(f.pattern_id.clone()) {
                Some(serde_json::json!({
                    "id": f.pattern_id,
                    "shortDescription": { "text": f.title.chars().take(100).collect::<String>() },
                    "fullDescription": { "text": f.description },
                    "defaultConfiguration": { "level": f.severity.sarif_level() },
                    "properties": {
                        "security-severity": f.severity.security_severity_score().to_string(),
                        "category": f.category.to_string(),
                        "cwe": f.cwe_id,
                    }
                }))
            } else {
                None
            }
        })
        .collect()
}

fn result_entry(finding: &Finding) -> serde_json::Value {
    let mut locations = serde_json::json!([]);
    if let Some(file) = &finding.file {
        let artifact_location = serde_json::json!({ "uri": file, "uriBaseId": "%SRCROOT%" });
        let mut physical_location = serde_json::json!({ "artifactLocation": artifact_location });
        if let Some(line) = finding.line {
            physical_location["region"] = serde_json::json!({ "startLine": line });
        }
        locations = serde_json::json!([{ "physicalLocation": physical_location }]);
    }

    let mut entry = serde_json::json!({
        "ruleId": finding.pattern_id,
        "level": finding.severity.sarif_level(),
        "message": { "text": finding.title },
        "locations": locations,
        "partialFingerprints": {
            "primaryLocationLineHash": line_hash(finding)
        },
        "properties": {
            "confidence": format!("{:?}", finding.confidence).to_lowercase(),
            "verification_status": format!("{:?}", finding.verification_status).to_lowercase(),
        }
    });

    if !finding.content.is_empty() {
        if let Some(locs) = entry["locations"].as_array_mut() {
            if let Some(first) = locs.get_mut(0) {
                first["physicalLocation"]["region"]["snippet"] = serde_json::json!({ "text": finding.content });
            }
        }
    }

    if !finding.remediation.is_empty() {
        entry["fixes"] = serde_json::json!([{
            "description": { "text": finding.remediation }
        }]);
    }

    if finding.by_design {
        entry["suppressions"] = serde_json::json!([{ "kind": "inSource", "justification": "marked by_design" }]);
    }

    entry
}

/// SARIF 2.1.0 emission, extending the teacher's `print_scan_sarif` /
/// `generate_rules` to the richer schema spec.md §6 requires.
pub fn to_sarif(report: &Report, target: &str) -> String {
    let sarif = serde_json::json!({
        "$schema": "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/main/sarif-2.1/schema/sarif-schema-2.1.0.json",
        "version": "2.1.0",
        "runs": [{
            "tool": {
                "driver": {
                    "name": "AgentAudit",
                    "version": env!("CARGO_PKG_VERSION"),
                    "informationUri": "https://github.com/agentaudit/agentaudit",
                    "rules": generate_rules(&report.findings),
                }
            },
            "results": report.findings.iter().map(result_entry).collect::<Vec<_>>(),
            "invocations": [{
                "executionSuccessful": true,
                "properties": {
                    "riskScore": report.risk_score,
                    "result": format!("{:?}", report.result).to_lowercase(),
                    "findingsCount": report.findings_count,
                    "durationMs": report.duration_ms,
                }
            }],
            "artifacts": [{
                "location": { "uri": target, "uriBaseId": "%SRCROOT%" }
            }]
        }]
    });

    serde_json::to_string_pretty(&sarif).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::{Category, Severity};

    #[test]
    fn line_hash_is_deterministic() {
        let f = Finding::new("X", Category::injection(), Severity::High, "t").with_location("a.py", Some(5));
        assert_eq!(line_hash(&f), line_hash(&f));
        assert_eq!(line_hash(&f).len(), 16);
    }

    #[test]
    fn line_hash_falls_back_to_title_without_location() {
        let f = Finding::new("X", Category::injection(), Severity::High, "some title");
        let hash = line_hash(&f);
        assert_eq!(hash.len(), 16);
    }

    #[test]
    fn by_design_findings_get_a_suppression() {
        let mut f = Finding::new("X", Category::injection(), Severity::Low, "t");
        f.by_design = true;
        let entry = result_entry(&f);
        assert!(entry.get("suppressions").is_some());
    }
}
