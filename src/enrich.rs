use once_cell::sync::Lazy;

use crate::finding::{sanitize_file_field, Confidence, FileEntry, Finding, Report, ReportResult, Severity};

const BACKSTOP_CWE: &str = "CWE-693";

/// pattern_id → CWE lookup, per §4.5 step 4. Keys mirror the pattern_ids
/// emitted by the C2/C3 rule packs; LLM-produced pattern_ids not in this
/// table fall back to the backstop.
static CWE_TABLE: Lazy<Vec<(&'static str, &'static str)>> = Lazy::new(|| {
    vec![
        ("CMD_INJECT", "CWE-78"),
        ("SHELL_EXEC", "CWE-78"),
        ("DYN_EVAL", "CWE-95"),
        ("HARDCODED_SECRET", "CWE-798"),
        ("TLS_VERIFY_DISABLED", "CWE-295"),
        ("PATH_TRAV", "CWE-22"),
        ("CORS_WILDCARD", "CWE-942"),
        ("TELEMETRY_UNDISCLOSED", "CWE-359"),
        ("SQL_INTERP", "CWE-89"),
        ("UNSAFE_YAML", "CWE-502"),
        ("PICKLE_LOAD", "CWE-502"),
        ("PROMPT_INJECT_MARKER", "CWE-1427"),
        ("TP_UNICODE_001", "CWE-1427"),
        ("TP_INJECT_001", "CWE-1427"),
        ("TP_OBFUSC_001", "CWE-506"),
        ("TP_LENGTH_001", "CWE-1427"),
        ("TP_CROSS_001", "CWE-1427"),
        ("TP_HOMOGLYPH_001", "CWE-1007"),
        ("TP_URL_001", "CWE-918"),
        ("TP_SCHEMA_001", "CWE-20"),
        ("TP_SCHEMA_003", "CWE-1427"),
        ("TP_SCHEMA_004", "CWE-1427"),
    ]
});

/// pattern_id → remediation template, per §4.5 step 6.
static REMEDIATION_TABLE: Lazy<Vec<(&'static str, &'static str)>> = Lazy::new(|| {
    vec![
        ("CMD_INJECT", "Avoid building shell commands from untrusted input; use an argv-array API instead of string interpolation."),
        ("SHELL_EXEC", "Avoid shell=True / os.system; call the target binary directly with an argument list."),
        ("DYN_EVAL", "Replace eval/exec with an explicit parser or a restricted allowlist of operations."),
        ("HARDCODED_SECRET", "Move the secret to an environment variable or secret manager; rotate the exposed value."),
        ("TLS_VERIFY_DISABLED", "Remove the verification bypass; pin a CA bundle if the target uses a private CA."),
        ("PATH_TRAV", "Canonicalize the path and reject any result outside the intended base directory."),
        ("CORS_WILDCARD", "Scope Access-Control-Allow-Origin to the specific origins that need access."),
        ("TELEMETRY_UNDISCLOSED", "Disclose the telemetry call in documentation and gate it behind explicit opt-in."),
        ("SQL_INTERP", "Use parameterized queries instead of string interpolation."),
        ("UNSAFE_YAML", "Use yaml.safe_load instead of yaml.load/yaml.unsafe_load."),
        ("PICKLE_LOAD", "Avoid unpickling untrusted data; use a safe serialization format such as JSON."),
        ("PROMPT_INJECT_MARKER", "Remove the embedded instruction text or quote it so it cannot be read as a directive by the calling model."),
    ]
});

const GENERIC_REMEDIATION: &str =
    "Review the cited code for unintended trust in caller-supplied input and add explicit validation.";
const PLACEHOLDER_MARKERS: &[&str] = &["n/a", "none", "todo", "tbd", "-"];

fn is_placeholder(s: &str) -> bool {
    let trimmed = s.trim();
    trimmed.is_empty() || PLACEHOLDER_MARKERS.contains(&trimmed.to_lowercase().as_str())
}

fn lookup_cwe(pattern_id: &str) -> &'static str {
    CWE_TABLE
        .iter()
        .find(|(id, _)| *id == pattern_id)
        .map(|(_, cwe)| *cwe)
        .unwrap_or(BACKSTOP_CWE)
}

fn lookup_remediation(pattern_id: &str) -> &'static str {
    REMEDIATION_TABLE
        .iter()
        .find(|(id, _)| *id == pattern_id)
        .map(|(_, template)| *template)
        .unwrap_or(GENERIC_REMEDIATION)
}

/// Recover three lines of context (line-1 .. line+1) from the matching
/// File Entry, per §4.5 step 5.
fn recover_snippet(file: &str, line: usize, files: &[FileEntry]) -> Option<String> {
    let entry = files.iter().find(|f| f.path == file)?;
    let lines: Vec<&str> = entry.content.lines().collect();
    if line == 0 || line > lines.len() {
        return None;
    }
    let start = line.saturating_sub(2);
    let end = (line + 1).min(lines.len());
    Some(lines[start..end].join("\n"))
}

/// Normalize one finding in place per §4.5 steps 1-8. Idempotent: calling
/// this twice on an already-normalized finding is a no-op.
fn normalize_finding(finding: &mut Finding, files: &[FileEntry]) {
    finding.file = sanitize_file_field(finding.file.take());
    finding.line = finding.line.filter(|l| *l > 0);

    if finding.cwe_id.is_empty() {
        finding.cwe_id = lookup_cwe(&finding.pattern_id).to_string();
    }

    if is_placeholder(&finding.content) {
        if let (Some(file), Some(line)) = (finding.file.clone(), finding.line) {
            if let Some(snippet) = recover_snippet(&file, line, files) {
                finding.content = snippet;
            }
        }
    }

    if is_placeholder(&finding.remediation) {
        finding.remediation = lookup_remediation(&finding.pattern_id).to_string();
    }

    finding.score_impact = if finding.by_design { 0 } else { finding.severity.score_impact() };

    if !matches!(finding.confidence, Confidence::High | Confidence::Medium | Confidence::Low) {
        finding.confidence = Confidence::Medium;
    }
}

/// I5: risk_score = min(100, sum of |score_impact| over non-by-design findings).
fn compute_risk_score(findings: &[Finding]) -> u32 {
    let sum: i64 = findings
        .iter()
        .filter(|f| !f.by_design)
        .map(|f| f.score_impact.unsigned_abs() as i64)
        .sum();
    sum.min(100) as u32
}

/// I6: result thresholds.
fn classify_result(risk_score: u32) -> ReportResult {
    if risk_score <= 25 {
        ReportResult::Safe
    } else if risk_score <= 50 {
        ReportResult::Caution
    } else {
        ReportResult::Unsafe
    }
}

/// I7: max_severity is the highest severity among retained (non-rejected)
/// findings, or none if there are no findings.
fn compute_max_severity(findings: &[Finding]) -> Option<Severity> {
    findings.iter().map(|f| f.severity).max()
}

/// Run the full C5 enrichment pass over a report's findings, then
/// recompute risk_score/result/max_severity. Idempotent.
pub fn enrich(report: &mut Report, files: &[FileEntry]) {
    for finding in &mut report.findings {
        normalize_finding(finding, files);
    }
    report.findings_count = report.findings.len();
    report.risk_score = compute_risk_score(&report.findings);
    report.result = classify_result(report.risk_score);
    report.max_severity = compute_max_severity(&report.findings);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::{Category, PackageKind};

    fn base_report(findings: Vec<Finding>) -> Report {
        Report {
            skill_slug: "pkg".into(),
            source_url: None,
            package_type: PackageKind::Unknown,
            package_version: None,
            audit_model: None,
            audit_provider: None,
            commit_sha: None,
            source_hash: "deadbeef".into(),
            risk_score: 0,
            max_severity: None,
            result: ReportResult::Safe,
            findings_count: 0,
            findings,
            input_tokens: None,
            output_tokens: None,
            duration_ms: 0,
            output_truncated: false,
            verification: None,
        }
    }

    #[test]
    fn enrichment_is_idempotent() {
        let finding = Finding::new("CMD_INJECT", Category::injection(), Severity::Critical, "t");
        let mut report = base_report(vec![finding]);
        enrich(&mut report, &[]);
        let first_pass = serde_json::to_string(&report).unwrap();
        enrich(&mut report, &[]);
        let second_pass = serde_json::to_string(&report).unwrap();
        assert_eq!(first_pass, second_pass);
    }

    #[test]
    fn by_design_findings_contribute_zero_risk() {
        let mut finding = Finding::new("CMD_INJECT", Category::injection(), Severity::Critical, "t");
        finding.by_design = true;
        let mut report = base_report(vec![finding]);
        enrich(&mut report, &[]);
        assert_eq!(report.risk_score, 0);
        assert_eq!(report.result, ReportResult::Safe);
    }

    #[test]
    fn risk_score_caps_at_100() {
        let findings: Vec<Finding> = (0..10)
            .map(|i| Finding::new(format!("X{i}"), Category::injection(), Severity::Critical, "t"))
            .collect();
        let mut report = base_report(findings);
        enrich(&mut report, &[]);
        assert_eq!(report.risk_score, 100);
        assert_eq!(report.result, ReportResult::Unsafe);
    }

    #[test]
    fn missing_cwe_falls_back_to_backstop() {
        let mut finding = Finding::new("SOME_UNKNOWN_RULE", Category::injection(), Severity::Low, "t");
        normalize_finding(&mut finding, &[]);
        assert_eq!(finding.cwe_id, BACKSTOP_CWE);
    }

    #[test]
    fn snippet_recovery_pulls_surrounding_lines() {
        let files = vec![FileEntry {
            path: "a.py".into(),
            content: "one\ntwo\nthree\nfour\nfive".into(),
            byte_len: 0,
        }];
        let mut finding = Finding::new("X", Category::injection(), Severity::Low, "t")
            .with_location("a.py", Some(3));
        normalize_finding(&mut finding, &files);
        assert_eq!(finding.content, "two\nthree\nfour");
    }
}
