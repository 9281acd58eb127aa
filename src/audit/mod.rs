pub mod consensus;
pub mod extract;
pub mod prompt;
pub mod provider;
pub mod verify;

use serde::Deserialize;

use crate::error::AgentAuditError;
use crate::finding::{Category, Confidence, FileEntry, Finding, Severity, VerificationMeta};

#[derive(Debug, Deserialize)]
struct RawFinding {
    #[serde(default = "default_pattern_id")]
    pattern_id: String,
    #[serde(default = "default_category")]
    category: String,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    confidence: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    line: Option<i64>,
    #[serde(default)]
    content: String,
    #[serde(default)]
    by_design: bool,
}

fn default_pattern_id() -> String {
    "LLM_FINDING".to_string()
}

fn default_category() -> String {
    "llm".to_string()
}

#[derive(Debug, Deserialize)]
struct RawAuditReport {
    #[serde(default)]
    skill_slug: Option<String>,
    #[serde(default)]
    findings: Vec<RawFinding>,
}

fn parse_severity(s: Option<&str>) -> Severity {
    match s.map(|s| s.to_lowercase()).as_deref() {
        Some("critical") => Severity::Critical,
        Some("high") => Severity::High,
        Some("medium") => Severity::Medium,
        Some("low") => Severity::Low,
        Some("info") => Severity::Info,
        _ => Severity::Medium,
    }
}

fn parse_confidence(s: Option<&str>) -> Confidence {
    match s.map(|s| s.to_lowercase()).as_deref() {
        Some("high") => Confidence::High,
        Some("low") => Confidence::Low,
        _ => Confidence::Medium,
    }
}

fn raw_findings_to_findings(raw: Vec<RawFinding>) -> Vec<Finding> {
    raw.into_iter()
        .map(|r| {
            let severity = parse_severity(r.severity.as_deref());
            let title = r.title.clone().unwrap_or_else(|| r.description.clone());
            let mut finding = Finding::new(r.pattern_id, Category::new(r.category), severity, title);
            finding.confidence = parse_confidence(r.confidence.as_deref());
            finding.description = r.description;
            finding.by_design = r.by_design;
            if let Some(file) = r.file {
                let line = r.line.and_then(|l| usize::try_from(l).ok());
                finding = finding.with_location(file, line);
            }
            finding.with_content(r.content)
        })
        .collect()
}

/// What one LLM audit call produces, before C5 enrichment runs.
pub struct AuditOutcome {
    pub skill_slug: Option<String>,
    pub findings: Vec<Finding>,
    pub audit_model: String,
    pub audit_provider: String,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub duration_ms: u64,
    pub output_truncated: bool,
    pub verification: Option<VerificationMeta>,
}

/// Options shared by single- and multi-model audit runs.
pub struct AuditOptions<'a> {
    pub model_override: Option<&'a str>,
    pub preferred_provider: Option<&'a str>,
    pub verify: Option<&'a str>,
    pub manifest: Option<&'a str>,
}

/// Run the primary audit call for one model, then the optional
/// verification pass, per §4.4.
pub async fn run_audit(
    files: &[FileEntry],
    opts: &AuditOptions<'_>,
) -> Result<AuditOutcome, AgentAuditError> {
    let entry = provider::resolve_provider(opts.model_override, opts.preferred_provider);
    let model = opts.model_override.unwrap_or(entry.default_model).to_string();

    let user_message = prompt::build_audit_user_message(files);
    let estimated = provider::estimate_tokens(prompt::AUDIT_SYSTEM_PROMPT)
        + provider::estimate_tokens(&user_message);
    let window = provider::context_window_for(&model);
    let usage_ratio = estimated as f64 / window as f64;
    if usage_ratio > 1.0 {
        return Err(AgentAuditError::ProviderContextTooLarge {
            message: format!(
                "estimated {estimated} input tokens exceeds the {window}-token window for {model}"
            ),
            hint: Some("scan a smaller path or pick a larger-context model".to_string()),
        });
    }
    if usage_ratio > 0.9 {
        tracing::warn!(model, estimated, window, "input near context window limit");
    }

    let started = std::time::Instant::now();
    let response = provider::call(entry, &model, prompt::AUDIT_SYSTEM_PROMPT, &user_message).await?;
    let duration_ms = started.elapsed().as_millis() as u64;

    let parsed = extract::extract_report_json(&response.body).map_err(|e| AgentAuditError::ProviderParse {
        message: "model response did not contain a recognizable report".to_string(),
        hint: Some(format!("raw preview: {}", e.preview)),
    })?;

    let raw_report: RawAuditReport = serde_json::from_value(parsed).map_err(|e| AgentAuditError::ProviderParse {
        message: format!("report JSON did not match the expected shape: {e}"),
        hint: None,
    })?;

    let mut findings = raw_findings_to_findings(raw_report.findings);

    let verification = match opts.verify {
        None => None,
        Some(mode) => {
            let verifier_entry = verify::resolve_verifier_entry(mode, entry);
            match verify::run_verification(verifier_entry, &model, &mut findings, files, opts.manifest).await {
                Ok(meta) => Some(meta),
                Err(_) => None,
            }
        }
    };

    Ok(AuditOutcome {
        skill_slug: raw_report.skill_slug,
        findings,
        audit_model: model,
        audit_provider: entry.provider_key.to_string(),
        input_tokens: response.input_tokens,
        output_tokens: response.output_tokens,
        duration_ms,
        output_truncated: response.truncated,
        verification,
    })
}

/// Multi-model fan-out: dispatch one primary call per model in parallel;
/// independent failures do not abort peers, per §4.4.6/§5.
pub async fn run_multi_model_audit(
    files: &[FileEntry],
    models: &[String],
    preferred_provider: Option<&str>,
    verify: Option<&str>,
    manifest: Option<&str>,
) -> Vec<Result<AuditOutcome, AgentAuditError>> {
    let futures = models.iter().map(|model| {
        let opts = AuditOptions {
            model_override: Some(model.as_str()),
            preferred_provider,
            verify,
            manifest,
        };
        async move { run_audit(files, &opts).await }
    });
    futures::future::join_all(futures).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_findings_map_defaults_for_missing_fields() {
        let raw = vec![RawFinding {
            pattern_id: default_pattern_id(),
            category: default_category(),
            severity: None,
            confidence: None,
            title: Some("odd thing".to_string()),
            description: String::new(),
            file: None,
            line: None,
            content: String::new(),
            by_design: false,
        }];
        let findings = raw_findings_to_findings(raw);
        assert_eq!(findings[0].severity, Severity::Medium);
        assert_eq!(findings[0].confidence, Confidence::Medium);
    }

    #[test]
    fn negative_line_numbers_are_dropped() {
        let raw = vec![RawFinding {
            pattern_id: "X".into(),
            category: "injection".into(),
            severity: Some("high".into()),
            confidence: None,
            title: Some("t".into()),
            description: String::new(),
            file: Some("a.py".into()),
            line: Some(-1),
            content: String::new(),
            by_design: false,
        }];
        let findings = raw_findings_to_findings(raw);
        assert_eq!(findings[0].line, None);
    }
}
