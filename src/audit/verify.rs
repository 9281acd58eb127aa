use serde::Deserialize;

use crate::audit::provider::{self, ProviderEntry};
use crate::audit::prompt::{build_verify_user_message, VERIFY_SYSTEM_PROMPT};
use crate::audit::extract::extract_report_json;
use crate::error::AgentAuditError;
use crate::finding::{Confidence, FileEntry, Finding, Severity, VerificationMeta, VerificationStatus};

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    verification_status: String,
    verified_severity: Option<String>,
    verified_confidence: Option<String>,
    code_exists: bool,
    code_matches_description: bool,
    is_opt_in: bool,
    #[serde(default)]
    is_core_functionality: bool,
    attack_scenario: Option<String>,
    #[serde(default)]
    rejection_reason: Option<String>,
    #[serde(default)]
    reasoning: String,
}

fn parse_severity(s: &str) -> Option<Severity> {
    match s.to_lowercase().as_str() {
        "critical" => Some(Severity::Critical),
        "high" => Some(Severity::High),
        "medium" => Some(Severity::Medium),
        "low" => Some(Severity::Low),
        "info" => Some(Severity::Info),
        _ => None,
    }
}

fn parse_confidence(s: &str) -> Option<Confidence> {
    match s.to_lowercase().as_str() {
        "high" => Some(Confidence::High),
        "medium" => Some(Confidence::Medium),
        "low" => Some(Confidence::Low),
        _ => None,
    }
}

/// Decision outcome for one finding after a verification call.
enum Decision {
    Rejected,
    Demoted(Severity),
    Verified(Option<Severity>, Option<Confidence>),
}

/// Apply §4.4.5's decision rules to a parsed verifier response.
fn decide(original_severity: Severity, resp: &VerifyResponse) -> Decision {
    if !resp.code_exists || !resp.code_matches_description {
        return Decision::Rejected;
    }

    let is_high_or_critical = matches!(original_severity, Severity::Critical | Severity::High);

    if resp.is_opt_in && is_high_or_critical {
        return Decision::Demoted(Severity::Low);
    }

    if resp.attack_scenario.as_deref().map(|s| s.trim().is_empty()).unwrap_or(true) && is_high_or_critical {
        return Decision::Demoted(Severity::Medium);
    }

    Decision::Verified(
        resp.verified_severity.as_deref().and_then(parse_severity),
        resp.verified_confidence.as_deref().and_then(parse_confidence),
    )
}

/// Select up to ten findings to verify, ordered critical-first, then
/// high, medium, low, info, then positionally within each tier.
pub fn select_for_verification(findings: &[Finding]) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..findings.len()).collect();
    idx.sort_by_key(|&i| std::cmp::Reverse(findings[i].severity));
    idx.into_iter().take(10).collect()
}

/// Run the verification pass over `findings` in place, sequentially (per
/// §5's deterministic ordering requirement for single-model audits).
/// Returns the verification metadata; findings marked `rejected` are
/// removed from the vec by the caller.
pub async fn run_verification(
    entry: &ProviderEntry,
    model: &str,
    findings: &mut Vec<Finding>,
    files: &[FileEntry],
    manifest: Option<&str>,
) -> Result<VerificationMeta, AgentAuditError> {
    let targets = select_for_verification(findings);
    let mut rejected_indices = Vec::new();
    let mut meta = VerificationMeta {
        verifier_model: Some(model.to_string()),
        ..Default::default()
    };

    for idx in targets {
        let user_message = build_verify_user_message(&findings[idx], files, manifest);
        let call_result = provider::call(entry, model, VERIFY_SYSTEM_PROMPT, &user_message).await;

        let response = match call_result {
            Ok(resp) => resp,
            Err(_) => {
                findings[idx].verification_status = VerificationStatus::Unverified;
                meta.unverified_count += 1;
                continue;
            }
        };

        let parsed = extract_report_json(&response.body)
            .ok()
            .and_then(|v| serde_json::from_value::<VerifyResponse>(v).ok());

        let Some(parsed) = parsed else {
            findings[idx].verification_status = VerificationStatus::Unverified;
            meta.unverified_count += 1;
            continue;
        };

        let original_severity = findings[idx].severity;
        match decide(original_severity, &parsed) {
            Decision::Rejected => {
                findings[idx].verification_status = VerificationStatus::Rejected;
                rejected_indices.push(idx);
                meta.rejected_count += 1;
            }
            Decision::Demoted(new_severity) => {
                findings[idx].original_severity = Some(original_severity);
                findings[idx].severity = new_severity;
                findings[idx].verification_status = VerificationStatus::Demoted;
                findings[idx].verification_reasoning = Some(parsed.reasoning.clone());
                meta.demoted_count += 1;
            }
            Decision::Verified(severity, confidence) => {
                if let Some(s) = severity {
                    if s != original_severity {
                        findings[idx].original_severity = Some(original_severity);
                        findings[idx].severity = s;
                    }
                }
                if let Some(c) = confidence {
                    findings[idx].verified_confidence = Some(c);
                }
                findings[idx].verification_status = VerificationStatus::Verified;
                findings[idx].verification_reasoning = Some(parsed.reasoning.clone());
                meta.verified_count += 1;
            }
        }
    }

    rejected_indices.sort_unstable_by(|a, b| b.cmp(a));
    for idx in rejected_indices {
        findings.remove(idx);
    }

    Ok(meta)
}

/// `cross` selects a verifier whose provider family differs from the
/// scanning provider; `self` reuses it.
pub fn resolve_verifier_entry<'a>(
    mode: &str,
    scan_entry: &'a ProviderEntry,
) -> &'a ProviderEntry {
    if mode == "self" {
        return scan_entry;
    }
    provider::PROVIDERS
        .iter()
        .find(|e| e.provider_key != scan_entry.provider_key && std::env::var(e.env_var).is_ok())
        .unwrap_or(scan_entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(severity: Severity) -> Finding {
        Finding::new("T1", crate::finding::Category::injection(), severity, "t")
    }

    #[test]
    fn selection_orders_by_severity_then_position() {
        let findings = vec![
            finding(Severity::Low),
            finding(Severity::Critical),
            finding(Severity::High),
            finding(Severity::Critical),
        ];
        let order = select_for_verification(&findings);
        assert_eq!(order, vec![1, 3, 2, 0]);
    }

    #[test]
    fn nonexistent_code_is_rejected() {
        let resp = VerifyResponse {
            verification_status: "rejected".into(),
            verified_severity: None,
            verified_confidence: None,
            code_exists: false,
            code_matches_description: false,
            is_opt_in: false,
            is_core_functionality: false,
            attack_scenario: None,
            rejection_reason: Some("no such file".into()),
            reasoning: "couldn't find it".into(),
        };
        assert!(matches!(decide(Severity::High, &resp), Decision::Rejected));
    }

    #[test]
    fn opt_in_high_severity_is_demoted_to_low() {
        let resp = VerifyResponse {
            verification_status: "demoted".into(),
            verified_severity: None,
            verified_confidence: None,
            code_exists: true,
            code_matches_description: true,
            is_opt_in: true,
            is_core_functionality: false,
            attack_scenario: Some("requires explicit opt-in flag".into()),
            rejection_reason: None,
            reasoning: "user must enable this".into(),
        };
        assert!(matches!(decide(Severity::Critical, &resp), Decision::Demoted(Severity::Low)));
    }

    #[test]
    fn missing_attack_scenario_demotes_high_severity_to_medium() {
        let resp = VerifyResponse {
            verification_status: "demoted".into(),
            verified_severity: None,
            verified_confidence: None,
            code_exists: true,
            code_matches_description: true,
            is_opt_in: false,
            is_core_functionality: false,
            attack_scenario: None,
            rejection_reason: None,
            reasoning: "theoretical only".into(),
        };
        assert!(matches!(decide(Severity::High, &resp), Decision::Demoted(Severity::Medium)));
    }
}
