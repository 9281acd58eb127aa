use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::finding::{Report, Severity};

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Normalise a finding title for fusion, per §4.4.6: lowercase,
/// non-alphanumerics collapsed to single spaces, trimmed.
pub fn normalize_title(title: &str) -> String {
    NON_ALNUM
        .replace_all(&title.to_lowercase(), " ")
        .trim()
        .to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskSummary {
    pub min: u32,
    pub max: u32,
    pub mean: f64,
}

#[derive(Debug, Clone, Serialize)]
pub enum SeverityAgreement {
    Unanimous(Option<Severity>),
    Split(Vec<Option<Severity>>),
}

#[derive(Debug, Clone, Serialize)]
pub struct FindingFusion {
    pub normalized_title: String,
    pub model_count: usize,
    pub shared: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsensusView {
    pub risk: RiskSummary,
    pub severity_agreement: SeverityAgreement,
    pub findings: Vec<FindingFusion>,
}

/// Derive the deterministic consensus view over N>1 per-model reports.
pub fn derive_consensus(reports: &[Report]) -> ConsensusView {
    let scores: Vec<u32> = reports.iter().map(|r| r.risk_score).collect();
    let risk = RiskSummary {
        min: scores.iter().copied().min().unwrap_or(0),
        max: scores.iter().copied().max().unwrap_or(0),
        mean: if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<u32>() as f64 / scores.len() as f64
        },
    };

    let severities: Vec<Option<Severity>> = reports.iter().map(|r| r.max_severity).collect();
    let severity_agreement = if severities.windows(2).all(|w| w[0] == w[1]) {
        SeverityAgreement::Unanimous(severities.first().copied().flatten())
    } else {
        SeverityAgreement::Split(severities)
    };

    let mut counts: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    for report in reports {
        let mut seen_in_this_report = std::collections::HashSet::new();
        for finding in &report.findings {
            let key = normalize_title(&finding.title);
            if seen_in_this_report.insert(key.clone()) {
                *counts.entry(key).or_insert(0) += 1;
            }
        }
    }

    let mut findings: Vec<FindingFusion> = counts
        .into_iter()
        .map(|(normalized_title, model_count)| FindingFusion {
            shared: model_count >= 2,
            normalized_title,
            model_count,
        })
        .collect();
    findings.sort_by(|a, b| a.normalized_title.cmp(&b.normalized_title));

    ConsensusView {
        risk,
        severity_agreement,
        findings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_punctuation_and_whitespace() {
        assert_eq!(
            normalize_title("  Hard-coded  API_Key!! "),
            "hard coded api key"
        );
    }

    #[test]
    fn findings_in_two_or_more_models_are_shared() {
        assert_eq!(normalize_title("Eval of tainted input"), normalize_title("eval of tainted input!"));
    }
}
