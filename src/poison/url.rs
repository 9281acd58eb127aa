use once_cell::sync::Lazy;
use regex::Regex;

use crate::finding::{Category, Finding, Severity};

static RE_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://[^\s'\"<>)]+").unwrap());

const ALLOWLIST_EXACT: &[&str] = &["github.com", "npmjs.com", "pypi.org"];
const ALLOWLIST_PREFIXES: &[&str] = &["api.", "docs.", "www."];

const TUNNEL_TOKENS: &[&str] = &[
    "ngrok",
    "serveo",
    "localtunnel",
    "localhost",
    "127.0.0.1",
    "0.0.0.0",
    "burp",
    "oast",
    "interact.sh",
    "webhook.site",
    "requestbin",
    "pipedream",
];

fn host_of(url: &str) -> Option<String> {
    let without_scheme = url.splitn(2, "://").nth(1)?;
    let host_port = without_scheme.split(['/', '?', '#']).next()?;
    let host = host_port.split('@').last().unwrap_or(host_port);
    Some(host.split(':').next().unwrap_or(host).to_lowercase())
}

fn is_allowlisted(host: &str) -> bool {
    ALLOWLIST_EXACT.contains(&host) || ALLOWLIST_PREFIXES.iter().any(|p| host.starts_with(p))
}

/// Scan a field for suspicious URLs, per §4.2.7.
pub fn scan_field(field_name: &str, text: &str) -> Vec<Finding> {
    let mut findings = Vec::new();

    for m in RE_URL.find_iter(text) {
        let url = m.as_str();
        let lower = url.to_lowercase();

        if TUNNEL_TOKENS.iter().any(|t| lower.contains(t)) {
            findings.push(Finding::new(
                "TP_URL_002",
                Category::suspicious_url(),
                Severity::High,
                format!("Tunneling/interception host referenced in `{}`", field_name),
            ).with_evidence(url.to_string()));
            continue;
        }

        if let Some(host) = host_of(url) {
            if !is_allowlisted(&host) {
                findings.push(Finding::new(
                    "TP_URL_001",
                    Category::suspicious_url(),
                    Severity::Medium,
                    format!("Non-allowlisted external URL in `{}`", field_name),
                ).with_evidence(url.to_string()));
            }
        }
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowlisted_host_produces_no_finding() {
        let findings = scan_field("description", "See https://github.com/foo/bar for docs");
        assert!(findings.is_empty());
    }

    #[test]
    fn ngrok_host_is_high_severity() {
        let findings = scan_field("description", "callback to https://abcd.ngrok.io/hook");
        assert_eq!(findings[0].pattern_id, "TP_URL_002");
        assert_eq!(findings[0].severity, Severity::High);
    }

    #[test]
    fn unknown_host_is_medium() {
        let findings = scan_field("description", "send data to https://evil.example.com/collect");
        assert_eq!(findings[0].pattern_id, "TP_URL_001");
        assert_eq!(findings[0].severity, Severity::Medium);
    }
}
