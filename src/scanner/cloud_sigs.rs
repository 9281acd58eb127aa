use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::finding::{Category, Finding, Severity};

/// A cloud-fetched signature (matches the API response format).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudSignature {
    pub id: String,
    pub pattern: String,
    #[serde(default = "default_category")]
    pub category: String,
    pub severity: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

fn default_category() -> String {
    "injection".to_string()
}

/// Wrapped format returned by GET /v1/signatures.
#[derive(Debug, Deserialize)]
pub struct SignatureResponse {
    pub signatures: Vec<CloudSignature>,
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub last_updated: Option<String>,
}

/// Path to the locally cached signatures file.
pub fn signatures_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".agentaudit")
        .join("signatures.json")
}

/// Path to the metadata file that tracks when signatures were last fetched.
fn sync_meta_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".agentaudit")
        .join("signatures_meta.json")
}

/// Load cloud signatures from disk. Returns an empty vec if the file is
/// missing or malformed (offline-safe).
pub fn load_cloud_signatures() -> Vec<CloudSignature> {
    let path = signatures_path();
    let contents = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(_) => return vec![],
    };

    if let Ok(resp) = serde_json::from_str::<SignatureResponse>(&contents) {
        return resp.signatures;
    }

    serde_json::from_str::<Vec<CloudSignature>>(&contents).unwrap_or_default()
}

/// Get the last_updated timestamp from the sync metadata, for delta sync.
pub fn get_last_sync_time() -> Option<String> {
    let path = sync_meta_path();
    let contents = std::fs::read_to_string(&path).ok()?;
    let meta: serde_json::Value = serde_json::from_str(&contents).ok()?;
    meta.get("last_updated")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

/// Save sync metadata after a successful signature fetch.
pub fn save_sync_meta(last_updated: &str) {
    let path = sync_meta_path();
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let meta = serde_json::json!({
        "last_updated": last_updated,
        "fetched_at": chrono::Utc::now().to_rfc3339(),
    });
    let _ = std::fs::write(&path, serde_json::to_string_pretty(&meta).unwrap_or_default());
}

fn parse_severity(s: &str) -> Severity {
    match s.to_uppercase().as_str() {
        "CRITICAL" => Severity::Critical,
        "HIGH" => Severity::High,
        "MEDIUM" => Severity::Medium,
        "WARNING" => Severity::Warning,
        "INFO" => Severity::Info,
        _ => Severity::Low,
    }
}

/// Scan a file's contents against all loaded cloud signatures.
pub fn scan_with_cloud_signatures(
    file: &str,
    contents: &str,
    signatures: &[CloudSignature],
) -> Vec<Finding> {
    let mut findings = Vec::new();

    for sig in signatures {
        let re = match Regex::new(&sig.pattern) {
            Ok(r) => r,
            Err(_) => continue,
        };

        let severity = parse_severity(&sig.severity);

        for (line_num, line) in contents.lines().enumerate() {
            if re.is_match(line) {
                let snippet = if line.len() > 200 {
                    format!("{} ...", &line[..200])
                } else {
                    line.to_string()
                };
                findings.push(
                    Finding::new(
                        sig.id.clone(),
                        Category::new(sig.category.clone()),
                        severity,
                        sig.description.clone(),
                    )
                    .with_location(file, Some(line_num + 1))
                    .with_content(snippet.trim().to_string()),
                );
            }
        }
    }

    findings
}
