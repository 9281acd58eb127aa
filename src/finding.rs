use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity level for a finding, ordered low to critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// score_impact magnitude per I2; by-design findings override this to 0
    /// regardless of severity.
    pub fn score_impact(self) -> i32 {
        match self {
            Severity::Critical => -25,
            Severity::High => -15,
            Severity::Medium => -5,
            Severity::Low => -1,
            Severity::Warning | Severity::Info => 0,
        }
    }

    pub fn sarif_level(self) -> &'static str {
        match self {
            Severity::Critical | Severity::High => "error",
            Severity::Medium | Severity::Warning => "warning",
            Severity::Low | Severity::Info => "note",
        }
    }

    /// security-severity score per SPEC_FULL.md §4.5/§6.
    pub fn security_severity_score(self) -> f64 {
        match self {
            Severity::Critical => 9.5,
            Severity::High => 8.0,
            Severity::Medium => 5.5,
            Severity::Low => 2.0,
            Severity::Warning | Severity::Info => 0.5,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Default for Confidence {
    fn default() -> Self {
        Confidence::Medium
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Unset,
    Verified,
    Demoted,
    Rejected,
    Unverified,
}

impl Default for VerificationStatus {
    fn default() -> Self {
        VerificationStatus::Unset
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageKind {
    McpServer,
    AgentSkill,
    CliTool,
    Library,
    Unknown,
}

impl fmt::Display for PackageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PackageKind::McpServer => "mcp-server",
            PackageKind::AgentSkill => "agent-skill",
            PackageKind::CliTool => "cli-tool",
            PackageKind::Library => "library",
            PackageKind::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportResult {
    Safe,
    Caution,
    Unsafe,
}

/// A stable, open category tag. Known categories have const constructors;
/// LLM-produced tags (C4) may introduce values outside this list, which is
/// why this is a newtype over String rather than a closed enum.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Category(pub String);

impl Category {
    pub fn new(s: impl Into<String>) -> Self {
        Category(s.into())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! known_categories {
    ($($konst:ident => $name:literal),* $(,)?) => {
        impl Category {
            $(pub fn $konst() -> Category { Category($name.to_string()) })*
        }
    };
}

known_categories! {
    hidden_unicode => "hidden_unicode",
    instruction_injection => "instruction_injection",
    obfuscated_payload => "obfuscated_payload",
    excessive_length => "excessive_length",
    cross_tool_manipulation => "cross_tool_manipulation",
    homoglyph => "homoglyph",
    suspicious_url => "suspicious_url",
    schema_manipulation => "schema_manipulation",
    injection => "injection",
    secrets => "secrets",
    crypto => "crypto",
    filesystem => "filesystem",
    network => "network",
    privacy => "privacy",
    deserialization => "deserialization",
    prompt_injection => "prompt-injection",
}

/// A single security finding. Produced by C2/C3/C4, mutated only by the
/// verification pass and the enricher, and frozen once a Report exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub pattern_id: String,
    pub category: Category,
    pub severity: Severity,
    #[serde(default)]
    pub confidence: Confidence,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub evidence: String,
    pub file: Option<String>,
    pub line: Option<usize>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub cwe_id: String,
    #[serde(default)]
    pub remediation: String,
    #[serde(default)]
    pub by_design: bool,
    #[serde(default)]
    pub score_impact: i32,
    #[serde(default)]
    pub verification_status: VerificationStatus,
    #[serde(default)]
    pub original_severity: Option<Severity>,
    #[serde(default)]
    pub verified_confidence: Option<Confidence>,
    #[serde(default)]
    pub verification_reasoning: Option<String>,
}

impl Finding {
    /// Construct a finding, enforcing I1-I4 at creation time where feasible.
    /// I1 (by_design => score_impact=0) and I2 (severity-mapped score_impact)
    /// are applied here; the full re-validation pass still runs in the
    /// enricher (C5) since findings arriving from C4 are not built through
    /// this constructor.
    pub fn new(
        pattern_id: impl Into<String>,
        category: Category,
        severity: Severity,
        title: impl Into<String>,
    ) -> Self {
        let by_design = false;
        Finding {
            pattern_id: pattern_id.into(),
            category,
            severity,
            confidence: Confidence::default(),
            title: title.into(),
            description: String::new(),
            evidence: String::new(),
            file: None,
            line: None,
            content: String::new(),
            cwe_id: String::new(),
            remediation: String::new(),
            by_design,
            score_impact: severity.score_impact(),
            verification_status: VerificationStatus::default(),
            original_severity: None,
            verified_confidence: None,
            verification_reasoning: None,
        }
    }

    pub fn with_location(mut self, file: impl Into<String>, line: Option<usize>) -> Self {
        self.file = sanitize_file_field(Some(file.into()));
        self.line = line.filter(|l| *l > 0);
        self
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = evidence.into();
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// I3: a file path is invalid if it contains NUL, `..` segments, or a URL
/// scheme; an invalid path is cleared rather than the finding being dropped.
pub fn sanitize_file_field(file: Option<String>) -> Option<String> {
    file.filter(|f| {
        !f.contains('\0')
            && !f.split(['/', '\\']).any(|seg| seg == "..")
            && !f.contains("://")
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub content: String,
    pub byte_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageProfile {
    pub kind: PackageKind,
    pub language: Option<String>,
    pub version: Option<String>,
    pub tool_names: Vec<String>,
    pub prompt_names: Vec<String>,
    pub entrypoint: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    #[serde(default)]
    pub enum_values: Vec<String>,
    #[serde(default, rename = "type")]
    pub type_: Option<String>,
    #[serde(default)]
    pub items: Option<Box<PropertySchema>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputSchema {
    #[serde(default, rename = "type")]
    pub type_: Option<String>,
    #[serde(default)]
    pub properties: std::collections::BTreeMap<String, PropertySchema>,
    #[serde(default)]
    pub additional_properties: Option<bool>,
    #[serde(default)]
    pub required: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input_schema: InputSchema,
}

/// Top-level report. Invariants I5-I7 are enforced by `crate::enrich`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub skill_slug: String,
    pub source_url: Option<String>,
    pub package_type: PackageKind,
    pub package_version: Option<String>,
    pub audit_model: Option<String>,
    pub audit_provider: Option<String>,
    pub commit_sha: Option<String>,
    pub source_hash: String,
    pub risk_score: u32,
    pub max_severity: Option<Severity>,
    pub result: ReportResult,
    pub findings_count: usize,
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub input_tokens: Option<u64>,
    #[serde(default)]
    pub output_tokens: Option<u64>,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub output_truncated: bool,
    #[serde(default)]
    pub verification: Option<VerificationMeta>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationMeta {
    pub verifier_model: Option<String>,
    pub verified_count: usize,
    pub demoted_count: usize,
    pub rejected_count: usize,
    pub unverified_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn by_design_zeroes_score_impact_is_not_automatic_at_construction() {
        // Constructor sets score_impact from severity; by_design must be
        // applied by the caller/enricher, matching I1's enforcement point
        // being the enricher, not the constructor.
        let f = Finding::new("T1", Category::injection(), Severity::Critical, "t");
        assert_eq!(f.score_impact, -25);
    }

    #[test]
    fn sanitize_rejects_traversal_and_scheme_and_nul() {
        assert_eq!(sanitize_file_field(Some("a/../b".into())), None);
        assert_eq!(sanitize_file_field(Some("file\0name".into())), None);
        assert_eq!(sanitize_file_field(Some("https://x/y".into())), None);
        assert_eq!(
            sanitize_file_field(Some("src/main.rs".into())),
            Some("src/main.rs".into())
        );
    }

    #[test]
    fn with_location_rejects_zero_line() {
        let f = Finding::new("T1", Category::injection(), Severity::Low, "t")
            .with_location("a.py", Some(0));
        assert_eq!(f.line, None);
    }
}
