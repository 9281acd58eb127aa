use once_cell::sync::Lazy;
use regex::Regex;

use crate::finding::{Category, Confidence, Finding, Severity};

struct Rule {
    pattern_id: &'static str,
    re: Regex,
    severity: Severity,
    category: Category,
    description: &'static str,
}

fn truncate(s: &str, n: usize) -> &str {
    if s.len() <= n {
        s
    } else {
        let mut end = n;
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        &s[..end]
    }
}

fn cat(s: &str) -> Category {
    Category::new(s.to_string())
}

/// The ~12-rule pattern pack, per §4.3. Each match becomes a Finding with
/// a default confidence of medium.
static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        Rule {
            pattern_id: "CMD_INJECT",
            re: Regex::new(r#"(?:subprocess\.(call|run|Popen|check_output)|child_process\.(exec|spawn))\s*\([^)]*(\+|%s|f['"])"#).unwrap(),
            severity: Severity::Critical,
            category: cat("injection"),
            description: "Command execution with tainted string concatenation/interpolation",
        },
        Rule {
            pattern_id: "DYN_EVAL",
            re: Regex::new(r"\b(eval|exec)\s*\(").unwrap(),
            severity: Severity::High,
            category: cat("injection"),
            description: "Dynamic code evaluation",
        },
        Rule {
            pattern_id: "HARDCODED_SECRET",
            re: Regex::new(r#"(?i)(api[_-]?key|secret|token|password)\s*[:=]\s*['"][A-Za-z0-9_\-\.]{12,}['"]"#).unwrap(),
            severity: Severity::High,
            category: cat("secrets"),
            description: "Hardcoded secret-shaped literal",
        },
        Rule {
            pattern_id: "TLS_VERIFY_DISABLED",
            re: Regex::new(r"(?i)(verify\s*=\s*False|NODE_TLS_REJECT_UNAUTHORIZED\s*=\s*['\"]?0|rejectUnauthorized\s*:\s*false|InsecureSkipVerify\s*:\s*true)").unwrap(),
            severity: Severity::High,
            category: cat("crypto"),
            description: "TLS certificate verification disabled",
        },
        Rule {
            pattern_id: "PATH_TRAV",
            re: Regex::new(r#"(?:open|readFile|join)\s*\([^)]*\.\.[/\\]"#).unwrap(),
            severity: Severity::Medium,
            category: cat("filesystem"),
            description: "Path-traversal-shaped file access",
        },
        Rule {
            pattern_id: "CORS_WILDCARD",
            re: Regex::new(r#"(?i)Access-Control-Allow-Origin['"]?\s*[:=]\s*['"]\*['"]"#).unwrap(),
            severity: Severity::Medium,
            category: cat("network"),
            description: "Wildcard CORS origin",
        },
        Rule {
            pattern_id: "TELEMETRY_UNDISCLOSED",
            re: Regex::new(r"(?i)(posthog|segment\.io|mixpanel|amplitude)\.(track|capture|identify)\s*\(").unwrap(),
            severity: Severity::Low,
            category: cat("privacy"),
            description: "Undisclosed telemetry/analytics call",
        },
        Rule {
            pattern_id: "SHELL_EXEC",
            re: Regex::new(r"(?i)(os\.system|shell\s*=\s*True|Runtime\.getRuntime\(\)\.exec)").unwrap(),
            severity: Severity::High,
            category: cat("injection"),
            description: "Shell execution primitive",
        },
        Rule {
            pattern_id: "SQL_INTERP",
            re: Regex::new(r#"(?i)(SELECT|INSERT|UPDATE|DELETE)\b[^;]*['"]\s*\+\s*\w+|f['"]\s*(SELECT|INSERT|UPDATE|DELETE)"#).unwrap(),
            severity: Severity::High,
            category: cat("injection"),
            description: "SQL built via string interpolation/concatenation",
        },
        Rule {
            pattern_id: "UNSAFE_YAML",
            re: Regex::new(r"yaml\.(unsafe_)?load\s*\(").unwrap(),
            severity: Severity::High,
            category: cat("deserialization"),
            description: "Unsafe YAML loading",
        },
        Rule {
            pattern_id: "PICKLE_LOAD",
            re: Regex::new(r"pickle\.(loads?|Unpickler)").unwrap(),
            severity: Severity::Critical,
            category: cat("deserialization"),
            description: "Pickle deserialization — arbitrary code execution risk",
        },
        Rule {
            pattern_id: "PROMPT_INJECT_MARKER",
            re: Regex::new(r"(?i)(ignore (all |the )?(previous|prior) instructions|you are now|<\|im_start\|>)").unwrap(),
            severity: Severity::Medium,
            category: cat("prompt-injection"),
            description: "Prompt-injection marker in source text",
        },
    ]
});

/// Scan one file's text against the fixed rule pack. Line numbers are
/// 1-based.
pub fn scan_file(file: &str, contents: &str) -> Vec<Finding> {
    let mut findings = Vec::new();
    for (line_idx, line) in contents.lines().enumerate() {
        for rule in RULES.iter() {
            if rule.re.is_match(line) {
                let snippet = if line.len() > 200 {
                    format!("{} ...", truncate(line, 200))
                } else {
                    line.to_string()
                };
                let mut finding = Finding::new(
                    rule.pattern_id,
                    rule.category.clone(),
                    rule.severity,
                    rule.description,
                )
                .with_location(file, Some(line_idx + 1))
                .with_content(snippet.trim().to_string());
                finding.confidence = Confidence::Medium;
                findings.push(finding);
            }
        }
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_numbers_are_one_based() {
        let contents = "line one\npickle.loads(data)\nline three";
        let findings = scan_file("a.py", contents);
        let f = findings.iter().find(|f| f.pattern_id == "PICKLE_LOAD").unwrap();
        assert_eq!(f.line, Some(2));
    }

    #[test]
    fn tls_verify_disabled_detected() {
        let findings = scan_file("a.py", "requests.get(url, verify=False)");
        assert!(findings.iter().any(|f| f.pattern_id == "TLS_VERIFY_DISABLED"));
    }
}
