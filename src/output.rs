use colored::Colorize;
use std::collections::{HashMap, HashSet};

use crate::finding::{Finding, Report, ReportResult, Severity};
use crate::quarantine::QuarantineEntry;

// ---------------------------------------------------------------------------
// Result display
// ---------------------------------------------------------------------------

/// Print the final verdict with color coding and a banner, matching the
/// three-way `ReportResult` outcome.
pub fn print_result(result: ReportResult) {
    println!();
    let line = "=".repeat(60);

    match result {
        ReportResult::Safe => {
            println!("{}", line.green());
            println!("{}", "  SAFE -- No meaningful risk signals detected".green().bold());
            println!("{}", line.green());
        }
        ReportResult::Caution => {
            println!("{}", line.yellow());
            println!("{}", "  CAUTION -- Suspicious patterns detected, review before use".yellow().bold());
            println!("{}", line.yellow());
        }
        ReportResult::Unsafe => {
            println!("{}", line.red().bold());
            println!("{}", "  UNSAFE -- High-confidence malicious signals found".red().bold());
            println!("{}", "  Do not install or execute this package.".red().bold());
            println!("{}", line.red().bold());
        }
    }
    println!();
}

// ---------------------------------------------------------------------------
// Findings display
// ---------------------------------------------------------------------------

/// Print findings grouped by category, in descending severity order within
/// each group.
pub fn print_findings(findings: &[Finding]) {
    if findings.is_empty() {
        println!("{} No findings.", "  [*]".green());
        return;
    }

    let mut by_category: HashMap<String, Vec<&Finding>> = HashMap::new();
    for finding in findings {
        by_category.entry(finding.category.to_string()).or_default().push(finding);
    }

    let mut categories: Vec<&String> = by_category.keys().collect();
    categories.sort();

    for category in categories {
        let mut group = by_category.remove(category).unwrap_or_default();
        group.sort_by(|a, b| b.severity.cmp(&a.severity));

        println!();
        println!(
            "  {} {} ({} finding{})",
            ">>".bold(),
            category.bold(),
            group.len(),
            if group.len() == 1 { "" } else { "s" }
        );
        println!("  {}", "-".repeat(56));

        for finding in group {
            let severity_str = format_severity(finding.severity);
            let location = match (&finding.file, finding.line) {
                (Some(file), Some(line)) => format!("{}:{}", file, line),
                (Some(file), None) => file.clone(),
                (None, _) => "<no location>".to_string(),
            };

            println!("  {} [{}] {}", severity_str, finding.pattern_id.dimmed(), finding.title.bold());
            println!("       {}", location.dimmed());
            if !finding.content.is_empty() {
                println!("       {}", finding.content.dimmed());
            }
            if finding.by_design {
                println!("       {}", "(by design -- no score impact)".dimmed());
            }
        }
    }
}

/// Format a severity label with appropriate color.
fn format_severity(severity: Severity) -> String {
    match severity {
        Severity::Info => format!("{}", "INFO    ".dimmed()),
        Severity::Warning => format!("{}", "WARNING ".dimmed()),
        Severity::Low => format!("{}", "LOW     ".dimmed()),
        Severity::Medium => format!("{}", "MEDIUM  ".yellow()),
        Severity::High => format!("{}", "HIGH    ".red()),
        Severity::Critical => format!("{}", "CRITICAL".red().bold()),
    }
}

// ---------------------------------------------------------------------------
// Scan summary
// ---------------------------------------------------------------------------

/// Print a summary with scan statistics ahead of the findings list.
pub fn print_scan_summary(report: &Report) {
    println!();
    println!("  {} scan complete in {}ms", "agentaudit".bold().cyan(), report.duration_ms);
    println!("  {} findings", report.findings_count);
    println!("  Risk score: {}", format_score(report.risk_score));
    if let Some(model) = &report.audit_model {
        println!("  Audit model: {} ({})", model, report.audit_provider.as_deref().unwrap_or("unknown"));
    }
    if let Some(v) = &report.verification {
        println!(
            "  Verification: {} verified, {} demoted, {} rejected, {} unverified",
            v.verified_count, v.demoted_count, v.rejected_count, v.unverified_count
        );
    }

    if report.findings.is_empty() {
        return;
    }

    let mut critical = 0u32;
    let mut high = 0u32;
    let mut medium = 0u32;
    let mut low = 0u32;
    for f in &report.findings {
        match f.severity {
            Severity::Critical => critical += 1,
            Severity::High => high += 1,
            Severity::Medium => medium += 1,
            Severity::Low | Severity::Warning | Severity::Info => low += 1,
        }
    }

    println!(
        "  Breakdown: {} critical, {} high, {} medium, {} low",
        if critical > 0 { critical.to_string().red().bold().to_string() } else { "0".to_string() },
        if high > 0 { high.to_string().red().to_string() } else { "0".to_string() },
        if medium > 0 { medium.to_string().yellow().to_string() } else { "0".to_string() },
        low
    );
}

/// Format the numeric risk score with color (thresholds mirror the Safe/
/// Caution/Unsafe bucketing: <=25 safe, <=50 caution, else unsafe).
fn format_score(score: u32) -> String {
    if score == 0 {
        format!("{}", "0".green().bold())
    } else if score <= 25 {
        format!("{}", score.to_string().cyan().bold())
    } else if score <= 50 {
        format!("{}", score.to_string().yellow().bold())
    } else {
        format!("{}", score.to_string().red().bold())
    }
}

// ---------------------------------------------------------------------------
// Quarantine list display
// ---------------------------------------------------------------------------

/// Print a list of quarantine entries.
pub fn print_quarantine_list(entries: &[QuarantineEntry], detailed: bool, format: &str) {
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(entries).unwrap_or_default());
        return;
    }

    println!();
    println!("  {} Quarantined items ({})", "agentaudit".bold().cyan(), entries.len());
    println!("  {}", "-".repeat(60));

    for entry in entries {
        let status_str = match &entry.status {
            crate::quarantine::QuarantineStatus::Pending => "PENDING".yellow().to_string(),
            crate::quarantine::QuarantineStatus::Approved => "APPROVED".green().to_string(),
            crate::quarantine::QuarantineStatus::Rejected => "REJECTED".red().to_string(),
        };

        println!("  {} [{}] {} ({})", status_str, entry.id.dimmed(), entry.source.bold(), entry.source_type);

        if detailed {
            println!("       Path:    {}", entry.path.display());
            println!("       Created: {}", entry.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
            println!("       Updated: {}", entry.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
            if let Some(ref reason) = entry.reason {
                println!("       Reason:  {}", reason);
            }
            if let Some(score) = entry.scan_score {
                println!("       Score:   {}", format_score(score));
            }
            println!();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::Category;

    #[test]
    fn groups_findings_by_category_not_phase() {
        let findings = vec![
            Finding::new("T1", Category::secrets(), Severity::High, "leaked key").with_location("a.py", Some(3)),
            Finding::new("T2", Category::network(), Severity::Low, "outbound call").with_location("b.py", Some(9)),
        ];
        // Smoke test: this must not panic now that Phase no longer exists.
        print_findings(&findings);
    }

    #[test]
    fn missing_file_renders_without_panicking() {
        let f = Finding::new("T3", Category::injection(), Severity::Medium, "prompt injection");
        print_findings(std::slice::from_ref(&f));
        assert!(f.file.is_none());
    }
}
