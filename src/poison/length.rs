use crate::finding::{Category, Finding, Severity};
use crate::finding::ToolDefinition;

/// Excessive-length checks, per §4.2.4. Z-score anomaly detection only
/// runs when at least 5 tools are present.
pub fn scan_batch(tools: &[ToolDefinition]) -> Vec<Finding> {
    let mut findings = Vec::new();
    let mut absolute_fired: Vec<bool> = vec![false; tools.len()];

    for (i, tool) in tools.iter().enumerate() {
        let len = tool.description.chars().count();
        if tool.description.trim().is_empty() {
            findings.push(Finding::new(
                "TP_LENGTH_002",
                Category::excessive_length(),
                Severity::Info,
                format!("Tool `{}` has no description", tool.name),
            ));
            absolute_fired[i] = true;
            continue;
        }
        if len > 2000 {
            findings.push(Finding::new(
                "TP_LENGTH_001",
                Category::excessive_length(),
                Severity::High,
                format!("Tool `{}` description is excessively long ({} chars)", tool.name, len),
            ));
            absolute_fired[i] = true;
        } else if len > 1000 {
            findings.push(Finding::new(
                "TP_LENGTH_003",
                Category::excessive_length(),
                Severity::Warning,
                format!("Tool `{}` description is unusually long ({} chars)", tool.name, len),
            ));
            absolute_fired[i] = true;
        }
    }

    if tools.len() >= 5 {
        let lens: Vec<f64> = tools.iter().map(|t| t.description.chars().count() as f64).collect();
        let mean = lens.iter().sum::<f64>() / lens.len() as f64;
        let variance = lens.iter().map(|l| (l - mean).powi(2)).sum::<f64>() / lens.len() as f64;
        let stddev = variance.sqrt();

        if stddev > 0.0 {
            for (i, tool) in tools.iter().enumerate() {
                if absolute_fired[i] {
                    continue;
                }
                let z = (lens[i] - mean) / stddev;
                if z > 2.5 {
                    findings.push(Finding::new(
                        "TP_LENGTH_004",
                        Category::excessive_length(),
                        Severity::Warning,
                        format!(
                            "Tool `{}` description length is a statistical outlier (z={:.2})",
                            tool.name, z
                        ),
                    ));
                }
            }
        }
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(name: &str, desc: &str) -> ToolDefinition {
        ToolDefinition {
            name: name.to_string(),
            description: desc.to_string(),
            input_schema: Default::default(),
        }
    }

    #[test]
    fn no_description_emits_exactly_one_info_finding() {
        let tools = vec![tool("t1", "")];
        let findings = scan_batch(&tools);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].pattern_id, "TP_LENGTH_002");
        assert_eq!(findings[0].severity, Severity::Info);
    }

    #[test]
    fn z_score_disabled_under_five_tools() {
        let tools = vec![
            tool("t1", &"a".repeat(10)),
            tool("t2", &"a".repeat(10)),
            tool("t3", &"a".repeat(900)),
        ];
        let findings = scan_batch(&tools);
        assert!(findings.iter().all(|f| f.pattern_id != "TP_LENGTH_004"));
    }
}
