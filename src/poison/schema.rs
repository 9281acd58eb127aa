use once_cell::sync::Lazy;
use regex::Regex;

use crate::finding::{Category, Finding, InputSchema, Severity, ToolDefinition};
use crate::poison::{homoglyph, injection, unicode};

static SHELL_META: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[<>{}\[\]`$|;]"#).unwrap());
static SHELL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\$\(.*\)|&&|\|\||>\s*/dev/|rm\s+-rf").unwrap());

/// Four schema-manipulation sub-checks, per §4.2.8.
pub fn scan_tool(tool: &ToolDefinition) -> Vec<Finding> {
    let mut findings = Vec::new();
    let schema = &tool.input_schema;

    findings.extend(check_permissive(schema));

    for (prop_name, prop) in &schema.properties {
        let field_label = format!("properties.{}.description", prop_name);
        if let Some(desc) = &prop.description {
            findings.extend(unicode::scan_field(&field_label, desc));
            findings.extend(injection::scan_field(&field_label, desc));
            findings.extend(homoglyph::scan_field(&field_label, desc));
        }

        if let Some(serde_json::Value::String(default_str)) = &prop.default {
            findings.extend(check_default(prop_name, default_str));
        }

        for enum_val in &prop.enum_values {
            if enum_val.chars().count() > 50 {
                let hits = injection::scan_field(&format!("properties.{}.enum", prop_name), enum_val);
                if !hits.is_empty() {
                    findings.push(Finding::new(
                        "TP_SCHEMA_004",
                        Category::schema_manipulation(),
                        Severity::High,
                        format!("Long enum value on `{}` contains injection patterns", prop_name),
                    ));
                }
            }
        }
    }

    findings
}

fn check_permissive(schema: &InputSchema) -> Vec<Finding> {
    if schema.additional_properties == Some(true) && schema.properties.is_empty() {
        return vec![Finding::new(
            "TP_SCHEMA_001",
            Category::schema_manipulation(),
            Severity::High,
            "Schema accepts arbitrary fields (additionalProperties=true, properties={})",
        )];
    }
    Vec::new()
}

fn check_default(prop_name: &str, value: &str) -> Vec<Finding> {
    let is_shell = SHELL_PATTERN.is_match(value);
    let suspicious = value.chars().count() > 100 || SHELL_META.is_match(value) || is_shell;
    if !suspicious {
        return Vec::new();
    }

    let injection_hits = injection::scan_field(&format!("properties.{}.default", prop_name), value);
    let severity = if is_shell || !injection_hits.is_empty() {
        Severity::Critical
    } else {
        Severity::Medium
    };

    vec![Finding::new(
        "TP_SCHEMA_003",
        Category::schema_manipulation(),
        severity,
        format!("Suspicious default value on property `{}`", prop_name),
    )
    .with_evidence(value.chars().take(100).collect::<String>())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn permissive_schema_scenario() {
        let schema = InputSchema {
            type_: Some("object".to_string()),
            properties: BTreeMap::new(),
            additional_properties: Some(true),
            required: vec![],
        };
        let tool = ToolDefinition {
            name: "t".into(),
            description: "d".into(),
            input_schema: schema,
        };
        let findings = scan_tool(&tool);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].pattern_id, "TP_SCHEMA_001");
        assert_eq!(findings[0].severity, Severity::High);
    }
}
