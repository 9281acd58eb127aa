use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::finding::{Category, Finding, Severity};

/// Cyrillic -> Latin lookalikes, per §4.2.6.
static CYRILLIC: Lazy<HashMap<char, char>> = Lazy::new(|| {
    [
        ('а', 'a'),
        ('е', 'e'),
        ('о', 'o'),
        ('р', 'p'),
        ('с', 'c'),
        ('у', 'y'),
        ('х', 'x'),
        ('і', 'i'),
        ('ј', 'j'),
        ('ѕ', 's'),
        ('А', 'A'),
        ('В', 'B'),
        ('Е', 'E'),
        ('К', 'K'),
        ('М', 'M'),
        ('Н', 'H'),
        ('О', 'O'),
        ('Р', 'P'),
        ('С', 'C'),
        ('Т', 'T'),
        ('Х', 'X'),
    ]
    .into_iter()
    .collect()
});

/// Greek -> Latin lookalikes, per §4.2.6.
static GREEK: Lazy<HashMap<char, char>> = Lazy::new(|| {
    [
        ('α', 'a'),
        ('β', 'b'),
        ('ο', 'o'),
        ('ρ', 'p'),
        ('υ', 'u'),
        ('τ', 't'),
        ('κ', 'k'),
        ('Α', 'A'),
        ('Β', 'B'),
        ('Ε', 'E'),
        ('Ζ', 'Z'),
        ('Η', 'H'),
        ('Ι', 'I'),
        ('Κ', 'K'),
        ('Μ', 'M'),
        ('Ν', 'N'),
        ('Ο', 'O'),
        ('Ρ', 'P'),
        ('Τ', 'T'),
        ('Υ', 'Y'),
        ('Χ', 'X'),
    ]
    .into_iter()
    .collect()
});

fn lookalike(c: char) -> Option<char> {
    CYRILLIC.get(&c).or_else(|| GREEK.get(&c)).copied()
}

/// Scan a field for homoglyph obfuscation, per §4.2.6.
pub fn scan_field(field_name: &str, text: &str) -> Vec<Finding> {
    let lookalikes: Vec<(char, char)> = text.chars().filter_map(|c| lookalike(c).map(|l| (c, l))).collect();
    if lookalikes.is_empty() {
        return Vec::new();
    }

    let has_latin = text.chars().any(|c| c.is_ascii_alphabetic());
    let all_non_latin = !text.chars().any(|c| c.is_ascii_alphabetic() && lookalike(c).is_none());

    // A homoglyph in the tool's own name is treated as critical regardless
    // of how many characters were substituted: an altered identity is
    // dangerous even from a single swapped character.
    if field_name == "name" {
        let pseudonym: String = text.chars().map(|c| lookalike(c).unwrap_or(c)).collect();
        let mut finding = Finding::new(
            "TP_HOMOGLYPH_001",
            Category::homoglyph(),
            Severity::Critical,
            format!("Tool name `{}` contains homoglyph lookalike characters", text),
        )
        .with_evidence(
            lookalikes
                .iter()
                .map(|(o, l)| format!("U+{:04X}->'{}'", *o as u32, l))
                .collect::<Vec<_>>()
                .join(", "),
        );
        if all_non_latin {
            finding = finding.with_description(format!("Reconstructed Latin pseudonym: `{}`", pseudonym));
        }
        return vec![finding];
    }

    if has_latin {
        let severity = if lookalikes.len() > 5 {
            Severity::Critical
        } else {
            Severity::High
        };
        return vec![Finding::new(
            "TP_HOMOGLYPH_002",
            Category::homoglyph(),
            severity,
            format!("Mixed-script homoglyph characters in `{}`", field_name),
        )
        .with_evidence(
            lookalikes
                .iter()
                .take(5)
                .map(|(o, l)| format!("U+{:04X}->'{}'", *o as u32, l))
                .collect::<Vec<_>>()
                .join(", "),
        )];
    }

    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn homoglyph_tool_name_scenario() {
        let findings = scan_field("name", "get_d\u{0430}ta");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].pattern_id, "TP_HOMOGLYPH_001");
        assert_eq!(findings[0].severity, Severity::Critical);
    }
}
