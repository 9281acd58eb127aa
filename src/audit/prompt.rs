use crate::finding::FileEntry;

/// The three-phase audit system prompt, loaded as an opaque blob per
/// §4.4. The orchestrator never reimplements the phases itself.
pub const AUDIT_SYSTEM_PROMPT: &str = include_str!("prompts/audit_system.md");

/// The narrower verification-pass system prompt.
pub const VERIFY_SYSTEM_PROMPT: &str = include_str!("prompts/verify_system.md");

/// Build the user message for the primary audit call: a short preamble
/// plus every File Entry as a fenced `### FILE: <path>` block.
pub fn build_audit_user_message(files: &[FileEntry]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Audit the following package, consisting of {} file(s).\n\n",
        files.len()
    ));
    for file in files {
        out.push_str("### FILE: ");
        out.push_str(&file.path);
        out.push('\n');
        out.push_str("```\n");
        out.push_str(&file.content);
        if !file.content.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("```\n\n");
    }
    out
}

/// Build the user message for one verification call: the finding's
/// fields, the cited file's text (or an absence marker), a file listing,
/// and the package manifest text if known.
pub fn build_verify_user_message(
    finding: &crate::finding::Finding,
    files: &[FileEntry],
    manifest: Option<&str>,
) -> String {
    let mut out = String::new();
    out.push_str("## Finding under review\n\n");
    out.push_str(&format!("pattern_id: {}\n", finding.pattern_id));
    out.push_str(&format!("category: {}\n", finding.category));
    out.push_str(&format!("severity: {}\n", finding.severity));
    out.push_str(&format!("title: {}\n", finding.title));
    out.push_str(&format!("description: {}\n", finding.description));
    out.push_str(&format!(
        "file: {}\n",
        finding.file.as_deref().unwrap_or("(none)")
    ));
    out.push_str(&format!(
        "line: {}\n",
        finding.line.map(|l| l.to_string()).unwrap_or_else(|| "(none)".to_string())
    ));
    out.push_str(&format!("content: {}\n\n", finding.content));

    out.push_str("## Cited file\n\n");
    match finding.file.as_deref().and_then(|f| files.iter().find(|e| e.path == f)) {
        Some(entry) => {
            out.push_str("```\n");
            out.push_str(&entry.content);
            out.push_str("\n```\n\n");
        }
        None => out.push_str("(the cited file is absent from this package)\n\n"),
    }

    out.push_str("## File listing\n\n");
    for f in files {
        out.push_str(&format!("- {}\n", f.path));
    }
    out.push('\n');

    out.push_str("## Package manifest\n\n");
    out.push_str(manifest.unwrap_or("(no manifest found)"));
    out.push('\n');

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_includes_every_file() {
        let files = vec![
            FileEntry { path: "a.py".into(), content: "print(1)".into(), byte_len: 8 },
            FileEntry { path: "b.py".into(), content: "print(2)".into(), byte_len: 8 },
        ];
        let msg = build_audit_user_message(&files);
        assert!(msg.contains("### FILE: a.py"));
        assert!(msg.contains("### FILE: b.py"));
    }
}
