use serde_json::Value;

/// Does this JSON value look like a plausible audit/verification report,
/// per §4.4.3's acceptance rule: a `findings` array, plus at least one of
/// `skill_slug`, `risk_score`, or `result`.
fn looks_like_report(v: &Value) -> bool {
    let obj = match v.as_object() {
        Some(o) => o,
        None => return false,
    };
    if !obj.get("findings").map(|f| f.is_array()).unwrap_or(false) {
        return false;
    }
    obj.contains_key("skill_slug") || obj.contains_key("risk_score") || obj.contains_key("result")
}

/// Extract every fenced code-block body (` ```...``` `, with or without a
/// language tag) from `text`.
fn fenced_blocks(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("```") {
        let after_open = &rest[start + 3..];
        let body_start = after_open.find('\n').map(|i| i + 1).unwrap_or(0);
        let body_and_rest = &after_open[body_start..];
        if let Some(end) = body_and_rest.find("```") {
            blocks.push(body_and_rest[..end].to_string());
            rest = &body_and_rest[end + 3..];
        } else {
            break;
        }
    }
    blocks
}

#[derive(PartialEq, Eq, Clone, Copy)]
enum WalkState {
    Normal,
    InString,
    EscapeInString,
    Done,
}

/// Find every balanced top-level `{...}` substring of `text`, via a
/// character walk that tracks string literals and escapes so that braces
/// inside string content are not mistaken for structural braces.
fn balanced_brace_blocks(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut blocks = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '{' {
            let mut depth = 0i32;
            let mut state = WalkState::Normal;
            let mut j = i;
            while j < chars.len() {
                let c = chars[j];
                state = match state {
                    WalkState::Normal => match c {
                        '"' => WalkState::InString,
                        '{' => {
                            depth += 1;
                            WalkState::Normal
                        }
                        '}' => {
                            depth -= 1;
                            if depth == 0 {
                                WalkState::Done
                            } else {
                                WalkState::Normal
                            }
                        }
                        _ => WalkState::Normal,
                    },
                    WalkState::InString => match c {
                        '\\' => WalkState::EscapeInString,
                        '"' => WalkState::Normal,
                        _ => WalkState::InString,
                    },
                    WalkState::EscapeInString => WalkState::InString,
                    WalkState::Done => WalkState::Done,
                };
                if state == WalkState::Done {
                    let candidate: String = chars[i..=j].iter().collect();
                    blocks.push(candidate);
                    break;
                }
                j += 1;
            }
            i += 1;
        } else {
            i += 1;
        }
    }
    blocks
}

/// Errors from extraction carry a short preview of the raw body, never
/// the full text (it may be large and is logged at debug level by the
/// caller instead).
pub struct ExtractError {
    pub preview: String,
}

/// Try, in order: the whole body; fenced code blocks, largest-last-first;
/// every balanced top-level `{...}` block, tried largest-first. Returns
/// the first candidate that passes `looks_like_report`.
pub fn extract_report_json(raw: &str) -> Result<Value, ExtractError> {
    if let Ok(v) = serde_json::from_str::<Value>(raw.trim()) {
        if looks_like_report(&v) {
            return Ok(v);
        }
    }

    let mut fenced = fenced_blocks(raw);
    fenced.sort_by_key(|b| b.len());
    for block in fenced.into_iter().rev() {
        if let Ok(v) = serde_json::from_str::<Value>(block.trim()) {
            if looks_like_report(&v) {
                return Ok(v);
            }
        }
    }

    let mut braces = balanced_brace_blocks(raw);
    braces.sort_by_key(|b| b.len());
    for block in braces.into_iter().rev() {
        if let Ok(v) = serde_json::from_str::<Value>(&block) {
            if looks_like_report(&v) {
                return Ok(v);
            }
        }
    }

    let preview: String = raw.chars().take(2000).collect();
    Err(ExtractError { preview })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_whole_body() {
        let raw = r#"{"skill_slug":"x","findings":[]}"#;
        assert!(extract_report_json(raw).is_ok());
    }

    #[test]
    fn accepts_fenced_block_among_prose() {
        let raw = "Here is my analysis:\n```json\n{\"risk_score\": 10, \"findings\": [{\"title\":\"x\"}]}\n```\nThanks.";
        let v = extract_report_json(raw).unwrap();
        assert_eq!(v["risk_score"], 10);
    }

    #[test]
    fn picks_largest_fenced_block_when_multiple_present() {
        let raw = "```json\n{\"findings\": []}\n```\nSome prose with `{\"x\": 1}` inline.\n```json\n{\"result\": \"safe\", \"findings\": [{\"a\":1},{\"b\":2}]}\n```";
        let v = extract_report_json(raw).unwrap();
        assert_eq!(v["result"], "safe");
    }

    #[test]
    fn rejects_json_shaped_prose_without_findings() {
        let raw = r#"{"skill_slug": "x", "risk_score": 10}"#;
        assert!(extract_report_json(raw).is_err());
    }

    #[test]
    fn balanced_brace_walk_ignores_braces_inside_strings() {
        let raw = r#"prose { "findings": [{"title": "uses a { in text"}], "result": "caution" } more prose"#;
        let v = extract_report_json(raw).unwrap();
        assert_eq!(v["result"], "caution");
    }

    #[test]
    fn non_json_body_is_rejected_with_preview() {
        let raw = "<html><body>502 Bad Gateway</body></html>";
        let err = extract_report_json(raw).unwrap_err();
        assert!(err.preview.contains("502"));
    }
}
