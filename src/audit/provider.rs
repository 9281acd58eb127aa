use once_cell::sync::Lazy;
use serde_json::{json, Value};

use crate::error::AgentAuditError;

/// Closed set of wire shapes, per §4.4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Anthropic,
    Gemini,
    OpenAiCompatible,
}

/// A single entry in the static provider table.
pub struct ProviderEntry {
    pub display_name: &'static str,
    pub provider_key: &'static str,
    pub env_var: &'static str,
    pub base_url: &'static str,
    pub default_model: &'static str,
    pub kind: ProviderKind,
}

/// Thirteen providers: anthropic, gemini, and ten OpenAI-compatible
/// gateways/aggregators, plus the forced-fallback openrouter entry.
pub static PROVIDERS: &[ProviderEntry] = &[
    ProviderEntry {
        display_name: "Anthropic",
        provider_key: "anthropic",
        env_var: "ANTHROPIC_API_KEY",
        base_url: "https://api.anthropic.com/v1",
        default_model: "claude-sonnet-4-5",
        kind: ProviderKind::Anthropic,
    },
    ProviderEntry {
        display_name: "Google Gemini",
        provider_key: "gemini",
        env_var: "GEMINI_API_KEY",
        base_url: "https://generativelanguage.googleapis.com/v1beta",
        default_model: "gemini-2.5-pro",
        kind: ProviderKind::Gemini,
    },
    ProviderEntry {
        display_name: "OpenAI",
        provider_key: "openai",
        env_var: "OPENAI_API_KEY",
        base_url: "https://api.openai.com/v1",
        default_model: "gpt-4.1",
        kind: ProviderKind::OpenAiCompatible,
    },
    ProviderEntry {
        display_name: "OpenRouter",
        provider_key: "openrouter",
        env_var: "OPENROUTER_API_KEY",
        base_url: "https://openrouter.ai/api/v1",
        default_model: "anthropic/claude-sonnet-4.5",
        kind: ProviderKind::OpenAiCompatible,
    },
    ProviderEntry {
        display_name: "DeepSeek",
        provider_key: "deepseek",
        env_var: "DEEPSEEK_API_KEY",
        base_url: "https://api.deepseek.com/v1",
        default_model: "deepseek-chat",
        kind: ProviderKind::OpenAiCompatible,
    },
    ProviderEntry {
        display_name: "Mistral",
        provider_key: "mistral",
        env_var: "MISTRAL_API_KEY",
        base_url: "https://api.mistral.ai/v1",
        default_model: "mistral-large-latest",
        kind: ProviderKind::OpenAiCompatible,
    },
    ProviderEntry {
        display_name: "xAI Grok",
        provider_key: "grok",
        env_var: "XAI_API_KEY",
        base_url: "https://api.x.ai/v1",
        default_model: "grok-4",
        kind: ProviderKind::OpenAiCompatible,
    },
    ProviderEntry {
        display_name: "Groq",
        provider_key: "groq",
        env_var: "GROQ_API_KEY",
        base_url: "https://api.groq.com/openai/v1",
        default_model: "llama-3.3-70b-versatile",
        kind: ProviderKind::OpenAiCompatible,
    },
    ProviderEntry {
        display_name: "Together AI",
        provider_key: "together",
        env_var: "TOGETHER_API_KEY",
        base_url: "https://api.together.xyz/v1",
        default_model: "meta-llama/Llama-3.3-70B-Instruct-Turbo",
        kind: ProviderKind::OpenAiCompatible,
    },
    ProviderEntry {
        display_name: "Fireworks AI",
        provider_key: "fireworks",
        env_var: "FIREWORKS_API_KEY",
        base_url: "https://api.fireworks.ai/inference/v1",
        default_model: "accounts/fireworks/models/llama-v3p3-70b-instruct",
        kind: ProviderKind::OpenAiCompatible,
    },
    ProviderEntry {
        display_name: "Perplexity",
        provider_key: "perplexity",
        env_var: "PERPLEXITY_API_KEY",
        base_url: "https://api.perplexity.ai",
        default_model: "sonar",
        kind: ProviderKind::OpenAiCompatible,
    },
    ProviderEntry {
        display_name: "Cohere",
        provider_key: "cohere",
        env_var: "COHERE_API_KEY",
        base_url: "https://api.cohere.ai/compatibility/v1",
        default_model: "command-r-plus",
        kind: ProviderKind::OpenAiCompatible,
    },
    ProviderEntry {
        display_name: "Ollama (local)",
        provider_key: "ollama",
        env_var: "OLLAMA_API_KEY",
        base_url: "http://localhost:11434/v1",
        default_model: "llama3.3",
        kind: ProviderKind::OpenAiCompatible,
    },
];

fn key_present(entry: &ProviderEntry) -> bool {
    std::env::var(entry.env_var).map(|v| !v.is_empty()).unwrap_or(false)
}

fn by_key(key: &str) -> Option<&'static ProviderEntry> {
    PROVIDERS.iter().find(|p| p.provider_key == key)
}

fn openrouter() -> &'static ProviderEntry {
    by_key("openrouter").expect("openrouter entry is always present")
}

/// Known native-model prefixes, checked in order, per §4.4.1 step 1.
const MODEL_PREFIXES: &[(&str, &str)] = &[
    ("claude", "anthropic"),
    ("gemini", "gemini"),
    ("gpt", "openai"),
    ("deepseek", "deepseek"),
    ("mistral", "mistral"),
    ("grok", "grok"),
    ("glm", "openrouter"),
];

/// Resolve the active provider per §4.4.1's three-step precedence.
pub fn resolve_provider(
    model_override: Option<&str>,
    preferred_provider: Option<&str>,
) -> &'static ProviderEntry {
    if let Some(model) = model_override {
        if model.contains('/') {
            return openrouter();
        }
        for (prefix, key) in MODEL_PREFIXES {
            if model.starts_with(prefix) {
                if let Some(entry) = by_key(key).filter(|e| key_present(e)) {
                    return entry;
                }
                return openrouter();
            }
        }
        return openrouter();
    }

    if let Some(preferred) = preferred_provider {
        if let Some(entry) = by_key(preferred).filter(|e| key_present(e)) {
            return entry;
        }
    }

    PROVIDERS
        .iter()
        .find(|e| key_present(e))
        .unwrap_or_else(openrouter)
}

/// Per-model context windows, longest-key-first so a longer, more specific
/// prefix is matched before a shorter one that would otherwise shadow it.
static CONTEXT_WINDOWS: Lazy<Vec<(&'static str, u64)>> = Lazy::new(|| {
    let mut v = vec![
        ("claude-opus-4", 200_000u64),
        ("claude-sonnet-4-5", 200_000),
        ("claude-sonnet-4", 200_000),
        ("claude-haiku", 200_000),
        ("gemini-2.5-pro", 1_000_000),
        ("gemini-2.5-flash", 1_000_000),
        ("gemini", 1_000_000),
        ("gpt-4.1", 1_000_000),
        ("gpt-4o", 128_000),
        ("gpt", 128_000),
        ("deepseek-reasoner", 164_000),
        ("deepseek-chat", 164_000),
        ("deepseek", 128_000),
        ("mistral-large", 128_000),
        ("mistral", 32_000),
        ("grok-4", 256_000),
        ("grok", 131_072),
        ("llama-3.3-70b", 128_000),
        ("llama", 128_000),
        ("command-r-plus", 128_000),
        ("sonar", 127_000),
    ];
    v.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    v
});

const DEFAULT_CONTEXT_WINDOW: u64 = 64_000;

/// Look up a model's context window by longest-prefix match.
pub fn context_window_for(model: &str) -> u64 {
    CONTEXT_WINDOWS
        .iter()
        .find(|(prefix, _)| model.starts_with(prefix))
        .map(|(_, window)| *window)
        .unwrap_or(DEFAULT_CONTEXT_WINDOW)
}

/// Estimate input tokens as ceil(chars / 3.5), per §4.4.2.
pub fn estimate_tokens(text: &str) -> u64 {
    let chars = text.chars().count() as f64;
    (chars / 3.5).ceil() as u64
}

/// The result of one provider call: the raw text body plus whether the
/// provider signalled truncation.
pub struct ProviderResponse {
    pub body: String,
    pub truncated: bool,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

fn api_key_for(entry: &ProviderEntry) -> Result<String, AgentAuditError> {
    std::env::var(entry.env_var).map_err(|_| AgentAuditError::ProviderAuth {
        message: format!("missing API key for provider `{}`", entry.provider_key),
        hint: Some(format!("set {}", entry.env_var)),
    })
}

fn map_http_error(entry: &ProviderEntry, status: reqwest::StatusCode, body: &str) -> AgentAuditError {
    let snippet: String = body.chars().take(500).collect();
    match status.as_u16() {
        401 | 403 => AgentAuditError::ProviderAuth {
            message: format!("{} rejected the request: {}", entry.display_name, snippet),
            hint: Some(format!("check {}", entry.env_var)),
        },
        404 => AgentAuditError::ProviderModelNotFound {
            message: format!("{} reports the model was not found: {}", entry.display_name, snippet),
            hint: Some("verify --model against the provider's model list".to_string()),
        },
        413 => AgentAuditError::ProviderContextTooLarge {
            message: format!("{} rejected the request as too large", entry.display_name),
            hint: Some("reduce the package size or pick a larger-context model".to_string()),
        },
        429 => AgentAuditError::ProviderRateLimit {
            message: format!("{} rate limited the request", entry.display_name),
            hint: Some("retry later or switch providers".to_string()),
        },
        500..=599 => AgentAuditError::ProviderServer {
            message: format!("{} returned a server error ({status}): {snippet}", entry.display_name),
            hint: None,
        },
        _ => AgentAuditError::ProviderServer {
            message: format!("{} returned {status}: {snippet}", entry.display_name),
            hint: None,
        },
    }
}

/// Call `entry` with a system + user message pair. One request, 180s
/// timeout, no streaming, per §4.4.3.
pub async fn call(
    entry: &ProviderEntry,
    model: &str,
    system_prompt: &str,
    user_message: &str,
) -> Result<ProviderResponse, AgentAuditError> {
    let api_key = api_key_for(entry)?;
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(180))
        .build()
        .unwrap_or_default();

    let (url, body, headers): (String, Value, Vec<(&str, String)>) = match entry.kind {
        ProviderKind::Anthropic => (
            format!("{}/messages", entry.base_url),
            json!({
                "model": model,
                "max_tokens": 8192,
                "system": system_prompt,
                "messages": [{"role": "user", "content": user_message}],
            }),
            vec![
                ("x-api-key", api_key.clone()),
                ("anthropic-version", "2023-06-01".to_string()),
            ],
        ),
        ProviderKind::Gemini => (
            format!("{}/models/{}:generateContent?key={}", entry.base_url, model, api_key),
            json!({
                "systemInstruction": {"parts": [{"text": system_prompt}]},
                "contents": [{"role": "user", "parts": [{"text": user_message}]}],
            }),
            vec![],
        ),
        ProviderKind::OpenAiCompatible => (
            format!("{}/chat/completions", entry.base_url),
            json!({
                "model": model,
                "messages": [
                    {"role": "system", "content": system_prompt},
                    {"role": "user", "content": user_message},
                ],
            }),
            vec![("Authorization", format!("Bearer {}", api_key))],
        ),
    };

    let mut request = client.post(&url).json(&body);
    for (name, value) in headers {
        request = request.header(name, value);
    }

    let response = request.send().await.map_err(|e| AgentAuditError::ProviderServer {
        message: format!("{} request failed: {e}", entry.display_name),
        hint: Some("check network connectivity".to_string()),
    })?;

    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(map_http_error(entry, status, &text));
    }

    Ok(parse_response(entry.kind, &text))
}

fn parse_response(kind: ProviderKind, text: &str) -> ProviderResponse {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(_) => {
            return ProviderResponse {
                body: text.to_string(),
                truncated: false,
                input_tokens: None,
                output_tokens: None,
            }
        }
    };

    match kind {
        ProviderKind::Anthropic => {
            let content = value
                .get("content")
                .and_then(|c| c.as_array())
                .map(|parts| {
                    parts
                        .iter()
                        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                        .collect::<Vec<_>>()
                        .join("")
                })
                .unwrap_or_default();
            let truncated = value.get("stop_reason").and_then(|s| s.as_str()) == Some("max_tokens");
            ProviderResponse {
                body: content,
                truncated,
                input_tokens: value
                    .get("usage")
                    .and_then(|u| u.get("input_tokens"))
                    .and_then(|v| v.as_u64()),
                output_tokens: value
                    .get("usage")
                    .and_then(|u| u.get("output_tokens"))
                    .and_then(|v| v.as_u64()),
            }
        }
        ProviderKind::Gemini => {
            let candidate = value.get("candidates").and_then(|c| c.as_array()).and_then(|c| c.first());
            let content = candidate
                .and_then(|c| c.get("content"))
                .and_then(|c| c.get("parts"))
                .and_then(|p| p.as_array())
                .map(|parts| {
                    parts
                        .iter()
                        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                        .collect::<Vec<_>>()
                        .join("")
                })
                .unwrap_or_default();
            let truncated = candidate.and_then(|c| c.get("finishReason")).and_then(|f| f.as_str())
                == Some("MAX_TOKENS");
            ProviderResponse {
                body: content,
                truncated,
                input_tokens: value
                    .get("usageMetadata")
                    .and_then(|u| u.get("promptTokenCount"))
                    .and_then(|v| v.as_u64()),
                output_tokens: value
                    .get("usageMetadata")
                    .and_then(|u| u.get("candidatesTokenCount"))
                    .and_then(|v| v.as_u64()),
            }
        }
        ProviderKind::OpenAiCompatible => {
            let choice = value.get("choices").and_then(|c| c.as_array()).and_then(|c| c.first());
            let content = choice
                .and_then(|c| c.get("message"))
                .and_then(|m| m.get("content"))
                .and_then(|c| c.as_str())
                .unwrap_or_default()
                .to_string();
            let truncated = choice.and_then(|c| c.get("finish_reason")).and_then(|f| f.as_str())
                == Some("length");
            ProviderResponse {
                body: content,
                truncated,
                input_tokens: value
                    .get("usage")
                    .and_then(|u| u.get("prompt_tokens"))
                    .and_then(|v| v.as_u64()),
                output_tokens: value
                    .get("usage")
                    .and_then(|u| u.get("completion_tokens"))
                    .and_then(|v| v.as_u64()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slash_in_model_routes_to_openrouter() {
        let entry = resolve_provider(Some("meta-llama/llama-3"), None);
        assert_eq!(entry.provider_key, "openrouter");
    }

    #[test]
    fn context_window_longest_prefix_wins() {
        assert_eq!(context_window_for("claude-sonnet-4-5-20250929"), 200_000);
        assert_eq!(context_window_for("gpt-4.1-mini"), 1_000_000);
    }

    #[test]
    fn unknown_model_falls_back_to_default_window() {
        assert_eq!(context_window_for("some-unknown-model"), DEFAULT_CONTEXT_WINDOW);
    }

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens(&"a".repeat(7)), 2);
    }
}
