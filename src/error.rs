use thiserror::Error;

/// The closed error taxonomy for the audit pipeline.
///
/// Every variant carries a human message and, where one applies, a
/// concrete hint the user can act on. `Display` renders a single line.
#[derive(Debug, Error)]
pub enum AgentAuditError {
    #[error("input error: {message}")]
    Input {
        message: String,
        hint: Option<String>,
    },

    #[error("clone/fetch failed: {message}")]
    Clone {
        message: String,
        hint: Option<String>,
    },

    #[error("provider auth failed: {message}")]
    ProviderAuth {
        message: String,
        hint: Option<String>,
    },

    #[error("provider rate limited: {message}")]
    ProviderRateLimit {
        message: String,
        hint: Option<String>,
    },

    #[error("model not found: {message}")]
    ProviderModelNotFound {
        message: String,
        hint: Option<String>,
    },

    #[error("context window exceeded: {message}")]
    ProviderContextTooLarge {
        message: String,
        hint: Option<String>,
    },

    #[error("provider server error: {message}")]
    ProviderServer {
        message: String,
        hint: Option<String>,
    },

    #[error("could not parse provider response: {message}")]
    ProviderParse {
        message: String,
        hint: Option<String>,
    },

    #[error("verification unavailable: {message}")]
    VerificationUnavailable {
        message: String,
        hint: Option<String>,
    },
}

impl AgentAuditError {
    pub fn hint(&self) -> Option<&str> {
        match self {
            AgentAuditError::Input { hint, .. }
            | AgentAuditError::Clone { hint, .. }
            | AgentAuditError::ProviderAuth { hint, .. }
            | AgentAuditError::ProviderRateLimit { hint, .. }
            | AgentAuditError::ProviderModelNotFound { hint, .. }
            | AgentAuditError::ProviderContextTooLarge { hint, .. }
            | AgentAuditError::ProviderServer { hint, .. }
            | AgentAuditError::ProviderParse { hint, .. }
            | AgentAuditError::VerificationUnavailable { hint, .. } => hint.as_deref(),
        }
    }

    /// Exit code convention shared by every command surface: 2 for any
    /// core-pipeline error.
    pub fn exit_code(&self) -> i32 {
        2
    }

    pub fn input(message: impl Into<String>) -> Self {
        AgentAuditError::Input {
            message: message.into(),
            hint: None,
        }
    }

    pub fn input_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        AgentAuditError::Input {
            message: message.into(),
            hint: Some(hint.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_single_line() {
        let err = AgentAuditError::input_with_hint("bad url", "use https://host/owner/repo");
        let rendered = format!("{}", err);
        assert!(!rendered.contains('\n'));
        assert_eq!(err.hint(), Some("use https://host/owner/repo"));
    }

    #[test]
    fn exit_code_is_always_two() {
        let err = AgentAuditError::ProviderServer {
            message: "503".into(),
            hint: None,
        };
        assert_eq!(err.exit_code(), 2);
    }
}
