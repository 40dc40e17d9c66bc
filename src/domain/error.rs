//! Domain error types.

/// Top-level error type for stratlab.
#[derive(Debug, thiserror::Error)]
pub enum StratlabError {
    #[error("invalid strategy definition: {reason}")]
    Definition { reason: String },

    #[error("{provider} request failed: {reason}")]
    Provider { provider: String, reason: String },

    #[error("all market data providers failed: {summary}")]
    AllProvidersFailed { summary: String },

    #[error("insufficient bars: have {have}, need {need}")]
    InsufficientBars { have: usize, need: usize },

    #[error("strategy not found: {id}")]
    StrategyNotFound { id: String },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("unauthorized: {reason}")]
    Unauthorized { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StratlabError {
    /// True for errors caused by the upstream market-data providers, which
    /// the web layer reports as gateway failures rather than client or
    /// server faults.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            StratlabError::Provider { .. }
                | StratlabError::AllProvidersFailed { .. }
                | StratlabError::InsufficientBars { .. }
        )
    }

    fn exit_code(&self) -> u8 {
        match self {
            StratlabError::Io(_) => 1,
            StratlabError::ConfigParse { .. }
            | StratlabError::ConfigMissing { .. }
            | StratlabError::ConfigInvalid { .. } => 2,
            StratlabError::Database { .. }
            | StratlabError::DatabaseQuery { .. }
            | StratlabError::StrategyNotFound { .. } => 3,
            StratlabError::Definition { .. } => 4,
            StratlabError::Provider { .. }
            | StratlabError::AllProvidersFailed { .. }
            | StratlabError::InsufficientBars { .. } => 5,
            StratlabError::Unauthorized { .. } => 6,
        }
    }
}

impl From<&StratlabError> for std::process::ExitCode {
    fn from(err: &StratlabError) -> Self {
        std::process::ExitCode::from(err.exit_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        let err = StratlabError::InsufficientBars { have: 12, need: 50 };
        let msg = err.to_string();
        assert!(msg.contains("12"));
        assert!(msg.contains("50"));

        let err = StratlabError::Provider {
            provider: "binance".into(),
            reason: "HTTP 503".into(),
        };
        assert!(err.to_string().contains("binance"));
    }

    #[test]
    fn upstream_classification() {
        assert!(StratlabError::AllProvidersFailed { summary: "x".into() }.is_upstream());
        assert!(StratlabError::Provider {
            provider: "binance".into(),
            reason: "503".into()
        }
        .is_upstream());
        assert!(!StratlabError::Definition { reason: "x".into() }.is_upstream());
        assert!(!StratlabError::Database { reason: "x".into() }.is_upstream());
    }

    #[test]
    fn exit_codes_are_stable() {
        let io: StratlabError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert_eq!(io.exit_code(), 1);
        assert_eq!(
            StratlabError::ConfigMissing {
                section: "server".into(),
                key: "port".into()
            }
            .exit_code(),
            2
        );
        assert_eq!(
            StratlabError::Definition { reason: "bad".into() }.exit_code(),
            4
        );
        assert_eq!(
            StratlabError::AllProvidersFailed { summary: "x".into() }.exit_code(),
            5
        );
    }
}
