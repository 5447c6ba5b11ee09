use std::time::Duration;

/// Core error type shared by both tools.
///
/// Adapter crates map their specific errors into this type so the binaries can
/// report failures consistently (message + optional remediation hint, exit 1).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("missing required environment variables: {}", .0.join(", "))]
    MissingConfig(Vec<String>),

    #[error("config error: {0}")]
    Config(String),

    #[error("{tool} is not installed")]
    MissingDependency { tool: String, hint: String },

    #[error("you are not authenticated with {tool}")]
    NotAuthenticated { tool: String, hint: String },

    #[error("could not determine repository: {0}")]
    RepositoryResolution(String),

    #[error("failed to download logs: {0}")]
    Transfer(String),

    #[error("telegram error: {0}")]
    Transmit(String),

    #[error("no /logs command received within {}s", .0.as_secs())]
    ListenTimeout(Duration),

    #[error("cancelled")]
    Cancelled,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    /// Remediation text printed after the error line, if any.
    pub fn hint(&self) -> Option<&str> {
        match self {
            Error::MissingConfig(_) => Some("Please set these in your .env file."),
            Error::MissingDependency { hint, .. } | Error::NotAuthenticated { hint, .. } => {
                Some(hint)
            }
            Error::RepositoryResolution(_) => Some(
                "Make sure you are in a git repository with a GitHub remote.",
            ),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_names_every_key() {
        let e = Error::MissingConfig(vec!["A".to_string(), "B".to_string()]);
        assert_eq!(e.to_string(), "missing required environment variables: A, B");
        assert!(e.hint().is_some());
    }

    #[test]
    fn dependency_errors_carry_their_hint() {
        let e = Error::NotAuthenticated {
            tool: "gh".to_string(),
            hint: "Please run: gh auth login".to_string(),
        };
        assert_eq!(e.hint(), Some("Please run: gh auth login"));
        assert!(Error::Cancelled.hint().is_none());
    }
}
