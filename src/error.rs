#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Token error: {0}")]
    Token(String),
    #[error("Not authenticated")]
    Unauthenticated,
    #[cfg(feature = "idp")]
    #[error("Identity provider error ({kind}): {message}")]
    Identity {
        kind: crate::identity::IdpErrorKind,
        message: String,
    },
    #[cfg(any(feature = "idp", feature = "api"))]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{operation} failed with status {status}: {message}")]
    Remote {
        operation: &'static str,
        status: u16,
        message: String,
    },
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the remote side rejected the caller's credentials.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::Unauthenticated | Self::Remote { status: 401, .. }
        )
    }
}
