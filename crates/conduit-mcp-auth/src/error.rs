use thiserror::Error;

/// Authentication and authorization errors.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("discovery failed: {0}")]
    DiscoveryFailed(String),

    #[error("client registration failed: {0}")]
    RegistrationFailed(String),

    #[error("authorization failed: {0}")]
    AuthorizationFailed(String),

    #[error("state mismatch during authorization callback")]
    StateMismatch,

    #[error("token exchange failed: {0}")]
    TokenExchangeFailed(String),

    #[error("no authorization is in progress for this server")]
    NoPendingAuthorization,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid server URL: {source}")]
    InvalidUrl {
        #[from]
        source: url::ParseError,
    },

    #[error("network error during authentication: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

impl From<AuthError> for conduit_mcp_core::McpError {
    fn from(err: AuthError) -> Self {
        conduit_mcp_core::McpError::ConnectionError(format!("authorization: {err}"))
    }
}

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;
