//! Bootstrap Token Error Types
//!
//! Error hierarchy separating grammar and policy violations, which this crate detects,
//! from secret store failures, which it passes through labeled by operation.

use thiserror::Error;

/// Result alias used across the crate.
pub type BootstrapTokenResult<T> = Result<T, BootstrapTokenError>;

/// Root error type for bootstrap token lifecycle operations.
#[derive(Error, Debug)]
pub enum BootstrapTokenError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Secret store {operation} failed: {source}")]
    Store {
        operation: StoreOperation,
        #[source]
        source: StoreError,
    },
}

impl BootstrapTokenError {
    /// Wrap a store failure with the operation that produced it.
    pub fn store(operation: StoreOperation, source: StoreError) -> Self {
        Self::Store { operation, source }
    }

    /// Get error code for telemetry.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "BOOTSTRAP_CONFIG",
            Self::Token(TokenError::GenerationFailed { .. }) => "BOOTSTRAP_GENERATION",
            Self::Token(TokenError::Malformed { .. }) => "BOOTSTRAP_MALFORMED",
            Self::Token(TokenError::NotFound { .. }) => "BOOTSTRAP_NOT_FOUND",
            Self::Token(TokenError::Conflict { .. }) => "BOOTSTRAP_CONFLICT",
            Self::Token(TokenError::CorruptRecord { .. }) => "BOOTSTRAP_CORRUPT",
            Self::Store { .. } => "BOOTSTRAP_STORE",
        }
    }

    /// Check if the same call may succeed when repeated later.
    ///
    /// Only transient store unavailability qualifies; every token error is final for
    /// the attempt that produced it.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Store {
                source: StoreError::Unavailable { .. },
                ..
            }
        )
    }

    /// Check if the caller should abandon this token and create a fresh one.
    pub fn needs_recreate(&self) -> bool {
        matches!(
            self,
            Self::Token(
                TokenError::NotFound { .. }
                    | TokenError::Malformed { .. }
                    | TokenError::CorruptRecord { .. }
            )
        )
    }

    /// Borrow the token error, if this is one.
    pub fn as_token_error(&self) -> Option<&TokenError> {
        match self {
            Self::Token(e) => Some(e),
            _ => None,
        }
    }
}

/// Configuration error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Invalid token TTL: {message}")]
    InvalidTtl { message: String },

    #[error("Invalid group name {group:?}: must match system:bootstrappers:[a-z0-9:-]{{0,255}}[a-z0-9]")]
    InvalidGroup { group: String },
}

/// Token grammar and policy error.
///
/// Messages never carry the secret half of a token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token generation failed after {attempts} attempts: {message}")]
    GenerationFailed { attempts: u32, message: String },

    #[error("Malformed bootstrap token: {reason}")]
    Malformed { reason: String },

    #[error("Bootstrap token {token_id} not found")]
    NotFound { token_id: String },

    #[error("Bootstrap token {token_id} already exists")]
    Conflict { token_id: String },

    #[error("Corrupt record for bootstrap token {token_id}: {message}")]
    CorruptRecord { token_id: String, message: String },
}

/// Failure of the random source backing token generation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Random source failure: {message}")]
pub struct RandomSourceError {
    pub message: String,
}

/// Secret store operation, used to label pass-through failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    Create,
    Get,
    Update,
}

impl std::fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreOperation::Create => write!(f, "create"),
            StoreOperation::Get => write!(f, "get"),
            StoreOperation::Update => write!(f, "update"),
        }
    }
}

/// Error reported by a secret store implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Key already exists: {key}")]
    AlreadyExists { key: String },

    #[error("Key not found: {key}")]
    NotFound { key: String },

    #[error("Store unavailable: {message}")]
    Unavailable { message: String },

    #[error("Store backend error: {message}")]
    Backend { message: String },
}
