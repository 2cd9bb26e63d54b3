//! Bootstrap Token Integration Module
//!
//! Lifecycle management for short-lived bootstrap tokens used to admit new members
//! into a cluster.
//!
//! # Features
//!
//! - Token generation in the `<id>.<secret>` format (6 and 16 characters of `[a-z0-9]`)
//! - Time-bound expiration with a configurable TTL (default 15 minutes)
//! - Rotation once less than half of the TTL remains
//! - Refresh that never resurrects a record deleted by another actor
//! - Pluggable secret store with create-if-absent and update-if-present semantics
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use bootstrap_token_integration::{
//!     token_manager_config, DefaultTokenManager, InMemorySecretStore, TokenManager,
//! };
//! use secrecy::ExposeSecret;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = token_manager_config()
//!         .default_ttl(Duration::from_secs(10 * 60))
//!         .build()?;
//!
//!     let store = Arc::new(InMemorySecretStore::new());
//!     let manager = DefaultTokenManager::new(config, store)?;
//!
//!     let token = manager.create_token().await?;
//!     if manager.should_rotate(token.expose_secret()).await? {
//!         manager.refresh_token(token.expose_secret()).await?;
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `types`: token grammar, records, lifecycle state, and configuration
//! - `error`: error hierarchy
//! - `core`: random source and clock
//! - `token`: secret store interface and the lifecycle manager
//! - `builders`: fluent configuration builder

pub mod builders;
pub mod core;
pub mod error;
pub mod token;
pub mod types;

// Re-export builders
pub use builders::{token_manager_config, TokenManagerConfigBuilder};

// Re-export errors
pub use error::{
    BootstrapTokenError, BootstrapTokenResult, ConfigurationError, RandomSourceError,
    StoreError, StoreOperation, TokenError,
};

// Re-export types
pub use types::{
    // Token
    BootstrapToken, BootstrapTokenString, TokenId, TokenState, TokenUsage, TOKEN_CHARSET,
    TOKEN_DELIMITER, TOKEN_ID_LENGTH, TOKEN_SECRET_LENGTH,
    // Record
    SecretRecord,
    // Config
    TokenManagerConfig, DEFAULT_TOKEN_TTL, MAX_TOKEN_TTL,
};

// Re-export core components
pub use core::{
    // Clock
    Clock, MockClock, SystemClock,
    // Generator
    DefaultTokenGenerator, MockTokenGenerator, TokenGenerator,
};

// Re-export token management
pub use token::{
    // Storage
    InMemorySecretStore, MockSecretStore, SecretStore,
    // Manager
    DefaultTokenManager, StoredToken, TokenManager, TokenReconcileOutcome,
};
