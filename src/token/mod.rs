//! Token Management
//!
//! Bootstrap token lifecycle management.
//!
//! This module provides:
//!
//! - **Secret Store**: the store interface plus in-memory and mock implementations
//! - **Token Manager**: creation, lookup, refresh, and rotation decisions

pub mod manager;
pub mod storage;

// Secret Store
pub use storage::{
    create_in_memory_secret_store, create_mock_secret_store, InMemorySecretStore,
    MockSecretStore, SecretStore,
};

// Token Manager
pub use manager::{DefaultTokenManager, StoredToken, TokenManager, TokenReconcileOutcome};
