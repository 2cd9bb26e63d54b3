//! Builders
//!
//! Fluent builders for manager configuration.

pub mod config;

pub use config::{token_manager_config, TokenManagerConfigBuilder};
