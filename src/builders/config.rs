//! Configuration Builder
//!
//! Fluent builder for token manager configuration.

use std::collections::BTreeSet;
use std::time::Duration;

use crate::error::ConfigurationError;
use crate::types::{TokenManagerConfig, TokenUsage};

/// Token manager configuration builder.
pub struct TokenManagerConfigBuilder {
    config: TokenManagerConfig,
}

impl TokenManagerConfigBuilder {
    /// Create new configuration builder starting from defaults.
    pub fn new() -> Self {
        Self {
            config: TokenManagerConfig::default(),
        }
    }

    /// Set token TTL.
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.config.default_ttl = ttl;
        self
    }

    /// Replace granted usages.
    pub fn usages(mut self, usages: impl IntoIterator<Item = TokenUsage>) -> Self {
        self.config.usages = usages.into_iter().collect::<BTreeSet<_>>();
        self
    }

    /// Replace granted groups.
    pub fn groups(mut self, groups: Vec<String>) -> Self {
        self.config.groups = groups;
        self
    }

    /// Add a granted group.
    pub fn add_group(mut self, group: impl Into<String>) -> Self {
        self.config.groups.push(group.into());
        self
    }

    /// Set description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.config.description = description.into();
        self
    }

    /// Set store key prefix.
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.key_prefix = prefix.into();
        self
    }

    /// Set bound on local generation retries.
    pub fn max_generation_attempts(mut self, attempts: u32) -> Self {
        self.config.max_generation_attempts = attempts;
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<TokenManagerConfig, ConfigurationError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for TokenManagerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a new configuration builder.
pub fn token_manager_config() -> TokenManagerConfigBuilder {
    TokenManagerConfigBuilder::new()
}
