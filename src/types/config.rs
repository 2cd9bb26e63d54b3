//! Configuration Types
//!
//! Token manager configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

use crate::error::ConfigurationError;
use crate::types::token::TokenUsage;

/// Default token TTL (15 minutes).
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);

/// Upper bound on the token TTL (365 days).
pub const MAX_TOKEN_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Default store key prefix.
pub const DEFAULT_KEY_PREFIX: &str = "bootstrap-token-";

/// Default group granted to token holders.
pub const DEFAULT_GROUP: &str = "system:bootstrappers:default-node-token";

/// Default provenance note.
pub const DEFAULT_DESCRIPTION: &str = "token generated by bootstrap-token-integration";

/// Default bound on local generation retries.
pub const DEFAULT_MAX_GENERATION_ATTEMPTS: u32 = 5;

const GROUP_PREFIX: &str = "system:bootstrappers:";
const MAX_GROUP_SUFFIX_LENGTH: usize = 256;

/// Token manager configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenManagerConfig {
    /// Lifetime of a created or refreshed token. Rotation is due once less than half
    /// of it remains.
    #[serde(rename = "default_ttl_secs", with = "duration_secs")]
    pub default_ttl: Duration,
    /// Usages granted to created tokens.
    pub usages: BTreeSet<TokenUsage>,
    /// Groups granted to created tokens.
    pub groups: Vec<String>,
    /// Description stored with created tokens.
    pub description: String,
    /// Prefix prepended to the token id to form the store key.
    pub key_prefix: String,
    /// Local retries when the random draw does not produce a well-formed token.
    pub max_generation_attempts: u32,
}

impl Default for TokenManagerConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TOKEN_TTL,
            usages: TokenUsage::ALL.into_iter().collect(),
            groups: vec![DEFAULT_GROUP.to_string()],
            description: DEFAULT_DESCRIPTION.to_string(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            max_generation_attempts: DEFAULT_MAX_GENERATION_ATTEMPTS,
        }
    }
}

impl TokenManagerConfig {
    /// Parse and validate a JSON configuration document. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigurationError::InvalidConfig {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.default_ttl < Duration::from_secs(2) {
            return Err(ConfigurationError::InvalidTtl {
                message: format!("must be at least 2 seconds, got {:?}", self.default_ttl),
            });
        }
        if self.default_ttl > MAX_TOKEN_TTL {
            return Err(ConfigurationError::InvalidTtl {
                message: format!(
                    "must be at most {} seconds, got {:?}",
                    MAX_TOKEN_TTL.as_secs(),
                    self.default_ttl
                ),
            });
        }
        if self.max_generation_attempts == 0 {
            return Err(ConfigurationError::InvalidConfig {
                message: "max_generation_attempts must be at least 1".to_string(),
            });
        }
        if self.key_prefix.is_empty() {
            return Err(ConfigurationError::InvalidConfig {
                message: "key_prefix must not be empty".to_string(),
            });
        }
        if self.usages.is_empty() {
            return Err(ConfigurationError::InvalidConfig {
                message: "at least one usage must be granted".to_string(),
            });
        }
        for group in &self.groups {
            validate_group_name(group)?;
        }
        Ok(())
    }

    /// TTL as a chrono duration.
    pub fn ttl(&self) -> Result<chrono::Duration, ConfigurationError> {
        chrono::Duration::from_std(self.default_ttl).map_err(|e| ConfigurationError::InvalidTtl {
            message: e.to_string(),
        })
    }
}

/// Validate a group name against `system:bootstrappers:[a-z0-9:-]{0,255}[a-z0-9]`.
pub fn validate_group_name(group: &str) -> Result<(), ConfigurationError> {
    let invalid = || ConfigurationError::InvalidGroup {
        group: group.to_string(),
    };

    let suffix = group.strip_prefix(GROUP_PREFIX).ok_or_else(invalid)?;
    if suffix.is_empty() || suffix.len() > MAX_GROUP_SUFFIX_LENGTH {
        return Err(invalid());
    }

    let body_ok = suffix
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == ':' || c == '-');
    let last_ok = suffix
        .chars()
        .last()
        .map(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .unwrap_or(false);

    if body_ok && last_ok {
        Ok(())
    } else {
        Err(invalid())
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
