//! Token Types
//!
//! Bootstrap token grammar, typed token records, and the derived lifecycle state.

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

use crate::error::TokenError;

/// Length of the id half of a token.
pub const TOKEN_ID_LENGTH: usize = 6;

/// Length of the secret half of a token.
pub const TOKEN_SECRET_LENGTH: usize = 16;

/// Separator between id and secret.
pub const TOKEN_DELIMITER: char = '.';

/// Characters allowed in both halves of a token.
pub const TOKEN_CHARSET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn is_token_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit()
}

fn check_part(part: &str, name: &str, expected_len: usize) -> Result<(), TokenError> {
    if part.len() != expected_len {
        return Err(TokenError::Malformed {
            reason: format!(
                "token {} must be {} characters, got {}",
                name,
                expected_len,
                part.len()
            ),
        });
    }
    if !part.chars().all(is_token_char) {
        return Err(TokenError::Malformed {
            reason: format!("token {} contains characters outside [a-z0-9]", name),
        });
    }
    Ok(())
}

/// Public identifier half of a bootstrap token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TokenId(String);

impl TokenId {
    /// Validate and wrap a token id.
    pub fn parse(id: &str) -> Result<Self, TokenError> {
        check_part(id, "id", TOKEN_ID_LENGTH)?;
        Ok(Self(id.to_string()))
    }

    /// Inner value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Store key for this id. Derived from the id alone.
    pub fn store_key(&self, prefix: &str) -> String {
        format!("{}{}", prefix, self.0)
    }
}

impl std::fmt::Display for TokenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TokenId {
    type Error = TokenError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TokenId> for String {
    fn from(id: TokenId) -> Self {
        id.0
    }
}

/// A bootstrap token in its `<id>.<secret>` text form, parsed and validated.
#[derive(Clone)]
pub struct BootstrapTokenString {
    id: TokenId,
    secret: SecretString,
}

impl BootstrapTokenString {
    /// Parse token text against the `<id>.<secret>` grammar.
    ///
    /// The error never echoes the input, since it may hold a real secret.
    pub fn parse(text: &str) -> Result<Self, TokenError> {
        let (id, secret) = text
            .split_once(TOKEN_DELIMITER)
            .ok_or_else(|| TokenError::Malformed {
                reason: format!("expected <id>{}<secret>", TOKEN_DELIMITER),
            })?;

        let id = TokenId::parse(id)?;
        check_part(secret, "secret", TOKEN_SECRET_LENGTH)?;

        Ok(Self {
            id,
            secret: SecretString::new(secret.to_string()),
        })
    }

    /// Token id.
    pub fn id(&self) -> &TokenId {
        &self.id
    }

    /// Token secret.
    pub fn secret(&self) -> &SecretString {
        &self.secret
    }

    /// Full token text.
    pub fn to_text(&self) -> SecretString {
        SecretString::new(format!(
            "{}{}{}",
            self.id,
            TOKEN_DELIMITER,
            self.secret.expose_secret()
        ))
    }
}

impl FromStr for BootstrapTokenString {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Debug for BootstrapTokenString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapTokenString")
            .field("id", &self.id)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Capability granted to a token holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenUsage {
    /// Token may be used to sign cluster discovery information.
    Signing,
    /// Token may be used to authenticate to the cluster.
    Authentication,
}

impl TokenUsage {
    /// All known usages.
    pub const ALL: [TokenUsage; 2] = [TokenUsage::Signing, TokenUsage::Authentication];
}

/// Lifecycle state of a token, derived from its expiration and the current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenState {
    /// More than half of the TTL remains.
    Fresh,
    /// Inside the rotation margin; a refresh is due.
    RotationDue,
    /// Expiration has passed. The record must not be accepted for authentication.
    Expired,
}

impl TokenState {
    /// Evaluate the state of a token expiring at `expires_at`.
    ///
    /// The rotation margin is anchored to the current expiration: a token is due once
    /// `expires_at < now + ttl / 2`.
    pub fn evaluate(expires_at: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> Self {
        if expires_at <= now {
            TokenState::Expired
        } else if expires_at < Self::rotation_threshold(now, ttl) {
            TokenState::RotationDue
        } else {
            TokenState::Fresh
        }
    }

    /// `now + ttl / 2`, saturating at the latest representable instant.
    pub fn rotation_threshold(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
        now.checked_add_signed(ttl / 2).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Whether the token should be refreshed or replaced.
    pub fn needs_rotation(&self) -> bool {
        !matches!(self, TokenState::Fresh)
    }
}

/// Fully decoded bootstrap token record.
#[derive(Clone)]
pub struct BootstrapToken {
    /// Token id.
    pub id: TokenId,
    /// Token secret.
    pub secret: SecretString,
    /// Absolute expiration.
    pub expires_at: DateTime<Utc>,
    /// Granted usages.
    pub usages: BTreeSet<TokenUsage>,
    /// Groups the holder authenticates as.
    pub groups: Vec<String>,
    /// Provenance note.
    pub description: Option<String>,
}

impl BootstrapToken {
    /// Check if the token has expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Lifecycle state at `now` for a manager configured with `ttl`.
    pub fn state(&self, now: DateTime<Utc>, ttl: Duration) -> TokenState {
        TokenState::evaluate(self.expires_at, now, ttl)
    }

    /// Remaining lifetime at `now`, zero once expired.
    pub fn remaining_lifetime(&self, now: DateTime<Utc>) -> Duration {
        if self.expires_at > now {
            self.expires_at - now
        } else {
            Duration::zero()
        }
    }

    /// Check whether a usage was granted.
    pub fn has_usage(&self, usage: TokenUsage) -> bool {
        self.usages.contains(&usage)
    }
}

impl std::fmt::Debug for BootstrapToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapToken")
            .field("id", &self.id)
            .field("secret", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("usages", &self.usages)
            .field("groups", &self.groups)
            .field("description", &self.description)
            .finish()
    }
}
