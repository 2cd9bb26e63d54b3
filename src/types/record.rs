//! Secret Record
//!
//! Opaque field map exchanged with the secret store, and the encoding of
//! [`BootstrapToken`] into it. Field names follow the Kubernetes bootstrap token
//! secret layout so records interoperate with existing consumers.

use chrono::{DateTime, SecondsFormat, Utc};
use secrecy::{ExposeSecret, SecretString};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::TokenError;
use crate::types::token::{BootstrapToken, TokenId, TokenUsage};

/// Field holding the token id.
pub const TOKEN_ID_KEY: &str = "token-id";
/// Field holding the token secret.
pub const TOKEN_SECRET_KEY: &str = "token-secret";
/// Field holding the RFC 3339 expiration.
pub const EXPIRATION_KEY: &str = "expiration";
/// Field flagging the signing usage.
pub const USAGE_SIGNING_KEY: &str = "usage-bootstrap-signing";
/// Field flagging the authentication usage.
pub const USAGE_AUTHENTICATION_KEY: &str = "usage-bootstrap-authentication";
/// Field holding the comma-separated extra groups.
pub const EXTRA_GROUPS_KEY: &str = "auth-extra-groups";
/// Field holding the free-form description.
pub const DESCRIPTION_KEY: &str = "description";

/// Fields every non-corrupt record carries.
pub const REQUIRED_FIELDS: [&str; 3] = [TOKEN_ID_KEY, TOKEN_SECRET_KEY, EXPIRATION_KEY];

/// Record field holding a usage flag.
pub fn usage_field(usage: TokenUsage) -> &'static str {
    match usage {
        TokenUsage::Signing => USAGE_SIGNING_KEY,
        TokenUsage::Authentication => USAGE_AUTHENTICATION_KEY,
    }
}

/// Format an expiration timestamp for storage.
pub fn format_expiration(expires_at: DateTime<Utc>) -> String {
    expires_at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse a stored expiration timestamp.
pub fn parse_expiration(value: &[u8], token_id: &TokenId) -> Result<DateTime<Utc>, TokenError> {
    let text = std::str::from_utf8(value).map_err(|_| corrupt(token_id, "expiration is not UTF-8"))?;
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| corrupt(token_id, format!("unparseable expiration: {}", e)))
}

fn corrupt(token_id: &TokenId, message: impl Into<String>) -> TokenError {
    TokenError::CorruptRecord {
        token_id: token_id.to_string(),
        message: message.into(),
    }
}

/// Mapping from field name to opaque bytes, as held by a secret store.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretRecord {
    fields: BTreeMap<String, Vec<u8>>,
}

impl SecretRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> &mut Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Set a field, builder style.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.insert(key, value);
        self
    }

    /// Get a field.
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.fields.get(key).map(Vec::as_slice)
    }

    /// Remove a field, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Vec<u8>> {
        self.fields.remove(key)
    }

    /// Check if a field is present.
    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Field names in sorted order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check that the record is structurally usable for `token_id`.
    ///
    /// Missing required fields, or a stored id that disagrees with the id used for
    /// the lookup, mark the record corrupt.
    pub fn check_required(&self, token_id: &TokenId) -> Result<(), TokenError> {
        for field in REQUIRED_FIELDS {
            if !self.contains(field) {
                return Err(corrupt(token_id, format!("missing required field {}", field)));
            }
        }

        let stored_id = self.get(TOKEN_ID_KEY).unwrap_or_default();
        if stored_id != token_id.as_str().as_bytes() {
            return Err(corrupt(token_id, "stored token-id does not match lookup id"));
        }
        Ok(())
    }

    /// Parse the expiration field.
    pub fn expires_at(&self, token_id: &TokenId) -> Result<DateTime<Utc>, TokenError> {
        let value = self
            .get(EXPIRATION_KEY)
            .ok_or_else(|| corrupt(token_id, format!("missing required field {}", EXPIRATION_KEY)))?;
        parse_expiration(value, token_id)
    }

    /// Overwrite the expiration field.
    pub fn set_expires_at(&mut self, expires_at: DateTime<Utc>) {
        self.insert(EXPIRATION_KEY, format_expiration(expires_at));
    }
}

impl std::fmt::Debug for SecretRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in &self.fields {
            if key == TOKEN_SECRET_KEY {
                map.entry(key, &"[REDACTED]");
            } else {
                map.entry(key, &String::from_utf8_lossy(value));
            }
        }
        map.finish()
    }
}

impl BootstrapToken {
    /// Encode into a store record.
    pub fn to_record(&self) -> SecretRecord {
        let mut record = SecretRecord::new();
        record
            .insert(TOKEN_ID_KEY, self.id.as_str())
            .insert(TOKEN_SECRET_KEY, self.secret.expose_secret().as_str())
            .insert(EXPIRATION_KEY, format_expiration(self.expires_at));

        for usage in &self.usages {
            record.insert(usage_field(*usage), "true");
        }
        if !self.groups.is_empty() {
            record.insert(EXTRA_GROUPS_KEY, self.groups.join(","));
        }
        if let Some(description) = &self.description {
            record.insert(DESCRIPTION_KEY, description.as_str());
        }
        record
    }

    /// Decode a store record fetched for `token_id`.
    pub fn from_record(token_id: &TokenId, record: &SecretRecord) -> Result<Self, TokenError> {
        record.check_required(token_id)?;

        let secret = text_field(record, TOKEN_SECRET_KEY, token_id)?;
        let expires_at = record.expires_at(token_id)?;

        let usages: BTreeSet<TokenUsage> = TokenUsage::ALL
            .into_iter()
            .filter(|usage| record.get(usage_field(*usage)) == Some(b"true".as_slice()))
            .collect();

        let groups = match record.get(EXTRA_GROUPS_KEY) {
            Some(_) => text_field(record, EXTRA_GROUPS_KEY, token_id)?
                .split(',')
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(String::from)
                .collect(),
            None => Vec::new(),
        };

        let description = match record.get(DESCRIPTION_KEY) {
            Some(_) => Some(text_field(record, DESCRIPTION_KEY, token_id)?.to_string()),
            None => None,
        };

        Ok(Self {
            id: token_id.clone(),
            secret: SecretString::new(secret.to_string()),
            expires_at,
            usages,
            groups,
            description,
        })
    }
}

fn text_field<'a>(
    record: &'a SecretRecord,
    key: &str,
    token_id: &TokenId,
) -> Result<&'a str, TokenError> {
    let value = record
        .get(key)
        .ok_or_else(|| corrupt(token_id, format!("missing required field {}", key)))?;
    std::str::from_utf8(value).map_err(|_| corrupt(token_id, format!("{} is not UTF-8", key)))
}
