//! Token Manager
//!
//! Bootstrap token lifecycle: creation, lookup, refresh, and rotation decisions.
//!
//! All state lives in the [`SecretStore`]. The manager keeps only its configuration
//! and collaborators, and computes staleness from the stored expiration and the
//! current time on every call.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, Utc};
use secrecy::SecretString;
use std::sync::Arc;

use crate::core::{Clock, DefaultTokenGenerator, SystemClock, TokenGenerator};
use crate::error::{
    BootstrapTokenError, BootstrapTokenResult, ConfigurationError, StoreError, StoreOperation,
    TokenError,
};
use crate::token::SecretStore;
use crate::types::{
    BootstrapToken, BootstrapTokenString, SecretRecord, TokenId, TokenManagerConfig, TokenState,
};

/// Expirations are stored as RFC 3339, which only has four-digit years.
const MAX_EXPIRATION_YEAR: i32 = 9999;

/// Token manager interface.
#[async_trait]
pub trait TokenManager: Send + Sync {
    /// Create a new token and return its text. The only time the secret is exposed.
    async fn create_token(&self) -> BootstrapTokenResult<SecretString>;

    /// Fetch the stored record for a token.
    async fn get_token(&self, token: &str) -> BootstrapTokenResult<StoredToken>;

    /// Push the expiration of an existing token to `now + ttl`.
    async fn refresh_token(&self, token: &str) -> BootstrapTokenResult<()>;

    /// Check whether a token is inside its rotation margin.
    async fn should_rotate(&self, token: &str) -> BootstrapTokenResult<bool>;

    /// Evaluate the lifecycle state of a token.
    async fn token_state(&self, token: &str) -> BootstrapTokenResult<TokenState>;

    /// Fetch and fully decode a token record.
    async fn describe_token(&self, token: &str) -> BootstrapTokenResult<BootstrapToken>;

    /// Reconcile the current token, if any, into a valid one.
    async fn ensure_token(&self, current: Option<&str>) -> BootstrapTokenResult<TokenReconcileOutcome>;
}

/// A record fetched from the store, checked for required fields.
#[derive(Debug, Clone)]
pub struct StoredToken {
    /// Token id used for the lookup.
    pub id: TokenId,
    /// Store key the record lives under.
    pub key: String,
    /// Raw record, including fields written by other actors.
    pub record: SecretRecord,
}

impl StoredToken {
    /// Parse the stored expiration.
    pub fn expires_at(&self) -> Result<DateTime<Utc>, TokenError> {
        self.record.expires_at(&self.id)
    }
}

/// Result of [`TokenManager::ensure_token`].
#[derive(Debug)]
pub enum TokenReconcileOutcome {
    /// A new token was created and replaces whatever the caller held.
    Created(SecretString),
    /// The existing token's expiration was extended.
    Refreshed,
    /// The existing token is fresh.
    Unchanged,
}

impl TokenReconcileOutcome {
    /// New token text, when one was created.
    pub fn token_text(&self) -> Option<&SecretString> {
        match self {
            TokenReconcileOutcome::Created(text) => Some(text),
            _ => None,
        }
    }
}

/// Default token manager implementation.
pub struct DefaultTokenManager<S, G = DefaultTokenGenerator, C = SystemClock>
where
    S: SecretStore,
    G: TokenGenerator,
    C: Clock,
{
    config: TokenManagerConfig,
    ttl: Duration,
    store: Arc<S>,
    generator: Arc<G>,
    clock: Arc<C>,
}

impl<S: SecretStore> DefaultTokenManager<S> {
    /// Create new token manager using the OS random source and the system clock.
    pub fn new(config: TokenManagerConfig, store: Arc<S>) -> Result<Self, ConfigurationError> {
        Self::with_collaborators(
            config,
            store,
            Arc::new(DefaultTokenGenerator::new()),
            Arc::new(SystemClock),
        )
    }
}

impl<S, G, C> DefaultTokenManager<S, G, C>
where
    S: SecretStore,
    G: TokenGenerator,
    C: Clock,
{
    /// Create new token manager with explicit generator and clock.
    pub fn with_collaborators(
        config: TokenManagerConfig,
        store: Arc<S>,
        generator: Arc<G>,
        clock: Arc<C>,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let ttl = config.ttl()?;

        Ok(Self {
            config,
            ttl,
            store,
            generator,
            clock,
        })
    }

    /// Manager configuration.
    pub fn config(&self) -> &TokenManagerConfig {
        &self.config
    }

    fn expiry_from_now(&self) -> BootstrapTokenResult<DateTime<Utc>> {
        let now = self.clock.now();
        now.checked_add_signed(self.ttl)
            .filter(|t| t.year() <= MAX_EXPIRATION_YEAR)
            .ok_or_else(|| {
                BootstrapTokenError::from(ConfigurationError::InvalidTtl {
                    message: format!("expiration {} + {} is out of range", now, self.ttl),
                })
            })
    }

    fn draw_token(&self) -> Result<BootstrapTokenString, TokenError> {
        let attempts = self.config.max_generation_attempts;
        let mut last_failure = String::new();

        for attempt in 1..=attempts {
            let failure = match self.generator.generate() {
                Ok(text) => match BootstrapTokenString::parse(&text) {
                    Ok(token) => return Ok(token),
                    Err(e) => e.to_string(),
                },
                Err(e) => e.to_string(),
            };
            tracing::debug!(attempt, error = %failure, "Discarding bootstrap token draw");
            last_failure = failure;
        }

        Err(TokenError::GenerationFailed {
            attempts,
            message: last_failure,
        })
    }

    async fn fetch(&self, id: &TokenId) -> BootstrapTokenResult<StoredToken> {
        let key = id.store_key(&self.config.key_prefix);

        let record = self.store.get(&key).await.map_err(|e| match e {
            StoreError::NotFound { .. } => BootstrapTokenError::from(TokenError::NotFound {
                token_id: id.to_string(),
            }),
            other => BootstrapTokenError::store(StoreOperation::Get, other),
        })?;
        record.check_required(id)?;

        tracing::debug!(token_id = %id, key = %key, "Fetched bootstrap token record");
        Ok(StoredToken {
            id: id.clone(),
            key,
            record,
        })
    }

    async fn replace(&self, reason: &str) -> BootstrapTokenResult<TokenReconcileOutcome> {
        tracing::warn!(reason = %reason, "Replacing bootstrap token");
        let text = self.create_token().await?;
        Ok(TokenReconcileOutcome::Created(text))
    }
}

#[async_trait]
impl<S, G, C> TokenManager for DefaultTokenManager<S, G, C>
where
    S: SecretStore,
    G: TokenGenerator,
    C: Clock,
{
    async fn create_token(&self) -> BootstrapTokenResult<SecretString> {
        let token = self.draw_token()?;
        let key = token.id().store_key(&self.config.key_prefix);
        let expires_at = self.expiry_from_now()?;

        let description = Some(self.config.description.clone()).filter(|d| !d.is_empty());
        let record = BootstrapToken {
            id: token.id().clone(),
            secret: token.secret().clone(),
            expires_at,
            usages: self.config.usages.clone(),
            groups: self.config.groups.clone(),
            description,
        }
        .to_record();

        self.store.create(&key, record).await.map_err(|e| match e {
            StoreError::AlreadyExists { .. } => BootstrapTokenError::from(TokenError::Conflict {
                token_id: token.id().to_string(),
            }),
            other => BootstrapTokenError::store(StoreOperation::Create, other),
        })?;

        tracing::info!(token_id = %token.id(), %expires_at, "Created bootstrap token");
        Ok(token.to_text())
    }

    async fn get_token(&self, token: &str) -> BootstrapTokenResult<StoredToken> {
        let parsed = BootstrapTokenString::parse(token)?;
        self.fetch(parsed.id()).await
    }

    async fn refresh_token(&self, token: &str) -> BootstrapTokenResult<()> {
        let mut stored = self.get_token(token).await?;
        let expires_at = self.expiry_from_now()?;
        stored.record.set_expires_at(expires_at);

        let id = stored.id;
        self.store
            .update(&stored.key, stored.record)
            .await
            .map_err(|e| match e {
                StoreError::NotFound { .. } => BootstrapTokenError::from(TokenError::NotFound {
                    token_id: id.to_string(),
                }),
                other => BootstrapTokenError::store(StoreOperation::Update, other),
            })?;

        tracing::info!(token_id = %id, %expires_at, "Refreshed bootstrap token");
        Ok(())
    }

    async fn should_rotate(&self, token: &str) -> BootstrapTokenResult<bool> {
        let stored = self.get_token(token).await?;
        let expires_at = stored.expires_at()?;
        Ok(expires_at < TokenState::rotation_threshold(self.clock.now(), self.ttl))
    }

    async fn token_state(&self, token: &str) -> BootstrapTokenResult<TokenState> {
        let stored = self.get_token(token).await?;
        let expires_at = stored.expires_at()?;
        Ok(TokenState::evaluate(expires_at, self.clock.now(), self.ttl))
    }

    async fn describe_token(&self, token: &str) -> BootstrapTokenResult<BootstrapToken> {
        let stored = self.get_token(token).await?;
        Ok(BootstrapToken::from_record(&stored.id, &stored.record)?)
    }

    async fn ensure_token(&self, current: Option<&str>) -> BootstrapTokenResult<TokenReconcileOutcome> {
        let Some(current) = current else {
            let text = self.create_token().await?;
            return Ok(TokenReconcileOutcome::Created(text));
        };

        match self.token_state(current).await {
            Ok(TokenState::Fresh) => Ok(TokenReconcileOutcome::Unchanged),
            Ok(TokenState::RotationDue) => match self.refresh_token(current).await {
                Ok(()) => Ok(TokenReconcileOutcome::Refreshed),
                Err(e) if e.needs_recreate() => self.replace(&e.to_string()).await,
                Err(e) => Err(e),
            },
            Ok(TokenState::Expired) => self.replace("token expired").await,
            Err(e) if e.needs_recreate() => self.replace(&e.to_string()).await,
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{MockClock, MockTokenGenerator};
    use crate::token::MockSecretStore;
    use crate::types::{
        TokenUsage, DESCRIPTION_KEY, EXPIRATION_KEY, EXTRA_GROUPS_KEY, USAGE_SIGNING_KEY,
    };
    use chrono::TimeZone;
    use secrecy::ExposeSecret;

    const TOKEN: &str = "abcdef.0123456789abcdef";
    const KEY: &str = "bootstrap-token-abcdef";

    struct Harness {
        manager: DefaultTokenManager<MockSecretStore, MockTokenGenerator, MockClock>,
        store: Arc<MockSecretStore>,
        generator: Arc<MockTokenGenerator>,
        clock: Arc<MockClock>,
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
    }

    fn harness_with_ttl(ttl_secs: u64) -> Harness {
        let config = TokenManagerConfig {
            default_ttl: std::time::Duration::from_secs(ttl_secs),
            ..Default::default()
        };
        let store = Arc::new(MockSecretStore::new());
        let generator = Arc::new(MockTokenGenerator::new());
        let clock = Arc::new(MockClock::new(start()));
        let manager = DefaultTokenManager::with_collaborators(
            config,
            store.clone(),
            generator.clone(),
            clock.clone(),
        )
        .unwrap();

        Harness {
            manager,
            store,
            generator,
            clock,
        }
    }

    fn harness() -> Harness {
        harness_with_ttl(600)
    }

    async fn create_fixed(h: &Harness) -> String {
        h.generator.push_token(TOKEN);
        h.manager
            .create_token()
            .await
            .unwrap()
            .expose_secret()
            .clone()
    }

    #[tokio::test]
    async fn test_create_token_writes_record() {
        let h = harness();
        let text = create_fixed(&h).await;
        assert_eq!(text, TOKEN);

        let record = h.store.record(KEY).unwrap();
        assert_eq!(
            record.get(EXPIRATION_KEY),
            Some(b"2026-10-18T12:10:00Z".as_slice())
        );
        assert_eq!(record.get(USAGE_SIGNING_KEY), Some(b"true".as_slice()));
        assert_eq!(
            record.get(EXTRA_GROUPS_KEY),
            Some(b"system:bootstrappers:default-node-token".as_slice())
        );
        assert!(record.contains(DESCRIPTION_KEY));
        assert_eq!(h.store.call_count(StoreOperation::Create), 1);
    }

    #[tokio::test]
    async fn test_create_token_with_random_draw() {
        let h = harness();
        let text = h.manager.create_token().await.unwrap();
        let parsed = BootstrapTokenString::parse(text.expose_secret()).unwrap();

        assert!(h
            .store
            .record(&parsed.id().store_key("bootstrap-token-"))
            .is_some());
    }

    #[tokio::test]
    async fn test_create_token_retries_malformed_draws() {
        let h = harness();
        h.generator
            .push_token("not-a-token")
            .push_failure("entropy unavailable")
            .push_token(TOKEN);

        let text = h.manager.create_token().await.unwrap();
        assert_eq!(text.expose_secret(), TOKEN);
        assert_eq!(h.generator.draw_count(), 3);
    }

    #[tokio::test]
    async fn test_create_token_gives_up_after_max_attempts() {
        let h = harness();
        for _ in 0..5 {
            h.generator.push_token("BAD.TOKEN");
        }

        let err = h.manager.create_token().await.unwrap_err();
        assert!(matches!(
            err,
            BootstrapTokenError::Token(TokenError::GenerationFailed { attempts: 5, .. })
        ));
        assert_eq!(h.store.call_count(StoreOperation::Create), 0);
    }

    #[tokio::test]
    async fn test_create_token_conflict() {
        let h = harness();
        create_fixed(&h).await;
        let first = h.store.record(KEY).unwrap();

        h.clock.advance(Duration::minutes(1));
        h.generator.push_token("abcdef.ffffffffffffffff");
        let err = h.manager.create_token().await.unwrap_err();

        assert!(matches!(
            err,
            BootstrapTokenError::Token(TokenError::Conflict { ref token_id }) if token_id == "abcdef"
        ));
        assert_eq!(h.store.record(KEY).unwrap(), first);
        assert_eq!(h.store.record_count(), 1);
    }

    #[tokio::test]
    async fn test_create_token_store_failure_is_labeled() {
        let h = harness();
        h.store.set_next_error(StoreError::Unavailable {
            message: "timeout".to_string(),
        });
        h.generator.push_token(TOKEN);

        let err = h.manager.create_token().await.unwrap_err();
        assert!(matches!(
            err,
            BootstrapTokenError::Store {
                operation: StoreOperation::Create,
                source: StoreError::Unavailable { .. }
            }
        ));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_get_token_malformed_skips_store() {
        let h = harness();

        let err = h.manager.get_token("abcdef").await.unwrap_err();
        assert!(matches!(
            err,
            BootstrapTokenError::Token(TokenError::Malformed { .. })
        ));
        assert!(h.store.get_call_history().is_empty());
    }

    #[tokio::test]
    async fn test_get_token_not_found() {
        let h = harness();

        let err = h.manager.get_token(TOKEN).await.unwrap_err();
        assert!(matches!(
            err,
            BootstrapTokenError::Token(TokenError::NotFound { ref token_id }) if token_id == "abcdef"
        ));
        assert!(err.needs_recreate());
    }

    #[tokio::test]
    async fn test_get_token_looks_up_by_id_only() {
        let h = harness();
        create_fixed(&h).await;

        let stored = h.manager.get_token("abcdef.zzzzzzzzzzzzzzzz").await.unwrap();
        assert_eq!(stored.key, KEY);
        assert_eq!(stored.id.as_str(), "abcdef");
    }

    #[tokio::test]
    async fn test_get_token_missing_expiration_is_corrupt() {
        let h = harness();
        create_fixed(&h).await;
        let mut record = h.store.record(KEY).unwrap();
        record.remove(EXPIRATION_KEY);
        h.store.add_record(KEY, record);

        let err = h.manager.get_token(TOKEN).await.unwrap_err();
        assert!(matches!(
            err,
            BootstrapTokenError::Token(TokenError::CorruptRecord { .. })
        ));

        let err = h.manager.should_rotate(TOKEN).await.unwrap_err();
        assert!(matches!(
            err,
            BootstrapTokenError::Token(TokenError::CorruptRecord { .. })
        ));
    }

    #[tokio::test]
    async fn test_get_token_store_failure_is_labeled() {
        let h = harness();
        h.store.set_should_fail(true);

        let err = h.manager.get_token(TOKEN).await.unwrap_err();
        assert!(matches!(
            err,
            BootstrapTokenError::Store {
                operation: StoreOperation::Get,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_refresh_extends_expiration() {
        let h = harness();
        create_fixed(&h).await;
        let before = h.manager.get_token(TOKEN).await.unwrap().expires_at().unwrap();

        h.clock.advance(Duration::minutes(3));
        h.manager.refresh_token(TOKEN).await.unwrap();

        let after = h.manager.get_token(TOKEN).await.unwrap().expires_at().unwrap();
        assert!(after > before);
        assert_eq!(after, start() + Duration::minutes(13));
    }

    #[tokio::test]
    async fn test_refresh_preserves_other_fields() {
        let h = harness();
        create_fixed(&h).await;
        let mut record = h.store.record(KEY).unwrap();
        record.insert("owner", "node-pool-a");
        h.store.add_record(KEY, record);

        h.manager.refresh_token(TOKEN).await.unwrap();

        let updates = h.store.get_update_history();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].1.get("owner"), Some(b"node-pool-a".as_slice()));
    }

    #[tokio::test]
    async fn test_refresh_vanished_record_is_not_found() {
        let h = harness();
        create_fixed(&h).await;
        h.store.set_vanish_after_read(true);

        let err = h.manager.refresh_token(TOKEN).await.unwrap_err();
        assert!(matches!(
            err,
            BootstrapTokenError::Token(TokenError::NotFound { .. })
        ));
        assert_eq!(h.store.record_count(), 0);
        assert_eq!(h.store.call_count(StoreOperation::Create), 1);
    }

    #[tokio::test]
    async fn test_refresh_update_failure_is_labeled() {
        let h = harness();
        create_fixed(&h).await;
        h.store.set_next_error_on(
            StoreOperation::Update,
            StoreError::Backend {
                message: "quota exceeded".to_string(),
            },
        );

        let err = h.manager.refresh_token(TOKEN).await.unwrap_err();
        assert!(matches!(
            err,
            BootstrapTokenError::Store {
                operation: StoreOperation::Update,
                source: StoreError::Backend { .. }
            }
        ));
        assert!(!err.needs_recreate());
    }

    #[tokio::test]
    async fn test_should_rotate_after_half_ttl() {
        let h = harness();
        create_fixed(&h).await;

        assert!(!h.manager.should_rotate(TOKEN).await.unwrap());

        h.clock.advance(Duration::minutes(5));
        assert!(!h.manager.should_rotate(TOKEN).await.unwrap());

        h.clock.advance(Duration::seconds(1));
        assert!(h.manager.should_rotate(TOKEN).await.unwrap());
    }

    #[tokio::test]
    async fn test_should_rotate_unparseable_expiration() {
        let h = harness();
        create_fixed(&h).await;
        let record = h
            .store
            .record(KEY)
            .unwrap()
            .with_field(EXPIRATION_KEY, "soon");
        h.store.add_record(KEY, record);

        let err = h.manager.should_rotate(TOKEN).await.unwrap_err();
        assert!(matches!(
            err,
            BootstrapTokenError::Token(TokenError::CorruptRecord { .. })
        ));
    }

    #[tokio::test]
    async fn test_token_state_transitions() {
        let h = harness();
        create_fixed(&h).await;

        assert_eq!(h.manager.token_state(TOKEN).await.unwrap(), TokenState::Fresh);

        h.clock.advance(Duration::minutes(6));
        assert_eq!(
            h.manager.token_state(TOKEN).await.unwrap(),
            TokenState::RotationDue
        );

        h.clock.advance(Duration::minutes(4));
        assert_eq!(h.manager.token_state(TOKEN).await.unwrap(), TokenState::Expired);
    }

    #[tokio::test]
    async fn test_describe_token() {
        let h = harness();
        create_fixed(&h).await;

        let token = h.manager.describe_token(TOKEN).await.unwrap();
        assert_eq!(token.id.as_str(), "abcdef");
        assert_eq!(token.expires_at, start() + Duration::minutes(10));
        assert!(token.has_usage(TokenUsage::Signing));
        assert!(token.has_usage(TokenUsage::Authentication));
        assert_eq!(
            token.groups,
            vec!["system:bootstrappers:default-node-token".to_string()]
        );
    }

    #[tokio::test]
    async fn test_ensure_token_lifecycle() {
        let h = harness();
        h.generator.push_token(TOKEN);

        let outcome = h.manager.ensure_token(None).await.unwrap();
        let text = outcome.token_text().unwrap().expose_secret().clone();
        assert_eq!(text, TOKEN);

        h.clock.advance(Duration::minutes(2));
        assert!(matches!(
            h.manager.ensure_token(Some(&text)).await.unwrap(),
            TokenReconcileOutcome::Unchanged
        ));

        h.clock.advance(Duration::minutes(4));
        assert!(matches!(
            h.manager.ensure_token(Some(&text)).await.unwrap(),
            TokenReconcileOutcome::Refreshed
        ));
        assert_eq!(h.manager.token_state(&text).await.unwrap(), TokenState::Fresh);
    }

    #[tokio::test]
    async fn test_ensure_token_replaces_unusable_tokens() {
        let h = harness();

        let outcome = h.manager.ensure_token(Some("garbage")).await.unwrap();
        assert!(outcome.token_text().is_some());

        let outcome = h.manager.ensure_token(Some(TOKEN)).await.unwrap();
        assert!(outcome.token_text().is_some());
        assert_eq!(h.store.call_count(StoreOperation::Create), 2);
    }

    #[tokio::test]
    async fn test_ensure_token_replaces_expired_token() {
        let h = harness();
        create_fixed(&h).await;
        h.clock.advance(Duration::minutes(11));

        let outcome = h.manager.ensure_token(Some(TOKEN)).await.unwrap();
        let text = outcome.token_text().unwrap().expose_secret().clone();
        assert_ne!(text, TOKEN);
        assert_eq!(h.store.call_count(StoreOperation::Update), 0);
    }

    #[tokio::test]
    async fn test_ensure_token_propagates_store_errors() {
        let h = harness();
        create_fixed(&h).await;
        h.store.set_should_fail(true);

        let err = h.manager.ensure_token(Some(TOKEN)).await.unwrap_err();
        assert!(matches!(err, BootstrapTokenError::Store { .. }));
    }

    #[tokio::test]
    async fn test_expiration_past_year_9999_is_rejected() {
        let h = harness_with_ttl(365 * 24 * 60 * 60);
        create_fixed(&h).await;

        h.clock.set(Utc.with_ymd_and_hms(9999, 6, 1, 0, 0, 0).unwrap());
        h.generator.push_token("zyxwvu.0123456789abcdef");
        let err = h.manager.create_token().await.unwrap_err();
        assert!(matches!(
            err,
            BootstrapTokenError::Configuration(ConfigurationError::InvalidTtl { .. })
        ));
        assert_eq!(h.store.call_count(StoreOperation::Create), 1);

        let before = h.store.record(KEY).unwrap();
        assert!(h.manager.refresh_token(TOKEN).await.is_err());
        assert_eq!(h.store.record(KEY).unwrap(), before);
        assert_eq!(h.store.call_count(StoreOperation::Update), 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = TokenManagerConfig {
            default_ttl: std::time::Duration::from_secs(1),
            ..Default::default()
        };
        let result = DefaultTokenManager::new(config, Arc::new(MockSecretStore::new()));
        assert!(matches!(result, Err(ConfigurationError::InvalidTtl { .. })));
    }
}
