//! Secret Store
//!
//! Interface to the external store holding token records, with an in-memory
//! implementation and a mock for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{StoreError, StoreOperation};
use crate::types::SecretRecord;

/// Secret store interface.
///
/// The store is the only point of concurrency control: `create` must be atomic
/// create-if-absent and `update` must never create.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Create a record. Fails with [`StoreError::AlreadyExists`] if the key exists.
    async fn create(&self, key: &str, record: SecretRecord) -> Result<(), StoreError>;

    /// Fetch a record. Fails with [`StoreError::NotFound`] if the key is absent.
    async fn get(&self, key: &str) -> Result<SecretRecord, StoreError>;

    /// Replace an existing record. Fails with [`StoreError::NotFound`] if the key is absent.
    async fn update(&self, key: &str, record: SecretRecord) -> Result<(), StoreError>;
}

/// In-memory secret store.
#[derive(Default)]
pub struct InMemorySecretStore {
    records: Mutex<HashMap<String, SecretRecord>>,
}

impl InMemorySecretStore {
    /// Create new in-memory secret store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, SecretRecord>>, StoreError> {
        self.records.lock().map_err(|_| StoreError::Backend {
            message: "in-memory store lock poisoned".to_string(),
        })
    }

    /// Remove a record. Housekeeping only; the token manager never deletes.
    pub fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.lock()?.remove(key).is_some())
    }

    /// Number of stored records.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.len())
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.lock()?.is_empty())
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn create(&self, key: &str, record: SecretRecord) -> Result<(), StoreError> {
        let mut records = self.lock()?;
        if records.contains_key(key) {
            return Err(StoreError::AlreadyExists {
                key: key.to_string(),
            });
        }
        records.insert(key.to_string(), record);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<SecretRecord, StoreError> {
        self.lock()?
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })
    }

    async fn update(&self, key: &str, record: SecretRecord) -> Result<(), StoreError> {
        let mut records = self.lock()?;
        match records.get_mut(key) {
            Some(existing) => {
                *existing = record;
                Ok(())
            }
            None => Err(StoreError::NotFound {
                key: key.to_string(),
            }),
        }
    }
}

/// Mock secret store for testing.
///
/// Honors the store contract and records every call. Failures can be injected, and
/// `set_vanish_after_read` simulates another actor deleting a record between a read
/// and the following write.
#[derive(Default)]
pub struct MockSecretStore {
    records: Mutex<HashMap<String, SecretRecord>>,
    call_history: Mutex<Vec<(StoreOperation, String)>>,
    update_history: Mutex<Vec<(String, SecretRecord)>>,
    next_error: Mutex<Option<StoreError>>,
    operation_errors: Mutex<Vec<(StoreOperation, StoreError)>>,
    should_fail: Mutex<bool>,
    vanish_after_read: Mutex<bool>,
}

impl MockSecretStore {
    /// Create new mock secret store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set next error to return.
    pub fn set_next_error(&self, error: StoreError) -> &Self {
        *self.next_error.lock().unwrap() = Some(error);
        self
    }

    /// Set error to return from the next call of one operation.
    pub fn set_next_error_on(&self, operation: StoreOperation, error: StoreError) -> &Self {
        self.operation_errors.lock().unwrap().push((operation, error));
        self
    }

    /// Set store to fail all operations.
    pub fn set_should_fail(&self, should_fail: bool) -> &Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    /// Delete each record right after it is successfully read.
    pub fn set_vanish_after_read(&self, vanish: bool) -> &Self {
        *self.vanish_after_read.lock().unwrap() = vanish;
        self
    }

    /// Pre-populate a record.
    pub fn add_record(&self, key: &str, record: SecretRecord) -> &Self {
        self.records.lock().unwrap().insert(key.to_string(), record);
        self
    }

    /// Remove a record behind the manager's back.
    pub fn remove_record(&self, key: &str) -> Option<SecretRecord> {
        self.records.lock().unwrap().remove(key)
    }

    /// Current record for a key.
    pub fn record(&self, key: &str) -> Option<SecretRecord> {
        self.records.lock().unwrap().get(key).cloned()
    }

    /// Number of stored records.
    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Every call in order, as (operation, key).
    pub fn get_call_history(&self) -> Vec<(StoreOperation, String)> {
        self.call_history.lock().unwrap().clone()
    }

    /// Records passed to successful updates.
    pub fn get_update_history(&self) -> Vec<(String, SecretRecord)> {
        self.update_history.lock().unwrap().clone()
    }

    /// Number of calls for one operation.
    pub fn call_count(&self, operation: StoreOperation) -> usize {
        self.call_history
            .lock()
            .unwrap()
            .iter()
            .filter(|(op, _)| *op == operation)
            .count()
    }

    fn check_error(&self, operation: StoreOperation, key: &str) -> Result<(), StoreError> {
        self.call_history
            .lock()
            .unwrap()
            .push((operation, key.to_string()));

        if *self.should_fail.lock().unwrap() {
            return Err(StoreError::Unavailable {
                message: "Mock store failure".to_string(),
            });
        }

        if let Some(error) = self.next_error.lock().unwrap().take() {
            return Err(error);
        }

        let mut operation_errors = self.operation_errors.lock().unwrap();
        if let Some(index) = operation_errors.iter().position(|(op, _)| *op == operation) {
            return Err(operation_errors.remove(index).1);
        }

        Ok(())
    }
}

#[async_trait]
impl SecretStore for MockSecretStore {
    async fn create(&self, key: &str, record: SecretRecord) -> Result<(), StoreError> {
        self.check_error(StoreOperation::Create, key)?;

        let mut records = self.records.lock().unwrap();
        if records.contains_key(key) {
            return Err(StoreError::AlreadyExists {
                key: key.to_string(),
            });
        }
        records.insert(key.to_string(), record);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<SecretRecord, StoreError> {
        self.check_error(StoreOperation::Get, key)?;

        let mut records = self.records.lock().unwrap();
        let record = records.get(key).cloned().ok_or_else(|| StoreError::NotFound {
            key: key.to_string(),
        })?;

        if *self.vanish_after_read.lock().unwrap() {
            records.remove(key);
        }
        Ok(record)
    }

    async fn update(&self, key: &str, record: SecretRecord) -> Result<(), StoreError> {
        self.check_error(StoreOperation::Update, key)?;

        let mut records = self.records.lock().unwrap();
        if !records.contains_key(key) {
            return Err(StoreError::NotFound {
                key: key.to_string(),
            });
        }
        self.update_history
            .lock()
            .unwrap()
            .push((key.to_string(), record.clone()));
        records.insert(key.to_string(), record);
        Ok(())
    }
}

/// Create in-memory secret store.
pub fn create_in_memory_secret_store() -> InMemorySecretStore {
    InMemorySecretStore::new()
}

/// Create mock secret store for testing.
pub fn create_mock_secret_store() -> MockSecretStore {
    MockSecretStore::new()
}
