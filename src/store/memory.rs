//! In-memory case store for unit testing and local runs.
//!
//! Mirrors the Firestore behaviour the service relies on: 20-character
//! auto-generated ids, listing in ascending id order, and field-level merges.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::StoreError;

use super::{CaseStore, Document, Fields};

/// Length of generated document ids.
pub const AUTO_ID_LEN: usize = 20;

/// Configuration for in-memory store behavior.
#[derive(Debug, Clone, Default)]
pub struct MemoryConfig {
    /// Whether to fail add requests.
    pub fail_add: bool,
    /// Whether to fail get requests.
    pub fail_get: bool,
    /// Whether to fail list requests.
    pub fail_list: bool,
    /// Whether to fail update requests.
    pub fail_update: bool,
    /// Simulated latency in milliseconds.
    pub latency_ms: u64,
}

/// In-memory document collection.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    /// Store configuration.
    config: MemoryConfig,
    /// Documents keyed by id.
    documents: Arc<RwLock<BTreeMap<String, Fields>>>,
}

impl MemoryStore {
    /// Create an empty store that never fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with custom failure behavior.
    pub fn with_config(config: MemoryConfig) -> Self {
        Self {
            config,
            documents: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Insert a document under a fixed id, replacing any existing one.
    pub async fn insert(&self, id: impl Into<String>, fields: Fields) {
        self.documents.write().await.insert(id.into(), fields);
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    /// Whether the store holds no documents.
    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    async fn simulate(&self, fail: bool, operation: &str) -> Result<(), StoreError> {
        if self.config.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.config.latency_ms)).await;
        }

        if fail {
            return Err(StoreError::Unavailable(format!(
                "simulated {} failure",
                operation
            )));
        }

        Ok(())
    }
}

/// Generate a random alphanumeric document id.
pub fn generate_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(AUTO_ID_LEN)
        .map(char::from)
        .collect()
}

#[async_trait]
impl CaseStore for MemoryStore {
    async fn add(&self, fields: Fields) -> Result<String, StoreError> {
        self.simulate(self.config.fail_add, "add").await?;

        let mut documents = self.documents.write().await;
        let mut id = generate_id();
        while documents.contains_key(&id) {
            id = generate_id();
        }
        documents.insert(id.clone(), fields);

        debug!(id = %id, "added document");
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<Document>, StoreError> {
        self.simulate(self.config.fail_get, "get").await?;

        let documents = self.documents.read().await;
        Ok(documents.get(id).map(|fields| Document {
            id: id.to_string(),
            fields: fields.clone(),
        }))
    }

    async fn list(&self) -> Result<Vec<Document>, StoreError> {
        self.simulate(self.config.fail_list, "list").await?;

        let documents = self.documents.read().await;
        Ok(documents
            .iter()
            .map(|(id, fields)| Document {
                id: id.clone(),
                fields: fields.clone(),
            })
            .collect())
    }

    async fn update(&self, id: &str, fields: Fields) -> Result<(), StoreError> {
        self.simulate(self.config.fail_update, "update").await?;

        let mut documents = self.documents.write().await;
        let existing = documents.get_mut(id).ok_or_else(|| StoreError::Api {
            status: 404,
            message: format!("No document to update: {}", id),
        })?;
        existing.extend(fields);

        debug!(id = %id, "updated document");
        Ok(())
    }
}
