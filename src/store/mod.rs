//! Document store abstraction for case records.
//!
//! This module handles:
//! - The `CaseStore` capability consumed by the HTTP handlers
//! - Typed field values
//! - Firestore REST client
//! - In-memory store for testing and local runs

pub mod firestore;
pub mod memory;
pub mod value;

use std::fmt::Debug;

use async_trait::async_trait;

use crate::error::StoreError;

pub use firestore::{Authorization, FirestoreStore};
pub use memory::{MemoryConfig, MemoryStore};
pub use value::{FieldValue, Fields};

/// A stored document and its store-assigned id.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Store-assigned id.
    pub id: String,
    /// Stored fields.
    pub fields: Fields,
}

/// Operations the service needs from a single document collection.
#[async_trait]
pub trait CaseStore: Debug + Send + Sync {
    /// Add a document, letting the store generate its id.
    async fn add(&self, fields: Fields) -> Result<String, StoreError>;

    /// Fetch one document. `Ok(None)` when it does not exist.
    async fn get(&self, id: &str) -> Result<Option<Document>, StoreError>;

    /// Fetch every document in store order.
    async fn list(&self) -> Result<Vec<Document>, StoreError>;

    /// Overwrite the given fields on an existing document, leaving others untouched.
    async fn update(&self, id: &str, fields: Fields) -> Result<(), StoreError>;
}
