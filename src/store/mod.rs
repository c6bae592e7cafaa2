//! Remote task collection.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::task::{Task, TaskFields, TaskPatch};

pub mod firestore;
pub mod memory;

#[cfg(test)]
pub mod recording;

pub use firestore::FirestoreStore;
pub use memory::MemoryStore;

#[async_trait]
pub trait TaskStore: Send + Sync {
    fn name(&self) -> &str;

    /// Every document in the collection, in the store's enumeration order.
    async fn list_all(&self) -> Result<Vec<Task>, StoreError>;

    /// Persists a new document and returns the id the store assigned.
    async fn create(&self, fields: &TaskFields) -> Result<String, StoreError>;

    async fn update_fields(&self, id: &str, patch: &TaskPatch) -> Result<(), StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}
