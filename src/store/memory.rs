use async_trait::async_trait;
use std::sync::Mutex;
use uuid::Uuid;

use super::TaskStore;
use crate::error::StoreError;
use crate::task::{Task, TaskFields, TaskPatch};

/// In-process collection. Keeps insertion order and hands out UUIDv4 ids.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: Mutex<Vec<Task>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            docs: Mutex::new(tasks),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Task>> {
        self.docs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list_all(&self) -> Result<Vec<Task>, StoreError> {
        Ok(self.lock().clone())
    }

    async fn create(&self, fields: &TaskFields) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        self.lock().push(Task::from_fields(id.clone(), fields.clone()));
        Ok(id)
    }

    async fn update_fields(&self, id: &str, patch: &TaskPatch) -> Result<(), StoreError> {
        let mut docs = self.lock();
        let doc = docs
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        doc.apply(patch);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut docs = self.lock();
        let before = docs.len();
        docs.retain(|t| t.id != id);
        if docs.len() == before {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }
}
