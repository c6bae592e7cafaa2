//! Test double that logs every call and can be told to fail writes.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::{MemoryStore, TaskStore};
use crate::error::StoreError;
use crate::task::{Task, TaskFields, TaskPatch};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    ListAll,
    Create(TaskFields),
    Update(String, TaskPatch),
    Delete(String),
}

#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    calls: Mutex<Vec<StoreCall>>,
    fail_writes: AtomicBool,
}

impl RecordingStore {
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            inner: MemoryStore::with_tasks(tasks),
            ..Self::default()
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<StoreCall> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, StoreCall::ListAll))
            .collect()
    }

    pub async fn remote(&self) -> Vec<Task> {
        self.inner.list_all().await.unwrap()
    }

    fn record(&self, call: StoreCall) -> Result<(), StoreError> {
        let is_write = !matches!(call, StoreCall::ListAll);
        self.calls.lock().unwrap().push(call);
        if is_write && self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Status {
                status: 503,
                url: "recording://tasks".to_string(),
                body: "unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TaskStore for RecordingStore {
    fn name(&self) -> &str {
        "recording"
    }

    async fn list_all(&self) -> Result<Vec<Task>, StoreError> {
        self.record(StoreCall::ListAll)?;
        self.inner.list_all().await
    }

    async fn create(&self, fields: &TaskFields) -> Result<String, StoreError> {
        self.record(StoreCall::Create(fields.clone()))?;
        self.inner.create(fields).await
    }

    async fn update_fields(&self, id: &str, patch: &TaskPatch) -> Result<(), StoreError> {
        self.record(StoreCall::Update(id.to_string(), patch.clone()))?;
        self.inner.update_fields(id, patch).await
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.record(StoreCall::Delete(id.to_string()))?;
        self.inner.delete(id).await
    }
}
