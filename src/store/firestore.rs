//! Cloud Firestore REST backend.
//!
//! Documents live under
//! `{base_url}/v1/projects/{project}/databases/{database}/documents/{collection}`
//! and carry typed values (`{"stringValue": ".."}`, `{"booleanValue": true}`).

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::TaskStore;
use crate::config::FirestoreConfig;
use crate::error::StoreError;
use crate::task::{Task, TaskFields, TaskPatch};

const BODY_PREVIEW_LIMIT: usize = 512;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Value {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    string_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    boolean_value: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp_value: Option<String>,
}

impl Value {
    fn string(s: &str) -> Self {
        Self {
            string_value: Some(s.to_string()),
            ..Self::default()
        }
    }

    fn boolean(b: bool) -> Self {
        Self {
            boolean_value: Some(b),
            ..Self::default()
        }
    }

    fn as_text(&self) -> Option<&str> {
        self.string_value
            .as_deref()
            .or(self.timestamp_value.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    name: String,
    #[serde(default)]
    fields: BTreeMap<String, Value>,
}

impl Document {
    fn id(&self) -> Option<&str> {
        self.name.rsplit('/').next().filter(|id| !id.is_empty())
    }

    fn from_fields(fields: &TaskFields) -> Self {
        let mut doc = Self::default();
        doc.fields.insert("text".to_string(), Value::string(&fields.text));
        doc.fields
            .insert("completed".to_string(), Value::boolean(fields.completed));
        doc.fields
            .insert("deadline".to_string(), Value::string(&fields.deadline));
        doc
    }

    fn from_patch(patch: &TaskPatch) -> Self {
        let mut doc = Self::default();
        if let Some(text) = &patch.text {
            doc.fields.insert("text".to_string(), Value::string(text));
        }
        if let Some(completed) = patch.completed {
            doc.fields
                .insert("completed".to_string(), Value::boolean(completed));
        }
        if let Some(deadline) = &patch.deadline {
            doc.fields.insert("deadline".to_string(), Value::string(deadline));
        }
        doc
    }

    /// Missing fields fall back to empty text, not completed.
    fn into_task(self) -> Option<Task> {
        let id = self.id()?.to_string();
        let text = |key: &str| {
            self.fields
                .get(key)
                .and_then(Value::as_text)
                .unwrap_or_default()
                .to_string()
        };
        Some(Task {
            text: text("text"),
            completed: self
                .fields
                .get("completed")
                .and_then(|v| v.boolean_value)
                .unwrap_or(false),
            deadline: text("deadline"),
            id,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<Document>,
    #[serde(default)]
    next_page_token: Option<String>,
}

pub struct FirestoreStore {
    http: reqwest::Client,
    collection_url: String,
    api_key: Option<String>,
    page_size: u32,
}

impl FirestoreStore {
    pub fn new(cfg: &FirestoreConfig) -> Result<Self, StoreError> {
        let collection_url = format!(
            "{}/v1/projects/{}/databases/{}/documents/{}",
            cfg.base_url.trim_end_matches('/'),
            cfg.project_id,
            cfg.database,
            cfg.collection
        );
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|source| StoreError::Http {
                url: collection_url.clone(),
                source,
            })?;
        let api_key = Some(cfg.api_key.trim())
            .filter(|k| !k.is_empty())
            .map(str::to_string);
        Ok(Self {
            http,
            collection_url,
            api_key,
            page_size: cfg.page_size.max(1),
        })
    }

    pub fn collection_url(&self) -> &str {
        &self.collection_url
    }

    fn document_url(&self, id: &str) -> String {
        format!("{}/{}", self.collection_url, id)
    }

    async fn send(&self, req: reqwest::RequestBuilder, url: &str) -> Result<String, StoreError> {
        let req = match &self.api_key {
            Some(key) => req.query(&[("key", key)]),
            None => req,
        };
        let resp = req.send().await.map_err(|source| StoreError::Http {
            url: url.to_string(),
            source,
        })?;
        let status = resp.status();
        let body = resp.text().await.map_err(|source| StoreError::Http {
            url: url.to_string(),
            source,
        })?;
        tracing::debug!(
            target: "todolist.store",
            url = %url,
            status = %status,
            body_len = body.len()
        );
        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                body: preview_body(&body),
            });
        }
        Ok(body)
    }
}

fn decode<T: DeserializeOwned + Default>(url: &str, body: &str) -> Result<T, StoreError> {
    if body.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(body).map_err(|e| StoreError::Decode {
        url: url.to_string(),
        message: format!("{} | body={}", e, preview_body(body)),
    })
}

fn preview_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }
    if trimmed.chars().count() <= BODY_PREVIEW_LIMIT {
        return trimmed.to_string();
    }
    let mut preview: String = trimmed.chars().take(BODY_PREVIEW_LIMIT).collect();
    preview.push_str("...");
    preview
}

#[async_trait]
impl TaskStore for FirestoreStore {
    fn name(&self) -> &str {
        "firestore"
    }

    async fn list_all(&self) -> Result<Vec<Task>, StoreError> {
        let url = self.collection_url.clone();
        let mut tasks = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut req = self
                .http
                .get(&url)
                .query(&[("pageSize", self.page_size.to_string())]);
            if let Some(token) = &page_token {
                req = req.query(&[("pageToken", token)]);
            }
            let body = self.send(req, &url).await?;
            let page: ListDocumentsResponse = decode(&url, &body)?;
            for doc in page.documents {
                match doc.into_task() {
                    Some(task) => tasks.push(task),
                    None => tracing::warn!(target: "todolist.store", "skipping document without a name"),
                }
            }
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) if page_token.as_deref() == Some(token.as_str()) => {
                    tracing::warn!(target: "todolist.store", token = %token, "page token repeated, stopping");
                    break;
                }
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        tracing::debug!(target: "todolist.store", count = tasks.len(), "listed tasks");
        Ok(tasks)
    }

    async fn create(&self, fields: &TaskFields) -> Result<String, StoreError> {
        let url = self.collection_url.clone();
        let req = self.http.post(&url).json(&Document::from_fields(fields));
        let body = self.send(req, &url).await?;
        let doc: Document = decode(&url, &body)?;
        let id = doc.id().ok_or_else(|| StoreError::Decode {
            url: url.clone(),
            message: "created document has no name".to_string(),
        })?;
        tracing::debug!(target: "todolist.store", id = %id, "created task");
        Ok(id.to_string())
    }

    async fn update_fields(&self, id: &str, patch: &TaskPatch) -> Result<(), StoreError> {
        let paths = patch.field_paths();
        if paths.is_empty() {
            return Ok(());
        }
        let url = self.document_url(id);
        let mut req = self.http.patch(&url);
        for path in &paths {
            req = req.query(&[("updateMask.fieldPaths", path)]);
        }
        let req = req
            .query(&[("currentDocument.exists", "true")])
            .json(&Document::from_patch(patch));
        self.send(req, &url).await?;
        tracing::debug!(target: "todolist.store", id = %id, fields = ?paths, "updated task");
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let url = self.document_url(id);
        let req = self.http.delete(&url);
        self.send(req, &url).await?;
        tracing::debug!(target: "todolist.store", id = %id, "deleted task");
        Ok(())
    }
}
