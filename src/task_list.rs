//! In-memory task list kept in step with the remote store.
//!
//! Toggle and edit are optimistic: the local change is published first and
//! the remote write follows. Nothing is rolled back when a write fails;
//! [`TaskList::load`] is the reconciliation pass.

use std::sync::Arc;
use tokio::sync::watch;

use crate::error::StoreError;
use crate::prompt::{Notice, PromptRequest, TaskPrompt};
use crate::store::TaskStore;
use crate::task::{Task, TaskFields, TaskInput, TaskPatch};

pub struct TaskList {
    store: Arc<dyn TaskStore>,
    tasks: watch::Sender<Vec<Task>>,
}

impl TaskList {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        let (tasks, _) = watch::channel(Vec::new());
        Self { store, tasks }
    }

    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    /// Read-only view for the countdown ticker and the UI.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Task>> {
        self.tasks.subscribe()
    }

    pub fn snapshot(&self) -> Vec<Task> {
        self.tasks.borrow().clone()
    }

    pub fn get(&self, id: &str) -> Option<Task> {
        self.tasks.borrow().iter().find(|t| t.id == id).cloned()
    }

    /// Replaces local state wholesale with the store's collection.
    pub async fn load(&self) -> Result<usize, StoreError> {
        let tasks = self.store.list_all().await?;
        let count = tasks.len();
        self.tasks.send_replace(tasks);
        tracing::info!(target: "todolist.tasks", store = self.store.name(), count, "loaded tasks");
        Ok(count)
    }

    /// Appends the task once the store has assigned its id. Blank input is a
    /// no-op.
    pub async fn add(&self, input: TaskInput) -> Result<Option<Task>, StoreError> {
        if !input.is_complete() {
            tracing::debug!(target: "todolist.tasks", "add skipped: empty input");
            return Ok(None);
        }
        let fields = TaskFields::new_pending(input.trimmed());
        let id = self.store.create(&fields).await?;
        let task = Task::from_fields(id, fields);
        self.tasks.send_modify(|tasks| tasks.push(task.clone()));
        tracing::info!(target: "todolist.tasks", id = %task.id, "task added");
        Ok(Some(task))
    }

    /// Returns the new `completed` value, or `None` for an unknown id (no
    /// remote write in that case).
    pub async fn toggle(&self, id: &str) -> Result<Option<bool>, StoreError> {
        let mut flipped = None;
        self.tasks.send_if_modified(|tasks| {
            match tasks.iter_mut().find(|t| t.id == id) {
                Some(task) => {
                    task.completed = !task.completed;
                    flipped = Some(task.completed);
                    true
                }
                None => false,
            }
        });
        let Some(completed) = flipped else {
            tracing::debug!(target: "todolist.tasks", id, "toggle skipped: unknown id");
            return Ok(None);
        };

        if let Err(e) = self
            .store
            .update_fields(id, &TaskPatch::completed(completed))
            .await
        {
            tracing::warn!(target: "todolist.tasks", id, error = %e, "toggle not persisted");
            return Err(e);
        }
        Ok(Some(completed))
    }

    /// Returns whether a task was updated. Blank input or an unknown id is a
    /// no-op.
    pub async fn edit(&self, id: &str, input: TaskInput) -> Result<bool, StoreError> {
        if !input.is_complete() {
            return Ok(false);
        }
        let input = input.trimmed();
        let patch = TaskPatch::text_and_deadline(input.text, input.deadline);
        let updated = self.tasks.send_if_modified(|tasks| {
            match tasks.iter_mut().find(|t| t.id == id) {
                Some(task) => {
                    task.apply(&patch);
                    true
                }
                None => false,
            }
        });
        if !updated {
            tracing::debug!(target: "todolist.tasks", id, "edit skipped: unknown id");
            return Ok(false);
        }

        if let Err(e) = self.store.update_fields(id, &patch).await {
            tracing::warn!(target: "todolist.tasks", id, error = %e, "edit not persisted");
            return Err(e);
        }
        Ok(true)
    }

    /// Deletes remotely, then drops the local entry whatever the remote
    /// outcome. Returns whether a local entry was removed.
    pub async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let remote = self.store.delete(id).await;
        let removed = self.tasks.send_if_modified(|tasks| {
            let before = tasks.len();
            tasks.retain(|t| t.id != id);
            tasks.len() != before
        });
        match remote {
            Ok(()) => {
                tracing::info!(target: "todolist.tasks", id, "task deleted");
                Ok(removed)
            }
            Err(e) => {
                tracing::warn!(target: "todolist.tasks", id, error = %e, "delete not persisted");
                Err(e)
            }
        }
    }

    pub async fn prompt_add(&self, prompt: &dyn TaskPrompt) -> Result<Option<Task>, StoreError> {
        let Some(input) = prompt.ask(PromptRequest::add()).await else {
            return Ok(None);
        };
        match self.add(input).await {
            Ok(Some(task)) => {
                prompt.notify(Notice::success(
                    "Task added!",
                    "The new task was added successfully.",
                ));
                Ok(Some(task))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                prompt.notify(Notice::error("Could not add task", e.to_string()));
                Err(e)
            }
        }
    }

    pub async fn prompt_edit(&self, prompt: &dyn TaskPrompt, id: &str) -> Result<bool, StoreError> {
        let Some(current) = self.get(id) else {
            return Ok(false);
        };
        let Some(input) = prompt
            .ask(PromptRequest::edit(&current.text, &current.deadline))
            .await
        else {
            return Ok(false);
        };
        match self.edit(id, input).await {
            Ok(true) => {
                prompt.notify(Notice::success("Task updated!", "Your changes were saved."));
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(e) => {
                prompt.notify(Notice::error("Could not save task", e.to_string()));
                Err(e)
            }
        }
    }

    pub async fn toggle_and_notify(
        &self,
        prompt: &dyn TaskPrompt,
        id: &str,
    ) -> Result<Option<bool>, StoreError> {
        self.toggle(id).await.inspect_err(|e| {
            prompt.notify(Notice::error("Could not update task", e.to_string()));
        })
    }

    pub async fn delete_and_notify(&self, prompt: &dyn TaskPrompt, id: &str) -> Result<bool, StoreError> {
        match self.delete(id).await {
            Ok(removed) => {
                prompt.notify(Notice::success("Task deleted!", "The task was removed."));
                Ok(removed)
            }
            Err(e) => {
                prompt.notify(Notice::error("Could not delete task", e.to_string()));
                Err(e)
            }
        }
    }

    pub async fn reload_and_notify(&self, prompt: &dyn TaskPrompt) -> Result<usize, StoreError> {
        self.load().await.inspect_err(|e| {
            prompt.notify(Notice::error("Could not load tasks", e.to_string()));
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::scripted::ScriptedPrompt;
    use crate::prompt::NoticeLevel;
    use crate::store::recording::{RecordingStore, StoreCall};
    use pretty_assertions::assert_eq;

    fn task(id: &str, text: &str, completed: bool) -> Task {
        Task {
            id: id.to_string(),
            text: text.to_string(),
            completed,
            deadline: "2024-05-01T12:00".to_string(),
        }
    }

    async fn loaded(tasks: Vec<Task>) -> (TaskList, Arc<RecordingStore>) {
        let store = Arc::new(RecordingStore::with_tasks(tasks));
        let list = TaskList::new(store.clone());
        list.load().await.unwrap();
        (list, store)
    }

    #[tokio::test]
    async fn load_replaces_local_state() {
        let (list, store) = loaded(vec![task("t1", "a", false), task("t2", "b", true)]).await;
        assert_eq!(list.snapshot().len(), 2);
        assert_eq!(store.calls(), vec![StoreCall::ListAll]);

        store.create(&TaskFields::new_pending(TaskInput::new("c", "2024-05-02T08:00"))).await.unwrap();
        list.load().await.unwrap();
        let texts: Vec<_> = list.snapshot().into_iter().map(|t| t.text).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn add_with_blank_input_is_a_noop() {
        let (list, store) = loaded(vec![]).await;
        assert_eq!(list.add(TaskInput::new("", "2024-05-01T12:00")).await.unwrap(), None);
        assert_eq!(list.add(TaskInput::new("Write report", "")).await.unwrap(), None);
        assert_eq!(list.add(TaskInput::new("  ", "  ")).await.unwrap(), None);
        assert!(list.snapshot().is_empty());
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn add_appends_task_with_store_id() {
        let (list, store) = loaded(vec![task("t1", "a", false)]).await;
        let added = list
            .add(TaskInput::new("Write report", "2024-05-01T12:00"))
            .await
            .unwrap()
            .unwrap();

        let remote = store.remote().await;
        assert_eq!(remote.last().unwrap().id, added.id);
        assert!(!added.completed);

        let local = list.snapshot();
        assert_eq!(local.len(), 2);
        assert_eq!(local[1], added);
        assert_eq!(
            store.writes(),
            vec![StoreCall::Create(TaskFields {
                text: "Write report".to_string(),
                completed: false,
                deadline: "2024-05-01T12:00".to_string(),
            })]
        );
    }

    #[tokio::test]
    async fn failed_add_leaves_local_state_untouched() {
        let (list, store) = loaded(vec![]).await;
        store.fail_writes(true);
        assert!(list.add(TaskInput::new("a", "2024-05-01T12:00")).await.is_err());
        assert!(list.snapshot().is_empty());
    }

    #[tokio::test]
    async fn toggle_flips_only_target_and_writes_completed() {
        let (list, store) = loaded(vec![task("t1", "a", false), task("t2", "b", false)]).await;
        assert_eq!(list.toggle("t1").await.unwrap(), Some(true));

        let local = list.snapshot();
        assert_eq!(local[0], Task { completed: true, ..task("t1", "a", false) });
        assert_eq!(local[1], task("t2", "b", false));
        assert_eq!(
            store.writes(),
            vec![StoreCall::Update("t1".to_string(), TaskPatch::completed(true))]
        );
        assert!(store.remote().await[0].completed);
    }

    #[tokio::test]
    async fn toggle_unknown_id_writes_nothing() {
        let (list, store) = loaded(vec![task("t1", "a", false)]).await;
        let mut rx = list.subscribe();
        rx.borrow_and_update();

        assert_eq!(list.toggle("nope").await.unwrap(), None);
        assert!(store.writes().is_empty());
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn toggle_is_not_rolled_back_on_failure() {
        let (list, store) = loaded(vec![task("t1", "a", false)]).await;
        store.fail_writes(true);
        assert!(list.toggle("t1").await.is_err());
        assert!(list.get("t1").unwrap().completed);
        assert!(!store.remote().await[0].completed);

        list.load().await.unwrap();
        assert!(!list.get("t1").unwrap().completed);
    }

    #[tokio::test]
    async fn edit_updates_text_and_deadline() {
        let (list, store) = loaded(vec![task("t1", "a", true)]).await;
        let updated = list
            .edit("t1", TaskInput::new(" Send report ", "2024-06-01T09:00"))
            .await
            .unwrap();
        assert!(updated);

        let t = list.get("t1").unwrap();
        assert_eq!(t.text, "Send report");
        assert_eq!(t.deadline, "2024-06-01T09:00");
        assert!(t.completed);
        assert_eq!(
            store.writes(),
            vec![StoreCall::Update(
                "t1".to_string(),
                TaskPatch::text_and_deadline("Send report".to_string(), "2024-06-01T09:00".to_string())
            )]
        );
    }

    #[tokio::test]
    async fn edit_incomplete_or_unknown_is_a_noop() {
        let (list, store) = loaded(vec![task("t1", "a", false)]).await;
        assert!(!list.edit("t1", TaskInput::new("", "2024-06-01T09:00")).await.unwrap());
        assert!(!list.edit("nope", TaskInput::new("x", "2024-06-01T09:00")).await.unwrap());
        assert!(!list.edit("t1", TaskInput::new("b", "next week")).await.unwrap());
        assert_eq!(list.get("t1").unwrap(), task("t1", "a", false));
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn delete_removes_one_entry_and_issues_one_delete() {
        let (list, store) = loaded(vec![task("t1", "a", false), task("t2", "b", false)]).await;
        assert!(list.delete("t1").await.unwrap());
        assert_eq!(list.snapshot(), vec![task("t2", "b", false)]);
        assert_eq!(store.writes(), vec![StoreCall::Delete("t1".to_string())]);
    }

    #[tokio::test]
    async fn delete_removes_locally_even_when_remote_fails() {
        let (list, store) = loaded(vec![task("t1", "a", false), task("t2", "b", false)]).await;
        store.fail_writes(true);
        assert!(list.delete("t1").await.is_err());
        assert_eq!(list.snapshot(), vec![task("t2", "b", false)]);
        assert_eq!(store.writes(), vec![StoreCall::Delete("t1".to_string())]);
    }

    #[tokio::test]
    async fn concurrent_actions_all_land() {
        let (list, store) = loaded(vec![task("t1", "a", false), task("t2", "b", false)]).await;
        let list = Arc::new(list);
        let (a, b, c) = tokio::join!(
            list.toggle("t1"),
            list.delete("t2"),
            list.add(TaskInput::new("c", "2024-05-02T08:00")),
        );
        a.unwrap();
        b.unwrap();
        c.unwrap();

        let local = list.snapshot();
        assert_eq!(local.len(), 2);
        assert!(local[0].completed);
        assert_eq!(local[1].text, "c");
        assert_eq!(store.writes().len(), 3);
    }

    #[tokio::test]
    async fn prompt_add_notifies_on_success() {
        let (list, _store) = loaded(vec![]).await;
        let prompt = ScriptedPrompt::answering(vec![Some(TaskInput::new("Write report", "2024-05-01T12:00"))]);
        let task = list.prompt_add(&prompt).await.unwrap().unwrap();
        assert_eq!(task.text, "Write report");
        assert_eq!(prompt.requests(), vec![PromptRequest::add()]);
        let notices = prompt.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Success);
    }

    #[tokio::test]
    async fn prompt_add_cancel_is_silent() {
        let (list, store) = loaded(vec![]).await;
        let prompt = ScriptedPrompt::answering(vec![None]);
        assert_eq!(list.prompt_add(&prompt).await.unwrap(), None);
        assert!(prompt.notices().is_empty());
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn prompt_add_with_unparsable_deadline_writes_nothing() {
        let (list, store) = loaded(vec![]).await;
        let prompt = ScriptedPrompt::answering(vec![Some(TaskInput::new("Write report", "tomorrow-ish"))]);
        assert_eq!(list.prompt_add(&prompt).await.unwrap(), None);
        assert!(store.writes().is_empty());
        assert!(list.snapshot().is_empty());
        assert!(prompt.notices().is_empty());
    }

    #[tokio::test]
    async fn prompt_edit_prefills_current_values() {
        let (list, _store) = loaded(vec![task("t1", "a", false)]).await;
        let prompt = ScriptedPrompt::answering(vec![Some(TaskInput::new("b", "2024-07-01T10:00"))]);
        assert!(list.prompt_edit(&prompt, "t1").await.unwrap());
        assert_eq!(prompt.requests(), vec![PromptRequest::edit("a", "2024-05-01T12:00")]);
        assert_eq!(list.get("t1").unwrap().text, "b");
    }

    #[tokio::test]
    async fn prompt_edit_unknown_id_does_not_prompt() {
        let (list, _store) = loaded(vec![]).await;
        let prompt = ScriptedPrompt::default();
        assert!(!list.prompt_edit(&prompt, "nope").await.unwrap());
        assert!(prompt.requests().is_empty());
    }

    #[tokio::test]
    async fn failed_delete_notifies_error() {
        let (list, store) = loaded(vec![task("t1", "a", false)]).await;
        store.fail_writes(true);
        let prompt = ScriptedPrompt::default();
        assert!(list.delete_and_notify(&prompt, "t1").await.is_err());
        let notices = prompt.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
        assert!(notices[0].message.contains("503"));
    }
}
