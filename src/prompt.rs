//! The modal task form and notifications, seen from the controller: one
//! await that yields the entered pair or nothing.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::task::TaskInput;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    pub title: String,
    pub confirm_label: String,
    /// Pre-filled values; empty for a new task.
    pub initial: TaskInput,
}

impl PromptRequest {
    pub fn add() -> Self {
        Self {
            title: "Add a new task".to_string(),
            confirm_label: "Add".to_string(),
            initial: TaskInput::default(),
        }
    }

    pub fn edit(current_text: &str, current_deadline: &str) -> Self {
        Self {
            title: "Edit task".to_string(),
            confirm_label: "Save".to_string(),
            initial: TaskInput::new(current_text, current_deadline),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: title.into(),
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait TaskPrompt: Send + Sync {
    /// `None` when the user cancelled.
    async fn ask(&self, request: PromptRequest) -> Option<TaskInput>;

    fn notify(&self, notice: Notice);
}

/// What the UI loop is asked to show.
#[derive(Debug)]
pub enum UiRequest {
    Form {
        request: PromptRequest,
        reply: oneshot::Sender<Option<TaskInput>>,
    },
    Notice(Notice),
}

/// Prompt backed by the UI loop. The loop answers forms through the oneshot.
#[derive(Clone)]
pub struct ChannelPrompt {
    tx: mpsc::UnboundedSender<UiRequest>,
}

impl ChannelPrompt {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<UiRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl TaskPrompt for ChannelPrompt {
    async fn ask(&self, request: PromptRequest) -> Option<TaskInput> {
        let (reply, answer) = oneshot::channel();
        self.tx.send(UiRequest::Form { request, reply }).ok()?;
        // A dropped reply (UI gone) reads as cancel.
        answer.await.ok().flatten()
    }

    fn notify(&self, notice: Notice) {
        let _ = self.tx.send(UiRequest::Notice(notice));
    }
}

#[cfg(test)]
pub mod scripted {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Answers forms from a queue and keeps every request and notice.
    #[derive(Default)]
    pub struct ScriptedPrompt {
        answers: Mutex<VecDeque<Option<TaskInput>>>,
        pub requests: Mutex<Vec<PromptRequest>>,
        pub notices: Mutex<Vec<Notice>>,
    }

    impl ScriptedPrompt {
        pub fn answering(answers: Vec<Option<TaskInput>>) -> Self {
            Self {
                answers: Mutex::new(answers.into()),
                ..Self::default()
            }
        }

        pub fn notices(&self) -> Vec<Notice> {
            self.notices.lock().unwrap().clone()
        }

        pub fn requests(&self) -> Vec<PromptRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TaskPrompt for ScriptedPrompt {
        async fn ask(&self, request: PromptRequest) -> Option<TaskInput> {
            self.requests.lock().unwrap().push(request);
            self.answers.lock().unwrap().pop_front().flatten()
        }

        fn notify(&self, notice: Notice) {
            self.notices.lock().unwrap().push(notice);
        }
    }
}
