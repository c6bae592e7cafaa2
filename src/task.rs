use serde::{Deserialize, Serialize};

use crate::countdown::{parse_deadline, Countdown};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub text: String,
    pub completed: bool,
    pub deadline: String,
}

impl Task {
    pub fn from_fields(id: String, fields: TaskFields) -> Self {
        Self {
            id,
            text: fields.text,
            completed: fields.completed,
            deadline: fields.deadline,
        }
    }

    pub fn apply(&mut self, patch: &TaskPatch) {
        if let Some(text) = &patch.text {
            self.text = text.clone();
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
        if let Some(deadline) = &patch.deadline {
            self.deadline = deadline.clone();
        }
    }

    /// Completion wins over expiry; an invalid deadline renders as active.
    pub fn visual_state(&self, countdown: &Countdown) -> VisualState {
        if self.completed {
            VisualState::Completed
        } else if countdown.is_expired() {
            VisualState::Expired
        } else {
            VisualState::Active
        }
    }
}

/// Document body written on create.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TaskFields {
    pub text: String,
    pub completed: bool,
    pub deadline: String,
}

impl TaskFields {
    pub fn new_pending(input: TaskInput) -> Self {
        Self {
            text: input.text,
            completed: false,
            deadline: input.deadline,
        }
    }
}

/// Partial update; `None` fields are left untouched on the remote document.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
}

impl TaskPatch {
    pub fn completed(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Self::default()
        }
    }

    pub fn text_and_deadline(text: String, deadline: String) -> Self {
        Self {
            text: Some(text),
            deadline: Some(deadline),
            ..Self::default()
        }
    }

    /// Field names in a stable order, used as the update mask.
    pub fn field_paths(&self) -> Vec<&'static str> {
        let mut paths = Vec::new();
        if self.text.is_some() {
            paths.push("text");
        }
        if self.completed.is_some() {
            paths.push("completed");
        }
        if self.deadline.is_some() {
            paths.push("deadline");
        }
        paths
    }
}

/// What the user typed into the task form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskInput {
    pub text: String,
    pub deadline: String,
}

impl TaskInput {
    pub fn new(text: impl Into<String>, deadline: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            deadline: deadline.into(),
        }
    }

    /// Both values present and the deadline parses. Whitespace-only counts
    /// as empty.
    pub fn is_complete(&self) -> bool {
        !self.text.trim().is_empty() && parse_deadline(&self.deadline).is_some()
    }

    pub fn trimmed(self) -> Self {
        Self {
            text: self.text.trim().to_string(),
            deadline: self.deadline.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualState {
    Completed,
    Expired,
    Active,
}
