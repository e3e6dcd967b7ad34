//! The task record.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message shown when a task is saved with a blank name.
pub const BLANK_NAME_MESSAGE: &str = "Task Name Cannot Be Empty";

/// Row identifier assigned by the store.
///
/// `TaskId::UNASSIGNED` asks the store to allocate a fresh id on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub i64);

impl TaskId {
    pub const UNASSIGNED: TaskId = TaskId(0);

    pub fn is_unassigned(&self) -> bool {
        self.0 == 0
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TaskId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A single to-do item.
///
/// Equality is structural over every field, which is what the list adapter
/// uses to decide whether a row needs re-rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub name: String,
    #[serde(default)]
    pub important: bool,
    #[serde(default)]
    pub completed: bool,
    /// Creation time, millisecond precision (the store keeps Unix millis).
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub id: TaskId,
}

impl Task {
    /// New unsaved task created now.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            important: false,
            completed: false,
            created: now_millis(),
            id: TaskId::UNASSIGNED,
        }
    }

    pub fn important(mut self, important: bool) -> Self {
        self.important = important;
        self
    }

    pub fn completed(mut self, completed: bool) -> Self {
        self.completed = completed;
        self
    }

    pub fn created_at(mut self, created: DateTime<Utc>) -> Self {
        self.created = created.trunc_subsecs(3);
        self
    }

    pub fn with_id(mut self, id: TaskId) -> Self {
        self.id = id;
        self
    }

    /// Copy with a new completion state.
    pub fn with_completed(&self, completed: bool) -> Self {
        Self {
            completed,
            ..self.clone()
        }
    }

    /// Copy with edited name and importance, keeping id and creation time.
    pub fn with_name_and_importance(&self, name: impl Into<String>, important: bool) -> Self {
        Self {
            name: name.into(),
            important,
            ..self.clone()
        }
    }

    /// Creation time rendered for display, e.g. `Mar 4, 2024, 9:05:00 PM`.
    pub fn created_date_formatted(&self) -> String {
        self.created.format("%b %-d, %Y, %-I:%M:%S %p").to_string()
    }
}

/// Current time truncated to what the store can represent.
pub(crate) fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskValidationError {
    #[error("{}", BLANK_NAME_MESSAGE)]
    BlankName,
}

/// Reject empty or whitespace-only names before they reach the store.
pub fn validate_task_name(name: &str) -> Result<(), TaskValidationError> {
    if name.trim().is_empty() {
        return Err(TaskValidationError::BlankName);
    }
    Ok(())
}
