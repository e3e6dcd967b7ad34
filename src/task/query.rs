//! Sort order, filter preferences, and the derived query parameters.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::task::Task;

/// How the task list is ordered after the important-first key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortOrder {
    #[serde(rename = "BY_NAME")]
    ByName,
    #[default]
    #[serde(rename = "BY_DATE")]
    ByDate,
}

impl SortOrder {
    /// Persisted name of the variant.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ByName => "BY_NAME",
            Self::ByDate => "BY_DATE",
        }
    }
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown sort order: {0}")]
pub struct ParseSortOrderError(pub String);

impl FromStr for SortOrder {
    type Err = ParseSortOrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BY_NAME" => Ok(Self::ByName),
            "BY_DATE" => Ok(Self::ByDate),
            other => Err(ParseSortOrderError(other.to_string())),
        }
    }
}

/// The two persisted list settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterPreferences {
    pub sort_order: SortOrder,
    pub hide_completed: bool,
}

impl Default for FilterPreferences {
    fn default() -> Self {
        Self {
            sort_order: SortOrder::ByDate,
            hide_completed: true,
        }
    }
}

/// Parameters of one store query: current search text joined with current
/// preferences. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskQuery {
    pub search_text: String,
    pub sort_order: SortOrder,
    pub hide_completed: bool,
}

impl TaskQuery {
    pub fn new(search_text: impl Into<String>, sort_order: SortOrder, hide_completed: bool) -> Self {
        Self {
            search_text: search_text.into(),
            sort_order,
            hide_completed,
        }
    }

    pub fn from_preferences(search_text: impl Into<String>, preferences: FilterPreferences) -> Self {
        Self::new(search_text, preferences.sort_order, preferences.hide_completed)
    }

    /// In-process form of the store's WHERE clause:
    /// `(completed != hide_completed OR completed = 0) AND name LIKE %search%`.
    ///
    /// The substring test folds ASCII case the way SQLite's `LIKE` does.
    pub fn matches(&self, task: &Task) -> bool {
        let visible = task.completed != self.hide_completed || !task.completed;
        visible && contains_ascii_case_insensitive(&task.name, &self.search_text)
    }
}

/// Empty search with default preferences: the first query a fresh pipeline opens.
impl Default for TaskQuery {
    fn default() -> Self {
        Self::from_preferences("", FilterPreferences::default())
    }
}

fn contains_ascii_case_insensitive(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    let haystack = haystack.to_ascii_lowercase();
    let needle = needle.to_ascii_lowercase();
    haystack.contains(&needle)
}
