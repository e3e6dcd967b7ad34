//! Task module - the task record, filter preferences, and query parameters.
//!
//! These are plain data types with no IO:
//! - `Task` is replaced wholesale on every edit, never mutated in place
//! - `TaskQuery` carries the filter predicate so it can be checked without SQL

pub mod task;
mod query;

pub use task::{validate_task_name, Task, TaskId, TaskValidationError, BLANK_NAME_MESSAGE};
pub use query::{FilterPreferences, ParseSortOrderError, SortOrder, TaskQuery};
