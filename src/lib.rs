//! # MVVM Todo
//!
//! The core of a single-user todo list: durable tasks with live queries,
//! persisted filter preferences, a search/filter pipeline that keeps exactly
//! one query open, and a list differ for incremental display updates.
//!
//! ## Architecture
//!
//! ```text
//!   search text ──┐
//!                 ├──► QueryPipeline ──► TaskListStream ──► TaskListAdapter
//!   preferences ──┘         │                                 (diff ops)
//!   (PreferencesStore)      ▼
//!                      TaskStore ── LiveQuery (re-runs on every change)
//!                           ▲
//!                 TasksViewModel / AddEditTaskViewModel /
//!                 DeleteAllCompletedViewModel (writes + one-shot events)
//! ```
//!
//! ## Modules
//! - `task`: task record, sort order, filter preferences, query parameters
//! - `store`: SQLite task table and live queries
//! - `preferences`: persisted sort order and hide-completed flag
//! - `pipeline`: search text + preferences to a live task list
//! - `adapter`: minimal edit script between two task lists
//! - `events`: one-shot screen events
//! - `viewmodel`: screen controllers
//! - `config`, `logging`: ambient setup

pub mod adapter;
pub mod config;
pub mod events;
pub mod logging;
pub mod pipeline;
pub mod preferences;
pub mod store;
pub mod task;
pub mod viewmodel;

pub use adapter::{DiffOp, TaskListAdapter};
pub use config::Config;
pub use pipeline::{QueryPipeline, TaskListSnapshot, TaskListStream};
pub use preferences::{PreferencesStore, SharedPreferencesStore};
pub use store::TaskStore;
pub use task::{FilterPreferences, SortOrder, Task, TaskId, TaskQuery};
pub use viewmodel::{AddEditTaskViewModel, DeleteAllCompletedViewModel, TasksViewModel};
