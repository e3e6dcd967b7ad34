//! Configuration for the task list core.
//!
//! All paths are derived from a single data directory. Environment variables
//! are read by [`Config::from_env`]:
//! - `TODO_DATA_DIR` - directory holding the database and preferences blob
//! - `TODO_DATABASE_NAME` - database file stem (default `task_database`)
//! - `TODO_PREFERENCES_NAME` - preferences file stem (default `user_preferences`)
//! - `TODO_SEED_SAMPLE_TASKS` - insert sample tasks when the database is first created

use std::path::{Path, PathBuf};

const DEFAULT_DATA_DIR: &str = ".mvvm-todo";
const DEFAULT_DATABASE_NAME: &str = "task_database";
const DEFAULT_PREFERENCES_NAME: &str = "user_preferences";

/// Storage locations and first-run behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Private storage area for the database and preferences.
    pub data_dir: PathBuf,
    /// File stem of the SQLite database.
    pub database_name: String,
    /// File stem of the preferences blob.
    pub preferences_name: String,
    /// Insert a fixed list of sample tasks when the database is created.
    pub seed_sample_tasks: bool,
}

impl Config {
    /// Config rooted at `data_dir` with default names and no seeding.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            database_name: DEFAULT_DATABASE_NAME.to_string(),
            preferences_name: DEFAULT_PREFERENCES_NAME.to_string(),
            seed_sample_tasks: false,
        }
    }

    /// Load configuration from `TODO_*` environment variables.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("TODO_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR));

        let mut config = Self::new(data_dir);

        if let Ok(name) = std::env::var("TODO_DATABASE_NAME") {
            if !name.trim().is_empty() {
                config.database_name = name;
            }
        }
        if let Ok(name) = std::env::var("TODO_PREFERENCES_NAME") {
            if !name.trim().is_empty() {
                config.preferences_name = name;
            }
        }
        if let Ok(value) = std::env::var("TODO_SEED_SAMPLE_TASKS") {
            config.seed_sample_tasks = parse_bool(&value).unwrap_or_else(|| {
                tracing::warn!(
                    "Ignoring TODO_SEED_SAMPLE_TASKS={}: expected true/false",
                    value
                );
                false
            });
        }

        config
    }

    /// Enable or disable first-run sample tasks.
    pub fn with_sample_tasks(mut self, seed: bool) -> Self {
        self.seed_sample_tasks = seed;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of the SQLite database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.db", self.database_name))
    }

    /// Path of the preferences blob.
    pub fn preferences_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.json", self.preferences_name))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_DIR)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
