/// SQL DDL for the task database.
/// `AUTOINCREMENT` keeps ids of deleted rows from being handed out again.
pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS task_table (
    name TEXT NOT NULL,
    important INTEGER NOT NULL DEFAULT 0,
    completed INTEGER NOT NULL DEFAULT 0,
    created INTEGER NOT NULL,
    id INTEGER PRIMARY KEY AUTOINCREMENT
);

CREATE INDEX IF NOT EXISTS idx_task_completed ON task_table(completed);
"#;

pub const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA busy_timeout = 5000;
PRAGMA synchronous = NORMAL;
"#;

pub const TASK_TABLE_EXISTS: &str =
    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'task_table'";

pub const SELECT_BY_DATE: &str = r#"
SELECT name, important, completed, created, id FROM task_table
WHERE (completed != ?1 OR completed = 0)
  AND name LIKE '%' || ?2 || '%' ESCAPE '\'
ORDER BY important DESC, created ASC, id ASC
"#;

pub const SELECT_BY_NAME: &str = r#"
SELECT name, important, completed, created, id FROM task_table
WHERE (completed != ?1 OR completed = 0)
  AND name LIKE '%' || ?2 || '%' ESCAPE '\'
ORDER BY important DESC, name ASC, id ASC
"#;

/// Tasks inserted when a fresh database is created with seeding enabled:
/// `(name, important, completed)`.
pub const SAMPLE_TASKS: &[(&str, bool, bool)] = &[
    ("Build Widget Prototype for HN App", false, false),
    ("GSOC Weekly Task Complete", true, false),
    ("Revise Leetcode Questions", false, true),
    ("App Previews for PlayStore", false, true),
    ("Deploy Update to Personal Blog", false, false),
];
