//! Task store - the durable task table and its live queries.
//!
//! Storage is a single SQLite file. Every operation that touches the table is
//! `async` and runs its SQL on the blocking pool. Mutations that change rows
//! publish a [`TableChange`], which makes every open [`LiveQuery`] re-run.

mod database;
mod error;
mod live;
pub mod schema;

pub use database::Database;
pub use error::{StoreError, StoreResult};
pub use live::{LiveQuery, TableChange};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::config::Config;
use crate::task::{SortOrder, Task, TaskId, TaskQuery};
use live::QueryRegistry;

/// Capacity of the change bus. Receivers that fall further behind coalesce
/// the missed changes into one refresh.
const CHANGE_BUS_CAPACITY: usize = 64;

struct Inner {
    db: Database,
    changes: broadcast::Sender<TableChange>,
    registry: Arc<QueryRegistry>,
}

/// Durable list of tasks. Cheap to clone; clones share one connection.
#[derive(Clone)]
pub struct TaskStore {
    inner: Arc<Inner>,
}

impl TaskStore {
    /// Open the database described by `config`, seeding sample tasks on first
    /// creation when `config.seed_sample_tasks` is set.
    ///
    /// Seeding runs in the transaction that creates the schema, so a failed
    /// seed leaves no table behind and the next open tries again.
    pub fn open(config: &Config) -> StoreResult<Self> {
        let path = config.database_path();
        let db = if config.seed_sample_tasks {
            Database::open_with(&path, |conn| {
                let inserted = seed_sample_tasks(conn)?;
                info!(inserted, "seeded sample tasks into new database");
                Ok(())
            })?
        } else {
            Database::open(&path)?
        };
        Ok(Self::from_database(db))
    }

    /// Store backed by an in-memory database (for testing).
    pub fn in_memory() -> StoreResult<Self> {
        Ok(Self::from_database(Database::in_memory()?))
    }

    pub fn from_database(db: Database) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUS_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                db,
                changes,
                registry: Arc::new(QueryRegistry::default()),
            }),
        }
    }

    pub fn database(&self) -> &Database {
        &self.inner.db
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Open a live query. Nothing is read until the first `next()`.
    pub fn query(&self, query: TaskQuery) -> LiveQuery {
        debug!(
            search = %query.search_text,
            sort = %query.sort_order,
            hide_completed = query.hide_completed,
            "opening live query"
        );
        let registration = self.inner.registry.register(query.clone());
        LiveQuery::new(
            self.inner.db.clone(),
            query,
            self.inner.changes.subscribe(),
            registration,
        )
    }

    /// One-shot read of a query's current results.
    pub async fn list(&self, query: TaskQuery) -> StoreResult<Vec<Task>> {
        self.inner.db.run(move |conn| select_tasks(conn, &query)).await
    }

    /// Look up a single task.
    pub async fn get(&self, id: TaskId) -> StoreResult<Option<Task>> {
        self.inner
            .db
            .run(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT name, important, completed, created, id FROM task_table WHERE id = ?1",
                        [id.get()],
                        task_from_row,
                    )
                    .optional()?)
            })
            .await
    }

    /// Queries currently subscribed, oldest first.
    pub fn active_queries(&self) -> Vec<TaskQuery> {
        self.inner.registry.snapshot()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a task. An unassigned id gets a fresh one; any other id replaces
    /// the row holding it.
    pub async fn insert(&self, task: Task) -> StoreResult<TaskId> {
        self.write(move |conn| {
            let id = insert_task(conn, &task)?;
            debug!(%id, "task inserted");
            Ok((id, Some(TableChange::Inserted(id))))
        })
        .await
    }

    /// Replace the row with the task's id. Missing rows are left alone.
    pub async fn update(&self, task: Task) -> StoreResult<()> {
        self.write(move |conn| {
            let id = task.id;
            let affected = conn.execute(
                "UPDATE task_table SET name = ?1, important = ?2, completed = ?3, created = ?4 WHERE id = ?5",
                params![
                    task.name,
                    task.important,
                    task.completed,
                    task.created.timestamp_millis(),
                    id.get()
                ],
            )?;
            if affected == 0 {
                debug!(%id, "update matched no task");
                return Ok(((), None));
            }
            debug!(%id, "task updated");
            Ok(((), Some(TableChange::Updated(id))))
        })
        .await
    }

    /// Remove the row with the task's id.
    pub async fn delete(&self, task: &Task) -> StoreResult<()> {
        let id = task.id;
        self.write(move |conn| {
            let affected = conn.execute("DELETE FROM task_table WHERE id = ?1", [id.get()])?;
            if affected == 0 {
                return Ok(((), None));
            }
            debug!(%id, "task deleted");
            Ok(((), Some(TableChange::Deleted(affected))))
        })
        .await
    }

    /// Remove every completed task.
    pub async fn delete_completed_tasks(&self) -> StoreResult<()> {
        self.write(|conn| {
            let affected = conn.execute("DELETE FROM task_table WHERE completed = 1", [])?;
            info!(affected, "deleted completed tasks");
            let change = (affected > 0).then_some(TableChange::Deleted(affected));
            Ok(((), change))
        })
        .await
    }

    /// Run a mutation on the blocking pool and publish its change from the
    /// same closure, so a committed write is announced even if the caller
    /// stops waiting for it.
    async fn write<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<(T, Option<TableChange>)> + Send + 'static,
        T: Send + 'static,
    {
        let changes = self.inner.changes.clone();
        self.inner
            .db
            .run(move |conn| {
                let (value, change) = f(conn)?;
                if let Some(change) = change {
                    // No receivers simply means no live queries are open.
                    let _ = changes.send(change);
                }
                Ok(value)
            })
            .await
    }
}

impl std::fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStore")
            .field("db", &self.inner.db)
            .field("active_queries", &self.active_queries().len())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SQL helpers
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) fn select_tasks(conn: &Connection, query: &TaskQuery) -> StoreResult<Vec<Task>> {
    let sql = match query.sort_order {
        SortOrder::ByDate => schema::SELECT_BY_DATE,
        SortOrder::ByName => schema::SELECT_BY_NAME,
    };
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt
        .query_map(
            params![query.hide_completed, escape_like(&query.search_text)],
            task_from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn insert_task(conn: &Connection, task: &Task) -> StoreResult<TaskId> {
    let created = task.created.timestamp_millis();
    if task.id.is_unassigned() {
        conn.execute(
            "INSERT INTO task_table (name, important, completed, created) VALUES (?1, ?2, ?3, ?4)",
            params![task.name, task.important, task.completed, created],
        )?;
        Ok(TaskId(conn.last_insert_rowid()))
    } else {
        conn.execute(
            "INSERT OR REPLACE INTO task_table (name, important, completed, created, id) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![task.name, task.important, task.completed, created, task.id.get()],
        )?;
        Ok(task.id)
    }
}

fn seed_sample_tasks(conn: &Connection) -> StoreResult<usize> {
    for (name, important, completed) in schema::SAMPLE_TASKS {
        let task = Task::new(*name).important(*important).completed(*completed);
        insert_task(conn, &task)?;
    }
    Ok(schema::SAMPLE_TASKS.len())
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let created_ms: i64 = row.get(3)?;
    let created = DateTime::<Utc>::from_timestamp_millis(created_ms)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(3, created_ms))?;
    Ok(Task {
        name: row.get(0)?,
        important: row.get(1)?,
        completed: row.get(2)?,
        created,
        id: TaskId(row.get(4)?),
    })
}

/// Escape LIKE special characters so search text matches literally.
fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
