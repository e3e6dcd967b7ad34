use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::info;

use super::error::{StoreError, StoreResult};
use super::schema;

/// Thread-safe SQLite connection wrapper.
/// Uses parking_lot::Mutex for synchronous access (rusqlite is not Sync).
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
    created: bool,
}

impl Database {
    /// Open or create a database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::open_with(path, |_| Ok(()))
    }

    /// Open or create a database, running `on_create` inside the transaction
    /// that creates the schema. If `on_create` fails nothing is committed.
    pub fn open_with<F>(path: &Path, on_create: F) -> StoreResult<Self>
    where
        F: FnOnce(&Connection) -> StoreResult<()>,
    {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut conn = Connection::open(path)?;
        conn.execute_batch(schema::PRAGMAS)?;
        let created = Self::create_tables(&mut conn, on_create)?;

        info!(path = %path.display(), created, "task database opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: path.to_owned(),
            created,
        })
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> StoreResult<Self> {
        let mut conn = Connection::open_in_memory()?;
        conn.execute_batch(schema::PRAGMAS)?;
        let created = Self::create_tables(&mut conn, |_| Ok(()))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: PathBuf::from(":memory:"),
            created,
        })
    }

    /// Returns true when the task table did not exist before.
    fn create_tables<F>(conn: &mut Connection, on_create: F) -> StoreResult<bool>
    where
        F: FnOnce(&Connection) -> StoreResult<()>,
    {
        let tx = conn.transaction()?;
        let existing: i64 = tx.query_row(schema::TASK_TABLE_EXISTS, [], |row| row.get(0))?;
        tx.execute_batch(schema::CREATE_TABLES)?;
        let created = existing == 0;
        if created {
            on_create(&tx)?;
        }
        tx.commit()?;
        Ok(created)
    }

    /// Whether this open created the schema (first launch).
    pub fn was_created(&self) -> bool {
        self.created
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Execute a closure with the database connection on the current thread.
    pub fn with_conn<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T>,
    {
        let mut conn = self.conn.lock();
        f(&mut conn)
    }

    /// Execute a closure with the connection on the blocking pool, suspending
    /// the caller instead of blocking its worker thread.
    pub async fn run<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock();
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Background(e.to_string()))?
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .field("created", &self.created)
            .finish()
    }
}
