//! Live queries: store results re-delivered whenever the task table changes.
//!
//! The store publishes a [`TableChange`] on a broadcast bus after every
//! mutation that touched at least one row. Each [`LiveQuery`] listens on that
//! bus and re-runs its SQL when notified. Active queries are tracked in a
//! [`QueryRegistry`] so callers can see how many are open at any time.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use super::database::Database;
use super::error::StoreResult;
use super::select_tasks;
use crate::task::{Task, TaskId, TaskQuery};

/// A committed mutation of the task table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableChange {
    Inserted(TaskId),
    Updated(TaskId),
    Deleted(usize),
}

/// Registry of open live queries, keyed by registration order.
#[derive(Debug, Default)]
pub(crate) struct QueryRegistry {
    next_id: AtomicU64,
    active: Mutex<BTreeMap<u64, TaskQuery>>,
}

impl QueryRegistry {
    pub(crate) fn register(self: &Arc<Self>, query: TaskQuery) -> Registration {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.active.lock().insert(id, query);
        Registration {
            id,
            registry: Arc::clone(self),
        }
    }

    pub(crate) fn snapshot(&self) -> Vec<TaskQuery> {
        self.active.lock().values().cloned().collect()
    }
}

/// Removes its query from the registry when dropped.
#[derive(Debug)]
pub(crate) struct Registration {
    id: u64,
    registry: Arc<QueryRegistry>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.active.lock().remove(&self.id);
    }
}

/// A subscription to one [`TaskQuery`].
///
/// The first call to [`LiveQuery::next`] yields the current result set; each
/// later call waits for the next table change and yields a fresh one.
/// Dropping the value cancels the subscription.
pub struct LiveQuery {
    db: Database,
    query: TaskQuery,
    changes: broadcast::Receiver<TableChange>,
    dirty: bool,
    _registration: Registration,
}

impl LiveQuery {
    pub(crate) fn new(
        db: Database,
        query: TaskQuery,
        changes: broadcast::Receiver<TableChange>,
        registration: Registration,
    ) -> Self {
        Self {
            db,
            query,
            changes,
            dirty: true,
            _registration: registration,
        }
    }

    pub fn query(&self) -> &TaskQuery {
        &self.query
    }

    /// Next result set, or `None` once the store has been dropped.
    ///
    /// Cancel-safe: if the future is dropped mid-read, the pending refresh is
    /// kept and performed on the next call.
    pub async fn next(&mut self) -> Option<StoreResult<Vec<Task>>> {
        loop {
            if self.dirty {
                let query = self.query.clone();
                let result = self.db.run(move |conn| select_tasks(conn, &query)).await;
                self.dirty = false;
                return Some(result);
            }

            match self.changes.recv().await {
                Ok(change) => {
                    tracing::trace!(?change, search = %self.query.search_text, "live query invalidated");
                    self.dirty = true;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "live query lagged, refreshing once");
                    self.dirty = true;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl std::fmt::Debug for LiveQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveQuery")
            .field("query", &self.query)
            .field("dirty", &self.dirty)
            .finish()
    }
}
