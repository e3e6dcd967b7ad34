//! Query pipeline - keeps the visible task list in step with the search text
//! and the filter preferences.
//!
//! ```text
//!   search text (watch) ──┐
//!                         ├─► TaskQuery ─► TaskStore::query ─► TaskListStream
//!   preferences (stream) ─┘        (restart on change, one live query at a time)
//! ```
//!
//! Every change of the combined parameter tuple drops the current live query
//! before the next one is opened, so results of a superseded query can never
//! reach the consumer after results of the query that replaced it.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::preferences::{PreferencesError, PreferencesStream, SharedPreferencesStore};
use crate::store::{LiveQuery, StoreError, TaskStore};
use crate::task::{FilterPreferences, Task, TaskQuery};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Preferences(#[from] PreferencesError),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// One result set together with the parameters that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskListSnapshot {
    pub query: TaskQuery,
    pub tasks: Vec<Task>,
}

/// Combines search text and preferences into live store queries.
#[derive(Debug)]
pub struct QueryPipeline {
    store: TaskStore,
    preferences: SharedPreferencesStore,
    search: watch::Sender<String>,
}

impl QueryPipeline {
    pub fn new(store: TaskStore, preferences: SharedPreferencesStore) -> Self {
        let (search, _) = watch::channel(String::new());
        Self {
            store,
            preferences,
            search,
        }
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn preferences(&self) -> &SharedPreferencesStore {
        &self.preferences
    }

    /// Replace the search text. Setting the same text again is not a change.
    pub fn set_search_text(&self, text: impl Into<String>) {
        let text = text.into();
        self.search.send_if_modified(|current| {
            if *current == text {
                false
            } else {
                *current = text;
                true
            }
        });
    }

    pub fn search_text(&self) -> String {
        self.search.borrow().clone()
    }

    /// Start a live task list. Each call gets its own driver and its own live
    /// query; dropping the returned stream cancels both.
    pub fn tasks(&self) -> TaskListStream {
        let (tx, rx) = mpsc::channel(1);
        let handle = tokio::spawn(drive(
            self.store.clone(),
            self.search.subscribe(),
            self.preferences.observe(),
            tx,
        ));
        TaskListStream { rx, handle }
    }
}

/// Results of the most recent query, in request order.
#[derive(Debug)]
pub struct TaskListStream {
    rx: mpsc::Receiver<PipelineResult<TaskListSnapshot>>,
    handle: JoinHandle<()>,
}

impl TaskListStream {
    /// Next snapshot. `None` after an error has been delivered or once the
    /// store is gone.
    pub async fn next(&mut self) -> Option<PipelineResult<TaskListSnapshot>> {
        self.rx.recv().await
    }
}

impl Drop for TaskListStream {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Drop the running live query, then open the next one.
fn restart(store: &TaskStore, current: LiveQuery, next: TaskQuery) -> LiveQuery {
    drop(current);
    store.query(next)
}

async fn drive(
    store: TaskStore,
    mut search: watch::Receiver<String>,
    mut preferences: PreferencesStream,
    out: mpsc::Sender<PipelineResult<TaskListSnapshot>>,
) {
    let mut prefs: FilterPreferences = match preferences.next().await {
        Some(Ok(prefs)) => prefs,
        Some(Err(e)) => {
            let _ = out.send(Err(e.into())).await;
            return;
        }
        None => return,
    };

    let mut query = TaskQuery::from_preferences(search.borrow_and_update().clone(), prefs);
    let mut live = store.query(query.clone());
    let mut search_open = true;
    let mut prefs_open = true;

    loop {
        // Inputs are polled before results so a pending change always wins
        // over forwarding the outgoing query's next result.
        let next_query = tokio::select! {
            biased;

            _ = out.closed() => {
                debug!("task list consumer dropped, stopping pipeline");
                return;
            }

            changed = search.changed(), if search_open => {
                if changed.is_err() {
                    search_open = false;
                    continue;
                }
                TaskQuery::from_preferences(search.borrow_and_update().clone(), prefs)
            }

            next = preferences.next(), if prefs_open => match next {
                Some(Ok(updated)) => {
                    prefs = updated;
                    TaskQuery::from_preferences(query.search_text.clone(), prefs)
                }
                Some(Err(e)) => {
                    let _ = out.send(Err(e.into())).await;
                    return;
                }
                None => {
                    prefs_open = false;
                    continue;
                }
            },

            result = live.next() => match result {
                Some(Ok(tasks)) => {
                    let snapshot = TaskListSnapshot {
                        query: query.clone(),
                        tasks,
                    };
                    if out.send(Ok(snapshot)).await.is_err() {
                        return;
                    }
                    continue;
                }
                Some(Err(e)) => {
                    let _ = out.send(Err(e.into())).await;
                    return;
                }
                None => return,
            },
        };

        if next_query != query {
            debug!(
                search = %next_query.search_text,
                sort = %next_query.sort_order,
                hide_completed = next_query.hide_completed,
                "query parameters changed, restarting live query"
            );
            query = next_query;
            live = restart(&store, live, query.clone());
        }
    }
}
