//! Filter preference storage.
//!
//! Persists the list settings to a small JSON blob at
//! `{data_dir}/{preferences_name}.json` with two keys:
//! - `sort_order` - `"BY_NAME"` or `"BY_DATE"`
//! - `hide_completed` - boolean
//!
//! Missing keys fall back to `{BY_DATE, true}`. Reads that fail at the I/O
//! level (including a blob that is not valid JSON) also fall back to the
//! defaults; a blob that parses but holds an invalid value is an error.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::{watch, Mutex};

use crate::config::Config;
use crate::task::{FilterPreferences, SortOrder};

const SORT_ORDER_KEY: &str = "sort_order";
const HIDE_COMPLETED_KEY: &str = "hide_completed";

#[derive(Debug, Error)]
pub enum PreferencesError {
    #[error("failed to access preferences: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid value for preference `{key}`: {detail}")]
    InvalidValue { key: &'static str, detail: String },
}

pub type PreferencesResult<T> = Result<T, PreferencesError>;

/// What the last read of the blob produced.
#[derive(Debug, Clone)]
enum RawPreferences {
    Loaded(Map<String, Value>),
    ReadFailed,
}

impl RawPreferences {
    fn decode(&self) -> PreferencesResult<FilterPreferences> {
        match self {
            Self::Loaded(map) => decode(map),
            Self::ReadFailed => Ok(FilterPreferences::default()),
        }
    }
}

/// Durable store for [`FilterPreferences`].
#[derive(Debug)]
pub struct PreferencesStore {
    storage_path: PathBuf,
    state: watch::Sender<RawPreferences>,
    write_lock: Mutex<()>,
}

impl PreferencesStore {
    /// Open the preferences blob described by `config`.
    pub async fn open(config: &Config) -> Self {
        Self::open_at(config.preferences_path()).await
    }

    /// Open the preferences blob at an explicit path.
    pub async fn open_at(storage_path: PathBuf) -> Self {
        let raw = read_raw(&storage_path).await;
        if let RawPreferences::Loaded(_) = raw {
            tracing::info!("Loaded preferences from {}", storage_path.display());
        }

        let (state, _) = watch::channel(raw);
        Self {
            storage_path,
            state,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.storage_path
    }

    /// Subscribe to preference values.
    pub fn observe(&self) -> PreferencesStream {
        PreferencesStream {
            rx: self.state.subscribe(),
            last: None,
            started: false,
            failed: false,
        }
    }

    /// The value an observer would receive right now.
    pub fn current(&self) -> PreferencesResult<FilterPreferences> {
        self.state.borrow().decode()
    }

    pub async fn update_sort_order(&self, sort_order: SortOrder) -> PreferencesResult<()> {
        self.edit(SORT_ORDER_KEY, Value::String(sort_order.as_str().to_string()))
            .await
    }

    pub async fn update_hide_completed(&self, hide_completed: bool) -> PreferencesResult<()> {
        self.edit(HIDE_COMPLETED_KEY, Value::Bool(hide_completed)).await
    }

    /// Re-read the blob from disk and publish it.
    pub async fn reload(&self) {
        let _guard = self.write_lock.lock().await;
        let raw = read_raw(&self.storage_path).await;
        self.state.send_replace(raw);
        tracing::info!("Reloaded preferences from {}", self.storage_path.display());
    }

    /// Merge one key into the blob on disk. Returns once the write is durable.
    async fn edit(&self, key: &'static str, value: Value) -> PreferencesResult<()> {
        let _guard = self.write_lock.lock().await;

        let mut map = load_map(&self.storage_path).await?;
        map.insert(key.to_string(), value);
        write_durably(&self.storage_path, &map).await?;

        tracing::debug!("Saved preference {} to {}", key, self.storage_path.display());
        self.state.send_replace(RawPreferences::Loaded(map));
        Ok(())
    }
}

/// Shared preferences store wrapped in Arc for concurrent access.
pub type SharedPreferencesStore = Arc<PreferencesStore>;

/// Live sequence of [`FilterPreferences`].
///
/// Yields the current value first, then a new value whenever either field
/// changes. A non-I/O failure is yielded once and ends the stream.
#[derive(Debug)]
pub struct PreferencesStream {
    rx: watch::Receiver<RawPreferences>,
    last: Option<FilterPreferences>,
    started: bool,
    failed: bool,
}

impl PreferencesStream {
    /// Next distinct value, or `None` when the store is gone or the stream
    /// has failed.
    pub async fn next(&mut self) -> Option<PreferencesResult<FilterPreferences>> {
        if self.failed {
            return None;
        }

        loop {
            if self.started {
                if self.rx.changed().await.is_err() {
                    return None;
                }
            } else {
                self.started = true;
            }

            let decoded = self.rx.borrow_and_update().decode();
            match decoded {
                Ok(prefs) if self.last == Some(prefs) => continue,
                Ok(prefs) => {
                    self.last = Some(prefs);
                    return Some(Ok(prefs));
                }
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

fn decode(map: &Map<String, Value>) -> PreferencesResult<FilterPreferences> {
    let defaults = FilterPreferences::default();

    let sort_order = match map.get(SORT_ORDER_KEY) {
        None | Some(Value::Null) => defaults.sort_order,
        Some(Value::String(s)) => s.parse().map_err(|e: crate::task::ParseSortOrderError| {
            PreferencesError::InvalidValue {
                key: SORT_ORDER_KEY,
                detail: e.to_string(),
            }
        })?,
        Some(other) => {
            return Err(PreferencesError::InvalidValue {
                key: SORT_ORDER_KEY,
                detail: format!("expected string, found {}", other),
            })
        }
    };

    let hide_completed = match map.get(HIDE_COMPLETED_KEY) {
        None | Some(Value::Null) => defaults.hide_completed,
        Some(Value::Bool(b)) => *b,
        Some(other) => {
            return Err(PreferencesError::InvalidValue {
                key: HIDE_COMPLETED_KEY,
                detail: format!("expected boolean, found {}", other),
            })
        }
    };

    Ok(FilterPreferences {
        sort_order,
        hide_completed,
    })
}

/// Read the blob, logging a failed read once here rather than on every decode.
async fn read_raw(path: &Path) -> RawPreferences {
    match load_map(path).await {
        Ok(map) => RawPreferences::Loaded(map),
        Err(e) => {
            tracing::error!(
                "Error reading preferences from {}: {}, using defaults",
                path.display(),
                e
            );
            RawPreferences::ReadFailed
        }
    }
}

/// Load the blob. A missing file is an empty blob; unparseable content is
/// reported as `InvalidData`.
async fn load_map(path: &Path) -> Result<Map<String, Value>, std::io::Error> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
        Err(e) => return Err(e),
    };

    if contents.trim().is_empty() {
        return Ok(Map::new());
    }

    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

/// Write to a sibling temp file, fsync, rename over the blob, then fsync the
/// directory so the rename itself is durable. The temp file is removed if any
/// step fails.
async fn write_durably(path: &Path, map: &Map<String, Value>) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let contents = serde_json::to_vec_pretty(map)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    let tmp_path = path.with_extension("json.tmp");
    let written = async {
        use tokio::io::AsyncWriteExt;
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(&contents).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp_path, path).await
    }
    .await;

    if let Err(e) = written {
        if let Err(cleanup) = tokio::fs::remove_file(&tmp_path).await {
            if cleanup.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    "Failed to remove {}: {}",
                    tmp_path.display(),
                    cleanup
                );
            }
        }
        return Err(e);
    }

    sync_parent_dir(path).await
}

#[cfg(unix)]
async fn sync_parent_dir(path: &Path) -> Result<(), std::io::Error> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            tokio::fs::File::open(parent).await?.sync_all().await
        }
        _ => Ok(()),
    }
}

#[cfg(not(unix))]
async fn sync_parent_dir(_path: &Path) -> Result<(), std::io::Error> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn store_in(dir: &tempfile::TempDir) -> PreferencesStore {
        PreferencesStore::open(&Config::new(dir.path())).await
    }

    #[tokio::test]
    async fn test_defaults_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;

        let mut stream = store.observe();
        let prefs = stream.next().await.unwrap().unwrap();
        assert_eq!(prefs, FilterPreferences::default());
        assert_eq!(store.current().unwrap(), FilterPreferences::default());
    }

    #[tokio::test]
    async fn test_update_sort_order_keeps_hide_completed() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;

        store.update_hide_completed(false).await.unwrap();
        store.update_sort_order(SortOrder::ByName).await.unwrap();

        let mut stream = store.observe();
        let prefs = stream.next().await.unwrap().unwrap();
        assert_eq!(prefs.sort_order, SortOrder::ByName);
        assert!(!prefs.hide_completed);

        let on_disk: Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(on_disk["sort_order"], "BY_NAME");
        assert_eq!(on_disk["hide_completed"], false);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = store_in(&dir).await;
            store.update_sort_order(SortOrder::ByName).await.unwrap();
        }
        let reopened = store_in(&dir).await;
        let prefs = reopened.current().unwrap();
        assert_eq!(prefs.sort_order, SortOrder::ByName);
        assert!(prefs.hide_completed);
    }

    #[tokio::test]
    async fn test_write_preserves_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = Config::new(dir.path()).preferences_path();
        std::fs::write(&path, r#"{"theme": "dark"}"#).unwrap();

        let store = PreferencesStore::open_at(path.clone()).await;
        store.update_hide_completed(false).await.unwrap();

        let on_disk: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk["theme"], "dark");
        assert_eq!(on_disk["hide_completed"], false);
    }

    #[tokio::test]
    async fn test_stream_emits_only_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;
        let mut stream = store.observe();

        assert_eq!(stream.next().await.unwrap().unwrap(), FilterPreferences::default());

        // Same value as the default: nothing new to report.
        store.update_sort_order(SortOrder::ByDate).await.unwrap();
        store.update_hide_completed(false).await.unwrap();

        let prefs = stream.next().await.unwrap().unwrap();
        assert_eq!(prefs.sort_order, SortOrder::ByDate);
        assert!(!prefs.hide_completed);

        let pending = tokio::time::timeout(Duration::from_millis(50), stream.next()).await;
        assert!(pending.is_err(), "no further change was made");
    }

    #[tokio::test]
    async fn test_io_failure_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the blob should be makes every read fail.
        let path = dir.path().join("user_preferences.json");
        std::fs::create_dir_all(&path).unwrap();

        let store = PreferencesStore::open_at(path).await;
        let mut stream = store.observe();
        assert_eq!(stream.next().await.unwrap().unwrap(), FilterPreferences::default());

        // Writes cannot succeed either, and say so.
        assert!(matches!(
            store.update_sort_order(SortOrder::ByName).await,
            Err(PreferencesError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_corrupt_blob_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = PreferencesStore::open_at(path).await;
        assert_eq!(store.current().unwrap(), FilterPreferences::default());
    }

    #[tokio::test]
    async fn test_invalid_value_is_propagated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, r#"{"sort_order": "BY_COLOR"}"#).unwrap();

        let store = PreferencesStore::open_at(path.clone()).await;
        let mut stream = store.observe();
        assert!(matches!(
            stream.next().await,
            Some(Err(PreferencesError::InvalidValue { key: "sort_order", .. }))
        ));
        assert!(stream.next().await.is_none());

        std::fs::write(&path, r#"{"hide_completed": "yes"}"#).unwrap();
        store.reload().await;
        assert!(matches!(
            store.current(),
            Err(PreferencesError::InvalidValue { key: "hide_completed", .. })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_updates_do_not_clobber() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(store_in(&dir).await);

        let a = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.update_sort_order(SortOrder::ByName).await })
        };
        let b = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.update_hide_completed(false).await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let reopened = store_in(&dir).await;
        assert_eq!(
            reopened.current().unwrap(),
            FilterPreferences {
                sort_order: SortOrder::ByName,
                hide_completed: false,
            }
        );
    }

    #[tokio::test]
    async fn test_failed_write_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // A non-empty directory at the blob path makes the final rename fail.
        let path = dir.path().join("prefs.json");
        std::fs::create_dir_all(path.join("occupied")).unwrap();

        let mut map = Map::new();
        map.insert(HIDE_COMPLETED_KEY.to_string(), Value::Bool(false));
        assert!(write_durably(&path, &map).await.is_err());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_successful_write_leaves_only_blob() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let mut map = Map::new();
        map.insert(SORT_ORDER_KEY.to_string(), Value::String("BY_NAME".into()));
        write_durably(&path, &map).await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("prefs.json")]);
    }

    #[tokio::test]
    async fn test_read_failure_logged_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use tracing_subscriber::layer::{Context, SubscriberExt};
        use tracing_subscriber::Layer;

        struct ErrorCounter(Arc<AtomicUsize>);

        impl<S: tracing::Subscriber> Layer<S> for ErrorCounter {
            fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
                if *event.metadata().level() == tracing::Level::ERROR {
                    self.0.fetch_add(1, Ordering::SeqCst);
                }
            }
        }

        let errors = Arc::new(AtomicUsize::new(0));
        let _guard = tracing::subscriber::set_default(
            tracing_subscriber::registry().with(ErrorCounter(Arc::clone(&errors))),
        );

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user_preferences.json");
        std::fs::create_dir_all(&path).unwrap();

        let store = PreferencesStore::open_at(path).await;
        for _ in 0..3 {
            assert_eq!(store.current().unwrap(), FilterPreferences::default());
        }
        let mut stream = store.observe();
        assert_eq!(stream.next().await.unwrap().unwrap(), FilterPreferences::default());

        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }
}
