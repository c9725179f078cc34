//! File watcher for configuration resources.
//!
//! Watches the `conftree/` directory of every resource root and marks the
//! resource providers dirty when a supported file changes, so the next read
//! of the configuration re-resolves it. Each change is also published on a
//! tokio watch channel. Uses debouncing to coalesce rapid file changes.
//!
//! The event loop runs on a blocking thread and polls a stop flag between
//! events, so dropping or stopping the handle ends it even when the
//! filesystem stays quiet.

use crate::format::Format;
use crate::provider::RESOURCE_DIR;
use notify_debouncer_mini::{DebouncedEventKind, new_debouncer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// How often the event loop checks whether it should stop.
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Event emitted when resources change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceChangeEvent {
    /// Resource files changed (one or more, coalesced).
    Changed(Vec<PathBuf>),
    /// Watcher encountered an error
    Error(String),
}

impl ResourceChangeEvent {
    /// Returns true if this event requires a config reload.
    pub fn requires_reload(&self) -> bool {
        !matches!(self, ResourceChangeEvent::Error(_))
    }

    pub fn affected_paths(&self) -> &[PathBuf] {
        match self {
            ResourceChangeEvent::Changed(paths) => paths,
            ResourceChangeEvent::Error(_) => &[],
        }
    }
}

/// Configuration for the file watcher.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Debounce duration for coalescing rapid changes.
    pub debounce_duration: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_duration: Duration::from_millis(500),
        }
    }
}

/// Handle to control the resource watcher. Dropping it stops watching.
pub struct ResourceWatcherHandle {
    /// Receiver for change events.
    pub events: watch::Receiver<Option<ResourceChangeEvent>>,
    stop: Arc<AtomicBool>,
    task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl ResourceWatcherHandle {
    /// Stop watching and wait for the event loop to finish.
    pub async fn stop(mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(task) = self.task_handle.take()
            && let Err(e) = task.await
        {
            warn!("Resource watcher task failed: {}", e);
        }
    }

    /// Whether the event loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task_handle.as_ref().is_none_or(|task| task.is_finished())
    }

    /// Wait for the next change event.
    pub async fn wait_for_change(&mut self) -> Option<ResourceChangeEvent> {
        // Skip the initial None value
        loop {
            if self.events.changed().await.is_err() {
                return None;
            }
            let event = self.events.borrow().clone();
            if event.is_some() {
                return event;
            }
        }
    }

    /// Get the latest event without waiting.
    pub fn latest_event(&self) -> Option<ResourceChangeEvent> {
        self.events.borrow().clone()
    }
}

impl Drop for ResourceWatcherHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }
}

/// Start watching the resource directories of `roots`.
///
/// `dirty_flags` are set on every relevant change. Must be called from
/// within a tokio runtime.
pub fn start_resource_watcher(
    roots: &[PathBuf],
    dirty_flags: Vec<Arc<AtomicBool>>,
    config: WatcherConfig,
) -> Result<ResourceWatcherHandle, notify::Error> {
    let (event_tx, event_rx) = watch::channel(None);
    let (notify_tx, notify_rx) = mpsc::channel();

    let mut debouncer = new_debouncer(config.debounce_duration, notify_tx)?;
    let watcher = debouncer.watcher();

    let mut watched = Vec::new();
    for root in roots {
        let dir = root.join(RESOURCE_DIR);
        if dir.is_dir() {
            info!("Watching resource directory: {}", dir.display());
            watcher.watch(&dir, notify::RecursiveMode::Recursive)?;
            watched.push(dir);
        } else {
            warn!(
                "Resource directory does not exist, skipping watch: {}",
                dir.display()
            );
        }
    }

    let stop = Arc::new(AtomicBool::new(false));
    let task_stop = Arc::clone(&stop);
    let task_handle = tokio::task::spawn_blocking(move || {
        // Keep the debouncer alive
        let _debouncer = debouncer;
        process_notify_events(notify_rx, event_tx, &watched, &dirty_flags, &task_stop);
    });

    Ok(ResourceWatcherHandle {
        events: event_rx,
        stop,
        task_handle: Some(task_handle),
    })
}

fn process_notify_events(
    rx: mpsc::Receiver<Result<Vec<notify_debouncer_mini::DebouncedEvent>, notify::Error>>,
    tx: watch::Sender<Option<ResourceChangeEvent>>,
    watched: &[PathBuf],
    dirty_flags: &[Arc<AtomicBool>],
    stop: &AtomicBool,
) {
    loop {
        if stop.load(Ordering::Acquire) || tx.is_closed() {
            info!("Resource watcher stopped");
            return;
        }
        match rx.recv_timeout(STOP_POLL_INTERVAL) {
            Ok(Ok(events)) => {
                let Some(event) = classify_events(events, watched) else {
                    continue;
                };
                for flag in dirty_flags {
                    flag.store(true, Ordering::Release);
                }
                debug!("Resource change detected: {:?}", event);
                if tx.send(Some(event)).is_err() {
                    info!("Resource watcher receiver dropped, stopping");
                    return;
                }
            }
            Ok(Err(e)) => {
                error!("File watcher error: {}", e);
                let _ = tx.send(Some(ResourceChangeEvent::Error(e.to_string())));
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                info!("Resource watcher channel closed, stopping");
                return;
            }
        }
    }
}

/// Coalesce debounced events into a single change, if any is relevant.
fn classify_events(
    events: Vec<notify_debouncer_mini::DebouncedEvent>,
    watched: &[PathBuf],
) -> Option<ResourceChangeEvent> {
    let mut changed: Vec<PathBuf> = events
        .into_iter()
        .filter(|event| {
            matches!(
                event.kind,
                DebouncedEventKind::Any | DebouncedEventKind::AnyContinuous
            )
        })
        .map(|event| event.path)
        .filter(|path| is_resource(path, watched))
        .collect();
    changed.sort();
    changed.dedup();
    (!changed.is_empty()).then_some(ResourceChangeEvent::Changed(changed))
}

fn is_resource(path: &Path, watched: &[PathBuf]) -> bool {
    Format::from_path(path).is_some() && watched.iter().any(|dir| path.starts_with(dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify_debouncer_mini::DebouncedEvent;
    use tempfile::TempDir;

    fn event(path: &str) -> DebouncedEvent {
        DebouncedEvent {
            path: PathBuf::from(path),
            kind: DebouncedEventKind::Any,
        }
    }

    #[test]
    fn test_classify_resource_files() {
        let watched = vec![PathBuf::from("root/conftree")];
        let result = classify_events(
            vec![
                event("root/conftree/app.yaml"),
                event("root/conftree/app.yaml"),
                event("root/conftree/nested/db.override.json"),
            ],
            &watched,
        );
        assert_eq!(
            result,
            Some(ResourceChangeEvent::Changed(vec![
                PathBuf::from("root/conftree/app.yaml"),
                PathBuf::from("root/conftree/nested/db.override.json"),
            ]))
        );
    }

    #[test]
    fn test_classify_ignores_other_files() {
        let watched = vec![PathBuf::from("root/conftree")];
        let result = classify_events(
            vec![event("root/conftree/notes.txt"), event("src/app.yaml")],
            &watched,
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_event_requires_reload() {
        assert!(ResourceChangeEvent::Changed(vec![]).requires_reload());
        assert!(!ResourceChangeEvent::Error("test".to_string()).requires_reload());
    }

    fn watched_root() -> TempDir {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join(RESOURCE_DIR)).unwrap();
        temp
    }

    #[tokio::test]
    async fn test_dropping_handle_ends_event_loop() {
        let temp = watched_root();
        let mut handle = start_resource_watcher(
            &[temp.path().to_path_buf()],
            Vec::new(),
            WatcherConfig::default(),
        )
        .unwrap();
        let task = handle.task_handle.take().unwrap();
        drop(handle);

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("Watcher kept running after its handle was dropped")
            .unwrap();
    }

    #[tokio::test]
    async fn test_stop_waits_for_event_loop() {
        let temp = watched_root();
        let handle = start_resource_watcher(
            &[temp.path().to_path_buf()],
            Vec::new(),
            WatcherConfig::default(),
        )
        .unwrap();
        assert!(!handle.is_finished());

        tokio::time::timeout(Duration::from_secs(5), handle.stop())
            .await
            .expect("Watcher did not stop");
    }
}
