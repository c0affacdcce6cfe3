//! Incremental change delivery for extractors: a filesystem watcher or an
//! mtime poller triggers a re-extraction, and only conversations that are
//! new or changed since the last pass are sent on.

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Conversation, ToolTag};

/// Quiet period after a filesystem event before re-extracting, so a burst
/// of writes to one file costs one pass.
pub const DEBOUNCE: Duration = Duration::from_millis(300);

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Running watch. Dropping it stops the background task and the watcher.
pub struct WatchHandle {
    tool: ToolTag,
    task: JoinHandle<()>,
    _watcher: Option<RecommendedWatcher>,
}

impl WatchHandle {
    fn new(tool: ToolTag, task: JoinHandle<()>, watcher: Option<RecommendedWatcher>) -> Self {
        Self {
            tool,
            task,
            _watcher: watcher,
        }
    }

    pub fn tool(&self) -> ToolTag {
        self.tool
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the watch now instead of at drop.
    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.task.abort();
        tracing::debug!(tool = %self.tool, "Watch stopped");
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("tool", &self.tool)
            .field("finished", &self.task.is_finished())
            .finish()
    }
}

/// Remembers what was last emitted per conversation id.
#[derive(Debug, Default)]
pub struct ChangeTracker {
    fingerprints: HashMap<Uuid, String>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&mut self, conversations: &[Conversation]) {
        for conversation in conversations {
            self.fingerprints
                .insert(conversation.id, fingerprint(conversation));
        }
    }

    /// Conversations that are new or differ from the last recorded version.
    pub fn changed(&mut self, conversations: Vec<Conversation>) -> Vec<Conversation> {
        conversations
            .into_iter()
            .filter(|conversation| {
                let current = fingerprint(conversation);
                match self.fingerprints.get(&conversation.id) {
                    Some(previous) if *previous == current => false,
                    _ => {
                        self.fingerprints.insert(conversation.id, current);
                        true
                    }
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }
}

/// Source hash only covers the opening messages, so appended turns are
/// tracked through the count and the last message id.
fn fingerprint(conversation: &Conversation) -> String {
    format!(
        "{}:{}:{}:{}",
        conversation.source_hash,
        conversation.messages.len(),
        conversation
            .messages
            .last()
            .map(|m| m.id.to_string())
            .unwrap_or_default(),
        conversation.title
    )
}

fn emit_changes(
    tool: ToolTag,
    tracker: &mut ChangeTracker,
    conversations: Vec<Conversation>,
    sender: &UnboundedSender<Conversation>,
) -> bool {
    let changed = tracker.changed(conversations);
    if !changed.is_empty() {
        tracing::info!(tool = %tool, count = changed.len(), "Conversations changed");
    }
    for conversation in changed {
        if sender.send(conversation).is_err() {
            tracing::debug!(tool = %tool, "Receiver dropped, ending watch");
            return false;
        }
    }
    true
}

fn is_content_change(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Any
    )
}

/// Watch `roots` recursively. Events for paths accepted by `relevant` cause
/// `extract` to run again; its changed output goes to `sender`.
pub fn spawn_fs_watch<E, Fut>(
    tool: ToolTag,
    roots: Vec<PathBuf>,
    relevant: fn(&Path) -> bool,
    extract: E,
    sender: UnboundedSender<Conversation>,
) -> Result<WatchHandle>
where
    E: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Vec<Conversation>> + Send + 'static,
{
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher: RecommendedWatcher = Watcher::new(
        move |res: std::result::Result<Event, notify::Error>| match res {
            Ok(event) => {
                let _ = event_tx.send(event);
            }
            Err(e) => tracing::warn!(error = %e, "Filesystem watch error"),
        },
        notify::Config::default(),
    )?;

    let mut watched = 0;
    for root in &roots {
        if !root.exists() {
            tracing::warn!(tool = %tool, path = %root.display(), "Watch root does not exist, skipping");
            continue;
        }
        watcher.watch(root, RecursiveMode::Recursive)?;
        watched += 1;
    }
    tracing::info!(tool = %tool, roots = watched, "Watching for changes");

    let task = tokio::spawn(async move {
        let mut tracker = ChangeTracker::new();
        tracker.seed(&extract().await);

        while let Some(event) = event_rx.recv().await {
            if !is_content_change(&event) || !event.paths.iter().any(|p| relevant(p)) {
                continue;
            }

            tokio::time::sleep(DEBOUNCE).await;
            while event_rx.try_recv().is_ok() {}

            tracing::debug!(tool = %tool, paths = ?event.paths, "Source changed, re-extracting");
            if !emit_changes(tool, &mut tracker, extract().await, &sender) {
                break;
            }
        }
    });

    Ok(WatchHandle::new(tool, task, Some(watcher)))
}

fn mtime_snapshot(paths: &[PathBuf]) -> HashMap<PathBuf, SystemTime> {
    paths
        .iter()
        .filter_map(|path| {
            let modified = std::fs::metadata(path).ok()?.modified().ok()?;
            Some((path.clone(), modified))
        })
        .collect()
}

/// Poll the modification times of the files `list` returns every
/// `interval`; any difference (including added or removed files) triggers
/// `extract`.
pub fn spawn_mtime_poll<L, E, Fut>(
    tool: ToolTag,
    interval: Duration,
    list: L,
    extract: E,
    sender: UnboundedSender<Conversation>,
) -> WatchHandle
where
    L: Fn() -> Vec<PathBuf> + Send + Sync + 'static,
    E: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Vec<Conversation>> + Send + 'static,
{
    let list = Arc::new(list);

    let task = tokio::spawn(async move {
        let snapshot = |list: Arc<L>| async move {
            tokio::task::spawn_blocking(move || mtime_snapshot(&(*list)()))
                .await
                .unwrap_or_default()
        };

        let mut tracker = ChangeTracker::new();
        let mut last = snapshot(Arc::clone(&list)).await;
        tracker.seed(&extract().await);
        tracing::info!(tool = %tool, files = last.len(), interval_secs = interval.as_secs(), "Polling for changes");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let current = snapshot(Arc::clone(&list)).await;
            if current == last {
                continue;
            }
            last = current;

            tracing::debug!(tool = %tool, "Database modified, re-extracting");
            if !emit_changes(tool, &mut tracker, extract().await, &sender) {
                break;
            }
        }
    });

    WatchHandle::new(tool, task, None)
}
