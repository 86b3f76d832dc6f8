// Task/list store: in-memory state mirrored to key-value storage

use crate::config::StoreConfig;
use crate::kv::{self, KeyValueStorage};
use crate::migrate;
use crate::models::{ListEntry, NewTask, Snapshot, Task, TaskPatch};
use crate::queue::WriteQueue;
use crate::record::{self, Collection, Record};
use crate::snapshot;
use eyre::{Result, eyre};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lifecycle of a store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Constructed, storage not read yet; mutations are refused
    Unhydrated,
    Hydrated,
    /// Write queue stopped; mutations are refused
    Disposed,
}

/// Result of a store operation
///
/// Operations never fail outright: storage problems are logged and reported
/// here, and the in-memory state stays authoritative for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// State changed and the new snapshot reached storage
    Saved,
    /// State changed in memory, but the write failed
    Unsaved,
    /// No record with the given id
    NotFound,
    /// Invalid input; nothing changed
    Rejected,
    /// Store not hydrated yet, or already disposed
    NotReady,
}

impl Outcome {
    /// Whether the in-memory state changed
    pub fn is_applied(self) -> bool {
        matches!(self, Outcome::Saved | Outcome::Unsaved)
    }

    fn and(self, other: Outcome) -> Outcome {
        match (self, other) {
            (Outcome::Saved, Outcome::Saved) => Outcome::Saved,
            (Outcome::Saved | Outcome::Unsaved, Outcome::Saved | Outcome::Unsaved) => Outcome::Unsaved,
            (Outcome::Saved | Outcome::Unsaved, other) => other,
            (first, _) => first,
        }
    }
}

/// The authoritative collection of tasks and lists for this device
///
/// Construct once, call [`Store::init`] before use, and hand the store to
/// whatever needs it. Every mutation rewrites the whole affected collection
/// through a per-key write queue and waits for the write to land.
pub struct Store {
    storage: Arc<dyn KeyValueStorage>,
    queue: WriteQueue,
    config: StoreConfig,
    tasks: Vec<Task>,
    lists: Vec<ListEntry>,
    phase: Phase,
}

impl Store {
    /// Build an unhydrated store over `storage`
    pub fn new(storage: Arc<dyn KeyValueStorage>, config: StoreConfig) -> Self {
        Self {
            queue: WriteQueue::new(Arc::clone(&storage)),
            storage,
            config,
            tasks: Vec::new(),
            lists: Vec::new(),
            phase: Phase::Unhydrated,
        }
    }

    /// Open the configured backend, hydrate, and run the legacy import
    pub fn open(config: StoreConfig) -> Result<Self> {
        let storage = kv::open_backend(&config)?;
        let mut store = Self::new(storage, config);

        store.init();
        if store.config.import_legacy_on_init {
            store.import_legacy();
        }

        Ok(store)
    }

    /// Load both collections from storage
    ///
    /// The two keys are read in parallel. A missing, unreadable, or malformed
    /// value leaves that collection empty. Calling this again is a no-op.
    pub fn init(&mut self) {
        if self.phase != Phase::Unhydrated {
            debug!(phase = ?self.phase, "init: store already initialized");
            return;
        }

        let tasks_key = self.config.tasks_key.clone();
        let lists_key = self.config.lists_key.clone();
        let storage = &self.storage;

        let (tasks_raw, lists_raw) = thread::scope(|s| {
            let tasks = s.spawn(|| storage.get(&tasks_key));
            let lists = s.spawn(|| storage.get(&lists_key));
            (
                tasks
                    .join()
                    .unwrap_or_else(|_| Err(eyre!("Storage read thread panicked"))),
                lists
                    .join()
                    .unwrap_or_else(|_| Err(eyre!("Storage read thread panicked"))),
            )
        });

        self.tasks = hydrate(&tasks_key, tasks_raw);
        self.lists = hydrate(&lists_key, lists_raw);
        self.phase = Phase::Hydrated;

        info!(tasks = self.tasks.len(), lists = self.lists.len(), "Store hydrated");
    }

    /// Drain pending writes and stop accepting mutations
    pub fn dispose(&mut self) {
        if self.phase == Phase::Disposed {
            return;
        }
        self.queue.shutdown();
        self.phase = Phase::Disposed;
        info!("Store disposed");
    }

    // ========================================================================
    // Read access
    // ========================================================================

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_hydrated(&self) -> bool {
        self.phase == Phase::Hydrated
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn lists(&self) -> &[ListEntry] {
        &self.lists
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn list(&self, id: &str) -> Option<&ListEntry> {
        self.lists.iter().find(|l| l.id == id)
    }

    /// Case-insensitive name check for callers validating a new list name
    pub fn has_list_named(&self, name: &str) -> bool {
        self.has_list_named_except(name, None)
    }

    /// Like [`Store::has_list_named`], ignoring the list `exclude_id`
    ///
    /// Renaming a list to a different casing of its own name is not a clash.
    pub fn has_list_named_except(&self, name: &str, exclude_id: Option<&str>) -> bool {
        let wanted = name.to_lowercase();
        self.lists
            .iter()
            .filter(|l| exclude_id != Some(l.id.as_str()))
            .any(|l| l.name.to_lowercase() == wanted)
    }

    /// Current state as an exportable snapshot
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            lists: self.lists.clone(),
            tasks: self.tasks.clone(),
        }
    }

    // ========================================================================
    // Task operations
    // ========================================================================

    /// Append a task with `completed = false`
    pub fn add_task(&mut self, task: NewTask) -> Outcome {
        if !self.ready("add_task") {
            return Outcome::NotReady;
        }
        if let Err(e) = Self::validate_id(&task.id) {
            warn!(error = %e, "add_task: rejected");
            return Outcome::Rejected;
        }
        if self.task(&task.id).is_some() {
            warn!(id = %task.id, "add_task: duplicate task id, rejected");
            return Outcome::Rejected;
        }
        if !valid_indent(task.indent) {
            warn!(id = %task.id, indent = ?task.indent, "add_task: indent must be 0 or 1");
            return Outcome::Rejected;
        }

        debug!(id = %task.id, list = ?task.list_name, "add_task");
        self.tasks.push(task.into());
        self.persist(Collection::Tasks)
    }

    pub fn toggle_task(&mut self, id: &str) -> Outcome {
        self.modify_task("toggle_task", id, |t| t.completed = !t.completed)
    }

    /// Remove a task outright. See [`Store::trash_task`] for the soft delete.
    pub fn remove_task(&mut self, id: &str) -> Outcome {
        if !self.ready("remove_task") {
            return Outcome::NotReady;
        }

        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        if self.tasks.len() == before {
            debug!(id, "remove_task: no such task");
            return Outcome::NotFound;
        }

        self.persist(Collection::Tasks)
    }

    /// Move a task to the recently-deleted bin
    pub fn trash_task(&mut self, id: &str) -> Outcome {
        self.modify_task("trash_task", id, |t| t.recently_deleted = Some(true))
    }

    /// Take a task back out of the recently-deleted bin
    pub fn restore_task(&mut self, id: &str) -> Outcome {
        self.modify_task("restore_task", id, |t| t.recently_deleted = None)
    }

    /// Remove every task in the recently-deleted bin
    pub fn purge_deleted(&mut self) -> Outcome {
        if !self.ready("purge_deleted") {
            return Outcome::NotReady;
        }

        let before = self.tasks.len();
        self.tasks.retain(|t| !t.is_deleted());
        let purged = before - self.tasks.len();
        if purged == 0 {
            return Outcome::NotFound;
        }

        info!(purged, "Purged deleted tasks");
        self.persist(Collection::Tasks)
    }

    pub fn update_task_text(&mut self, id: &str, title: &str) -> Outcome {
        self.modify_task("update_task_text", id, |t| t.title = title.to_string())
    }

    /// Shallow-merge `patch` into the task
    pub fn update_task(&mut self, id: &str, patch: TaskPatch) -> Outcome {
        if !valid_indent(patch.indent) {
            warn!(id, indent = ?patch.indent, "update_task: indent must be 0 or 1");
            return Outcome::Rejected;
        }
        self.modify_task("update_task", id, |t| patch.apply(t))
    }

    pub fn flag_task(&mut self, id: &str, flagged: bool) -> Outcome {
        self.modify_task("flag_task", id, |t| t.flagged = Some(flagged))
    }

    pub fn indent_task(&mut self, id: &str, level: u8) -> Outcome {
        if !valid_indent(Some(level)) {
            warn!(id, level, "indent_task: indent must be 0 or 1");
            return Outcome::Rejected;
        }
        self.modify_task("indent_task", id, |t| t.indent = Some(level))
    }

    /// Replace the tasks of `list_name` with `new_order`
    ///
    /// Tasks of other lists keep their relative order and come first; the
    /// given sequence follows as-is. Nothing checks that it holds the same ids.
    pub fn reorder_tasks(&mut self, list_name: &str, new_order: Vec<Task>) -> Outcome {
        if !self.ready("reorder_tasks") {
            return Outcome::NotReady;
        }

        debug!(list = list_name, count = new_order.len(), "reorder_tasks");
        self.tasks.retain(|t| !t.belongs_to(list_name));
        self.tasks.extend(new_order);
        self.persist(Collection::Tasks)
    }

    // ========================================================================
    // List operations
    // ========================================================================

    /// Append a list with a fresh id; returns the id when the list was added
    ///
    /// Name uniqueness is the caller's job, see [`Store::has_list_named`].
    pub fn add_list(&mut self, name: &str) -> (Option<String>, Outcome) {
        self.add_list_with_color(name, None)
    }

    pub fn add_list_with_color(&mut self, name: &str, color: Option<String>) -> (Option<String>, Outcome) {
        if !self.ready("add_list") {
            return (None, Outcome::NotReady);
        }
        if name.trim().is_empty() {
            warn!("add_list: invalid name, rejected");
            return (None, Outcome::Rejected);
        }

        let id = self.fresh_list_id();
        debug!(id = %id, name, "add_list");
        self.lists.push(ListEntry {
            id: id.clone(),
            name: name.to_string(),
            color,
        });

        (Some(id), self.persist(Collection::Lists))
    }

    /// Remove a list. Its tasks are left in place.
    pub fn remove_list(&mut self, id: &str) -> Outcome {
        if !self.ready("remove_list") {
            return Outcome::NotReady;
        }

        let before = self.lists.len();
        self.lists.retain(|l| l.id != id);
        if self.lists.len() == before {
            debug!(id, "remove_list: no such list");
            return Outcome::NotFound;
        }

        self.persist(Collection::Lists)
    }

    pub fn rename_list(&mut self, id: &str, new_name: &str) -> Outcome {
        if new_name.trim().is_empty() {
            warn!(id, "rename_list: invalid name, rename failed");
            return Outcome::Rejected;
        }
        self.modify_list("rename_list", id, |l| l.name = new_name.to_string())
    }

    pub fn recolor_list(&mut self, id: &str, color: Option<String>) -> Outcome {
        self.modify_list("recolor_list", id, |l| l.color = color)
    }

    // ========================================================================
    // Migration and snapshots
    // ========================================================================

    /// Fold legacy `TASKS_<listName>` keys into the unified tasks key
    ///
    /// Legacy keys are deleted only after the merged tasks were saved, so a
    /// failed write leaves them for the next attempt.
    pub fn import_legacy(&mut self) -> Outcome {
        if !self.ready("import_legacy") {
            return Outcome::NotReady;
        }

        let import = match migrate::collect_legacy(self.storage.as_ref(), &self.config, &self.tasks) {
            Ok(import) => import,
            Err(e) => {
                warn!(error = ?e, "import_legacy: failed to scan storage");
                return Outcome::Unsaved;
            }
        };
        if import.is_empty() {
            return Outcome::NotFound;
        }

        info!(keys = import.keys.len(), tasks = import.tasks.len(), "Importing legacy tasks");
        self.tasks.extend(import.tasks);

        let outcome = self.persist(Collection::Tasks);
        if outcome == Outcome::Saved {
            migrate::remove_legacy_keys(self.storage.as_ref(), &import.keys);
        }
        outcome
    }

    /// Write both collections to a JSON file
    pub fn export_snapshot(&self, path: &Path) -> Result<()> {
        snapshot::write_snapshot(path, &self.snapshot())
    }

    /// Replace both collections with the content of a snapshot file
    ///
    /// Duplicate ids in the file keep their first occurrence.
    pub fn import_snapshot(&mut self, path: &Path) -> Result<Outcome> {
        if !self.ready("import_snapshot") {
            return Ok(Outcome::NotReady);
        }

        let snapshot = snapshot::read_snapshot(path)?;
        self.tasks = dedupe_by_id(snapshot.tasks);
        self.lists = dedupe_by_id(snapshot.lists);

        let tasks = self.persist(Collection::Tasks);
        let lists = self.persist(Collection::Lists);
        Ok(tasks.and(lists))
    }

    // ========================================================================
    // Helper methods
    // ========================================================================

    fn ready(&self, op: &str) -> bool {
        if self.phase == Phase::Hydrated {
            return true;
        }
        warn!(op, phase = ?self.phase, "Store not ready, ignoring");
        false
    }

    fn modify_task(&mut self, op: &str, id: &str, f: impl FnOnce(&mut Task)) -> Outcome {
        if !self.ready(op) {
            return Outcome::NotReady;
        }
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            debug!(op, id, "No such task");
            return Outcome::NotFound;
        };

        f(task);
        debug!(op, id, "Task updated");
        self.persist(Collection::Tasks)
    }

    fn modify_list(&mut self, op: &str, id: &str, f: impl FnOnce(&mut ListEntry)) -> Outcome {
        if !self.ready(op) {
            return Outcome::NotReady;
        }
        let Some(list) = self.lists.iter_mut().find(|l| l.id == id) else {
            debug!(op, id, "No such list");
            return Outcome::NotFound;
        };

        f(list);
        debug!(op, id, "List updated");
        self.persist(Collection::Lists)
    }

    /// Write the whole collection and wait for it to land
    fn persist(&mut self, collection: Collection) -> Outcome {
        let encoded = match collection {
            Collection::Tasks => record::encode(&self.tasks),
            Collection::Lists => record::encode(&self.lists),
        };
        let key = collection.key(&self.config).to_string();

        let result = encoded
            .map_err(eyre::Report::from)
            .and_then(|value| self.write_through(&key, value));

        match result {
            Ok(()) => {
                self.auto_export();
                Outcome::Saved
            }
            Err(e) => {
                warn!(%collection, key = %key, error = ?e, "Failed to persist, keeping in-memory state");
                Outcome::Unsaved
            }
        }
    }

    /// Mirror the saved state to the configured export file, if any
    ///
    /// A failed export is logged only; the write to storage already landed.
    fn auto_export(&self) {
        let Some(path) = self.config.auto_export_path() else {
            return;
        };
        if let Err(e) = snapshot::write_snapshot(&path, &self.snapshot()) {
            warn!(file = ?path, error = ?e, "Auto-export failed");
        }
    }

    fn write_through(&mut self, key: &str, value: String) -> Result<()> {
        if !self.config.verify_writes {
            return self.queue.write(key, value);
        }

        self.queue.write(key, value.clone())?;
        let stored = self.storage.get(key)?;
        if stored.as_deref() != Some(value.as_str()) {
            warn!(key, "Stored value does not match last write, rewriting");
            self.queue.write(key, value)?;
        }
        Ok(())
    }

    fn fresh_list_id(&self) -> String {
        loop {
            let id = uuid::Uuid::now_v7().to_string();
            if self.list(&id).is_none() {
                return id;
            }
        }
    }

    /// Validate a task id
    fn validate_id(id: &str) -> Result<()> {
        if id.trim().is_empty() {
            return Err(eyre!("Task ID cannot be empty or whitespace-only"));
        }

        if id.len() > 256 {
            return Err(eyre!("Task ID too long: {} chars (max 256)", id.len()));
        }

        Ok(())
    }
}

fn valid_indent(indent: Option<u8>) -> bool {
    indent.is_none_or(|level| level <= 1)
}

/// Turn a storage read into a collection, logging and discarding bad data
fn hydrate<T: Record>(key: &str, raw: Result<Option<String>>) -> Vec<T> {
    let raw = match raw {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!(key, error = ?e, "Failed to read {}, starting empty", T::collection());
            return Vec::new();
        }
    };

    match record::decode::<T>(&raw) {
        Ok(records) => dedupe_by_id(records),
        Err(e) => {
            warn!(key, error = ?e, "Failed to parse {} JSON, starting empty", T::collection());
            Vec::new()
        }
    }
}

fn dedupe_by_id<T: Record>(records: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::new();
    let before = records.len();
    let kept: Vec<T> = records.into_iter().filter(|r| seen.insert(r.id().to_string())).collect();
    if kept.len() != before {
        warn!(dropped = before - kept.len(), "Dropped records with duplicate ids");
    }
    kept
}

// Helper function for timestamps
pub fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(millis)
        .unwrap_or(0)
}

/// Whole milliseconds in `d`, saturating at `i64::MAX`
fn millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}
