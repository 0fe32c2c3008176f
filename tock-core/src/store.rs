//! TaskStore: the bot's shared state, and where it is persisted.
//!
//! Design:
//! - One `parking_lot::Mutex` per collection. Every method takes the lock for
//!   the duration of a single call, so guards never cross an `.await`.
//! - The scheduler filters alerts with [`TaskStore::retain`], which runs under
//!   the alerts lock and is therefore atomic with respect to appends and
//!   removals from command handlers.
//! - Persistence is whole-state: a [`Snapshot`] is written through a
//!   [`Repository`] after changes. Runtime-only data (last activation times,
//!   the delivered-message index) is not persisted.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono_tz::Tz;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::alert::{Alert, TaskId};
use crate::channel::{MessageHandle, MessageId, UserId};
use crate::error::{Result, TockError};
use crate::wakeup::Wakeup;

/// Everything that survives a restart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub alerts: Vec<Alert>,
    #[serde(default)]
    pub timezones: BTreeMap<UserId, Tz>,
    #[serde(default)]
    pub wakeups: BTreeMap<UserId, Wakeup>,
    #[serde(default)]
    pub todos: BTreeMap<UserId, Vec<String>>,
    #[serde(default)]
    pub next_id: TaskId,
}

pub trait Repository: Send + Sync {
    fn load(&self) -> Result<Snapshot>;
    fn save(&self, snapshot: &Snapshot) -> Result<()>;
}

/// Pretty JSON, rewritten in full on every save.
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    path: PathBuf,
}

impl JsonFileRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Repository for JsonFileRepository {
    fn load(&self) -> Result<Snapshot> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no data file yet, starting empty");
            return Ok(Snapshot::default());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(Snapshot::default());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(snapshot)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Keeps the last saved snapshot in memory.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    saved: Mutex<Option<Snapshot>>,
    saves: Mutex<usize>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            saved: Mutex::new(Some(snapshot)),
            saves: Mutex::new(0),
        }
    }

    pub fn saved(&self) -> Option<Snapshot> {
        self.saved.lock().clone()
    }

    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }
}

impl Repository for MemoryRepository {
    fn load(&self) -> Result<Snapshot> {
        Ok(self.saved.lock().clone().unwrap_or_default())
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        *self.saved.lock() = Some(snapshot.clone());
        *self.saves.lock() += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct TaskStore {
    alerts: Mutex<Vec<Alert>>,
    timezones: Mutex<HashMap<UserId, Tz>>,
    wakeups: Mutex<HashMap<UserId, Wakeup>>,
    todos: Mutex<HashMap<UserId, Vec<String>>>,
    /// Delivered reminder messages, for the todo reaction.
    reminder_messages: Mutex<HashMap<(UserId, MessageId), Alert>>,
    next_id: Mutex<TaskId>,
    repo: Option<Arc<dyn Repository>>,
    dirty: AtomicBool,
}

impl std::fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStore")
            .field("alerts", &self.alerts.lock().len())
            .field("timezones", &self.timezones.lock().len())
            .field("wakeups", &self.wakeups.lock().len())
            .field("persistent", &self.repo.is_some())
            .finish()
    }
}

impl TaskStore {
    /// An in-memory store with nothing behind it.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `repo` and write back through it on [`TaskStore::save`].
    pub fn load_from(repo: Arc<dyn Repository>) -> Result<Self> {
        let snapshot = repo.load()?;
        info!(
            alerts = snapshot.alerts.len(),
            users = snapshot.timezones.len(),
            "loaded store"
        );
        let next_id = snapshot
            .alerts
            .iter()
            .map(|a| a.id + 1)
            .max()
            .unwrap_or(0)
            .max(snapshot.next_id);
        Ok(Self {
            alerts: Mutex::new(snapshot.alerts),
            timezones: Mutex::new(snapshot.timezones.into_iter().collect()),
            wakeups: Mutex::new(snapshot.wakeups.into_iter().collect()),
            todos: Mutex::new(snapshot.todos.into_iter().collect()),
            reminder_messages: Mutex::new(HashMap::new()),
            next_id: Mutex::new(next_id),
            repo: Some(repo),
            dirty: AtomicBool::new(false),
        })
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            alerts: self.alerts.lock().clone(),
            timezones: self.timezones.lock().clone().into_iter().collect(),
            wakeups: self.wakeups.lock().clone().into_iter().collect(),
            todos: self.todos.lock().clone().into_iter().collect(),
            next_id: *self.next_id.lock(),
        }
    }

    /// Persist if anything changed since the last save. No-op without a
    /// repository.
    pub fn save(&self) -> Result<()> {
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let Some(repo) = &self.repo else {
            return Ok(());
        };
        if let Err(e) = repo.save(&self.snapshot()) {
            self.dirty.store(true, Ordering::SeqCst);
            return Err(TockError::Storage(e.to_string()));
        }
        debug!("store saved");
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    // Alerts

    pub fn next_id(&self) -> TaskId {
        let mut next = self.next_id.lock();
        let id = *next;
        *next += 1;
        id
    }

    pub fn append(&self, alert: Alert) {
        self.alerts.lock().push(alert);
        self.touch();
    }

    pub fn remove(&self, id: TaskId) -> Option<Alert> {
        let mut alerts = self.alerts.lock();
        let pos = alerts.iter().position(|a| a.id == id)?;
        let removed = alerts.remove(pos);
        drop(alerts);
        self.touch();
        Some(removed)
    }

    /// Keep only the alerts `keep` returns true for. `keep` may mutate them.
    pub fn retain(&self, mut keep: impl FnMut(&mut Alert) -> bool) {
        let mut alerts = self.alerts.lock();
        let before = alerts.len();
        alerts.retain_mut(|a| keep(a));
        if alerts.len() != before {
            drop(alerts);
            self.touch();
        }
    }

    pub fn clear(&self) {
        self.alerts.lock().clear();
        self.touch();
    }

    pub fn len(&self) -> usize {
        self.alerts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.lock().is_empty()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().clone()
    }

    pub fn alerts_for(&self, user: &UserId) -> Vec<Alert> {
        self.alerts
            .lock()
            .iter()
            .filter(|a| a.user == *user)
            .cloned()
            .collect()
    }

    // Timezones

    pub fn set_timezone(&self, user: UserId, tz: Tz) {
        self.timezones.lock().insert(user, tz);
        self.touch();
    }

    pub fn timezone(&self, user: &UserId) -> Result<Tz> {
        self.timezones
            .lock()
            .get(user)
            .copied()
            .ok_or(TockError::MissingTimezone)
    }

    pub fn has_timezone(&self, user: &UserId) -> bool {
        self.timezones.lock().contains_key(user)
    }

    // Wakeups

    pub fn wakeup(&self, user: &UserId) -> Option<Wakeup> {
        self.wakeups.lock().get(user).cloned()
    }

    pub fn set_wakeup(&self, wakeup: Wakeup) {
        self.wakeups.lock().insert(wakeup.user.clone(), wakeup);
        self.touch();
    }

    /// Edit a user's wakeup in place. `false` when the user has none.
    pub fn update_wakeup(&self, user: &UserId, edit: impl FnOnce(&mut Wakeup)) -> bool {
        let mut wakeups = self.wakeups.lock();
        let Some(wakeup) = wakeups.get_mut(user) else {
            return false;
        };
        edit(wakeup);
        drop(wakeups);
        self.touch();
        true
    }

    /// Visit every wakeup under the lock; collects what `visit` returns.
    pub fn sweep_wakeups<T>(&self, mut visit: impl FnMut(&mut Wakeup) -> Option<T>) -> Vec<T> {
        self.wakeups.lock().values_mut().filter_map(|w| visit(w)).collect()
    }

    // Todo list

    pub fn add_todo(&self, user: UserId, item: impl Into<String>) {
        self.todos.lock().entry(user).or_default().push(item.into());
        self.touch();
    }

    pub fn todos_for(&self, user: &UserId) -> Vec<String> {
        self.todos.lock().get(user).cloned().unwrap_or_default()
    }

    pub fn has_todos(&self, user: &UserId) -> bool {
        self.todos.lock().get(user).is_some_and(|items| !items.is_empty())
    }

    /// Remove the 1-based `index`th item of the user's list.
    pub fn remove_todo(&self, user: &UserId, index: usize) -> Option<String> {
        let mut todos = self.todos.lock();
        let items = todos.get_mut(user)?;
        if index == 0 || index > items.len() {
            return None;
        }
        let removed = items.remove(index - 1);
        drop(todos);
        self.touch();
        Some(removed)
    }

    // Delivered reminders

    pub fn record_reminder_message(&self, handle: &MessageHandle, alert: Alert) {
        self.reminder_messages
            .lock()
            .insert((alert.user.clone(), handle.id.clone()), alert);
    }

    pub fn reminder_for_message(&self, user: &UserId, message: &MessageId) -> Option<Alert> {
        self.reminder_messages
            .lock()
            .get(&(user.clone(), message.clone()))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelId;
    use crate::task::SingleTask;
    use chrono::{NaiveTime, TimeZone, Utc};

    fn alert(store: &TaskStore, user: &str) -> Alert {
        let at = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
        Alert::new(
            store.next_id(),
            UserId::new(user),
            ChannelId::new("c"),
            "stretch",
            SingleTask::new(at),
        )
    }

    #[test]
    fn append_remove_and_filter() {
        let store = TaskStore::new();
        let a = alert(&store, "u1");
        let b = alert(&store, "u2");
        assert_ne!(a.id, b.id);
        store.append(a.clone());
        store.append(b.clone());

        assert_eq!(store.alerts_for(&UserId::new("u1")), vec![a.clone()]);
        assert_eq!(store.remove(a.id), Some(a.clone()));
        assert_eq!(store.remove(a.id), None);

        store.retain(|x| x.user != UserId::new("u2"));
        assert!(store.is_empty());
    }

    #[test]
    fn missing_timezone_is_an_error() {
        let store = TaskStore::new();
        let user = UserId::new("u1");
        assert!(matches!(store.timezone(&user), Err(TockError::MissingTimezone)));
        store.set_timezone(user.clone(), Tz::Asia__Tokyo);
        assert_eq!(store.timezone(&user).unwrap(), Tz::Asia__Tokyo);
    }

    #[test]
    fn todo_indices_are_one_based() {
        let store = TaskStore::new();
        let user = UserId::new("u1");
        store.add_todo(user.clone(), "a");
        store.add_todo(user.clone(), "b");
        assert_eq!(store.remove_todo(&user, 0), None);
        assert_eq!(store.remove_todo(&user, 3), None);
        assert_eq!(store.remove_todo(&user, 2), Some("b".to_string()));
        assert_eq!(store.todos_for(&user), vec!["a".to_string()]);
        assert!(store.has_todos(&user));
    }

    #[test]
    fn saves_only_when_dirty_and_reloads() {
        let repo = Arc::new(MemoryRepository::new());
        let store = TaskStore::load_from(repo.clone()).unwrap();
        store.save().unwrap();
        assert_eq!(repo.save_count(), 0);

        let a = alert(&store, "u1");
        store.append(a.clone());
        store.set_wakeup(Wakeup::new(
            UserId::new("u1"),
            ChannelId::new("c"),
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        ));
        store.save().unwrap();
        store.save().unwrap();
        assert_eq!(repo.save_count(), 1);

        let reloaded = TaskStore::load_from(repo.clone()).unwrap();
        assert_eq!(reloaded.alerts(), vec![a]);
        assert!(reloaded.wakeup(&UserId::new("u1")).is_some());
        assert_eq!(reloaded.next_id(), 1);
    }

    #[test]
    fn json_file_round_trip() {
        let dir = std::env::temp_dir().join(format!("tock-store-{}", std::process::id()));
        let repo = JsonFileRepository::new(dir.join("data.json"));
        assert_eq!(repo.load().unwrap(), Snapshot::default());

        let store = TaskStore::new();
        store.append(alert(&store, "u1"));
        store.set_timezone(UserId::new("u1"), Tz::US__Eastern);
        repo.save(&store.snapshot()).unwrap();
        assert_eq!(repo.load().unwrap(), store.snapshot());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
