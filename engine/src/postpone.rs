//! The postpone queue.
//!
//! Any number of independent reasons can hold automatic switching off. Switching
//! resumes only when every reason is gone. Reasons may expire on their own, and
//! listeners registered with [`PostponeManager::on_cleared`] are told whenever the
//! queue becomes empty.

use crate::clock::Clock;
use crate::model::SkipType;
use chrono::{NaiveDateTime, TimeDelta};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio_util::sync::CancellationToken;

/// User paused switching until the next boundary ("skip next switch").
pub const PAUSE_AUTO_SWITCH: &str = "PauseAutoSwitch";
/// User delayed switching for a fixed amount of time.
pub const DELAY_AUTO_SWITCH: &str = "DelayAutoSwitch";
/// The session is locked.
pub const SESSION_LOCK: &str = "SessionLock";

/// One reason holding automatic switching off.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostponeItem {
    reason: String,
    user_clearable: bool,
    expiry: Option<NaiveDateTime>,
    skip_type: SkipType,
    created_at: Option<NaiveDateTime>,
}

impl PostponeItem {
    /// A user-clearable reason without expiry.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            user_clearable: true,
            expiry: None,
            skip_type: SkipType::Unspecified,
            created_at: None,
        }
    }

    /// Protect the reason from "clear postpones" requests.
    pub fn not_user_clearable(mut self) -> Self {
        self.user_clearable = false;
        self
    }

    pub fn expiring_at(mut self, expiry: NaiveDateTime) -> Self {
        self.expiry = Some(expiry);
        self
    }

    pub fn with_skip_type(mut self, skip_type: SkipType) -> Self {
        self.skip_type = skip_type;
        self
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn user_clearable(&self) -> bool {
        self.user_clearable
    }

    pub fn expiry(&self) -> Option<NaiveDateTime> {
        self.expiry
    }

    pub fn skip_type(&self) -> SkipType {
        self.skip_type
    }

    /// When the reason was added. `None` until the item is queued.
    pub fn created_at(&self) -> Option<NaiveDateTime> {
        self.created_at
    }
}

impl fmt::Display for PostponeItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.expiry {
            Some(expiry) => write!(
                f,
                "{} (until {})",
                self.reason,
                expiry.format("%Y-%m-%d %H:%M:%S")
            ),
            None => f.write_str(&self.reason),
        }
    }
}

type ClearListener = Arc<dyn Fn() + Send + Sync>;

struct Entry {
    item: PostponeItem,
    expiry_guard: Option<CancellationToken>,
}

#[derive(Default)]
struct Queue {
    entries: Vec<Entry>,
    listeners: Vec<ClearListener>,
}

/// Thread-safe set of postpone reasons keyed by name.
///
/// Cloning yields another handle to the same queue.
///
/// # Examples
///
/// ```no_run
/// use engine::clock::SystemClock;
/// use engine::postpone::{PostponeItem, PostponeManager};
/// use std::sync::Arc;
///
/// let postpone = PostponeManager::new(Arc::new(SystemClock));
/// postpone.on_cleared(|| println!("switching resumed"));
///
/// assert!(postpone.add_item(PostponeItem::new("GameRunning").not_user_clearable()));
/// assert!(postpone.is_postponed());
/// postpone.remove("GameRunning");
/// ```
#[derive(Clone)]
pub struct PostponeManager {
    queue: Arc<Mutex<Queue>>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for PostponeManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostponeManager")
            .field("items", &self.items())
            .finish()
    }
}

impl PostponeManager {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            queue: Arc::new(Mutex::new(Queue::default())),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add a user-clearable reason without expiry. Returns false if the reason is
    /// already present.
    pub fn add(&self, reason: impl Into<String>) -> bool {
        self.add_item(PostponeItem::new(reason))
    }

    /// Add a reason. Returns false if a reason with the same name is already
    /// present or if its expiry has already passed.
    pub fn add_item(&self, mut item: PostponeItem) -> bool {
        let now = self.clock.now();
        if let Some(expiry) = item.expiry {
            if expiry <= now {
                log::warn!(
                    "Refusing postpone {}: expiry {} is in the past",
                    item.reason,
                    expiry.format("%Y-%m-%d %H:%M:%S")
                );
                return false;
            }
        }

        let mut queue = self.lock();
        if queue.entries.iter().any(|e| e.item.reason == item.reason) {
            return false;
        }

        item.created_at = Some(now);
        let expiry_guard = item
            .expiry
            .map(|expiry| self.schedule_expiry(&item.reason, expiry, now));
        log::info!("Postponing automatic theme switch: {item}");
        queue.entries.push(Entry { item, expiry_guard });
        true
    }

    fn schedule_expiry(
        &self,
        reason: &str,
        expiry: NaiveDateTime,
        now: NaiveDateTime,
    ) -> CancellationToken {
        let token = CancellationToken::new();
        let delay = (expiry - now).to_std().unwrap_or_default();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let queue: Weak<Mutex<Queue>> = Arc::downgrade(&self.queue);
                let clock = self.clock.clone();
                let reason = reason.to_string();
                let cancelled = token.clone();
                handle.spawn(async move {
                    tokio::select! {
                        _ = cancelled.cancelled() => {}
                        _ = tokio::time::sleep(delay) => {
                            if let Some(queue) = queue.upgrade() {
                                let manager = PostponeManager { queue, clock };
                                if manager.remove(&reason) {
                                    log::info!("Postpone {reason} expired");
                                }
                            }
                        }
                    }
                });
            }
            Err(_) => {
                log::warn!(
                    "No async runtime available, expiry of {reason} is only checked on sync"
                );
            }
        }

        token
    }

    /// Remove a reason. Fires clear listeners if the queue became empty.
    pub fn remove(&self, reason: &str) -> bool {
        let listeners = {
            let mut queue = self.lock();
            let Some(pos) = queue.entries.iter().position(|e| e.item.reason == reason) else {
                return false;
            };
            let entry = queue.entries.remove(pos);
            if let Some(guard) = entry.expiry_guard {
                guard.cancel();
            }
            log::info!("Removed postpone reason {reason}");
            Self::listeners_if_empty(&queue)
        };

        Self::notify(listeners);
        true
    }

    /// Remove every reason. Returns how many were removed.
    pub fn clear(&self) -> usize {
        self.remove_where(|_| true)
    }

    /// Remove the reasons the user is allowed to clear. Returns how many were removed.
    pub fn remove_user_clearable(&self) -> usize {
        self.remove_where(|item| item.user_clearable)
    }

    fn remove_where(&self, predicate: impl Fn(&PostponeItem) -> bool) -> usize {
        let (removed, listeners) = {
            let mut queue = self.lock();
            let before = queue.entries.len();
            queue.entries.retain(|entry| {
                if predicate(&entry.item) {
                    if let Some(guard) = &entry.expiry_guard {
                        guard.cancel();
                    }
                    false
                } else {
                    true
                }
            });
            let removed = before - queue.entries.len();
            let listeners = if removed > 0 {
                Self::listeners_if_empty(&queue)
            } else {
                Vec::new()
            };
            (removed, listeners)
        };

        if removed > 0 {
            log::info!("Removed {removed} postpone reason(s)");
        }
        Self::notify(listeners);
        removed
    }

    /// Drop reasons whose expiry has passed by the wall clock and re-arm the timers
    /// of the rest. Monotonic sleeps stall while the machine is suspended, so this
    /// is run periodically. Returns how many reasons expired.
    pub fn sync_expiry(&self) -> usize {
        let now = self.clock.now();
        let expired = self.remove_where(|item| item.expiry.is_some_and(|expiry| expiry <= now));

        let mut queue = self.lock();
        let rearm: Vec<(usize, String, NaiveDateTime)> = queue
            .entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.item.expiry.map(|exp| (i, e.item.reason.clone(), exp)))
            .collect();
        for (index, reason, expiry) in rearm {
            let guard = self.schedule_expiry(&reason, expiry, now);
            if let Some(old) = queue.entries[index].expiry_guard.replace(guard) {
                old.cancel();
            }
        }

        expired
    }

    /// True while the user skipped the next automatic switch.
    pub fn is_skip_next_switch(&self) -> bool {
        self.contains(PAUSE_AUTO_SWITCH)
    }

    /// Skip the next automatic switch. Without expiry the pause lasts until it is
    /// removed by the governor or the user.
    pub fn add_skip_next_switch(&self, expiry: Option<NaiveDateTime>, skip_type: SkipType) -> bool {
        let mut item = PostponeItem::new(PAUSE_AUTO_SWITCH).with_skip_type(skip_type);
        if let Some(expiry) = expiry {
            item = item.expiring_at(expiry);
        }
        self.add_item(item)
    }

    /// Add the skip-next pause if absent, remove it otherwise. Returns whether the
    /// pause is active afterwards.
    pub fn toggle_skip_next_switch(
        &self,
        expiry: Option<NaiveDateTime>,
        skip_type: SkipType,
    ) -> bool {
        if self.remove(PAUSE_AUTO_SWITCH) {
            false
        } else {
            self.add_skip_next_switch(expiry, skip_type)
        }
    }

    /// True while the user delayed switching for a fixed time.
    pub fn is_user_delayed(&self) -> bool {
        self.contains(DELAY_AUTO_SWITCH)
    }

    /// Delay automatic switching for `minutes`, replacing an earlier delay.
    /// Returns the expiry.
    pub fn add_user_delay(&self, minutes: u32) -> Option<NaiveDateTime> {
        let expiry = self.clock.now() + TimeDelta::minutes(i64::from(minutes));
        self.remove(DELAY_AUTO_SWITCH);
        self.add_item(PostponeItem::new(DELAY_AUTO_SWITCH).expiring_at(expiry))
            .then_some(expiry)
    }

    pub fn is_postponed(&self) -> bool {
        !self.lock().entries.is_empty()
    }

    pub fn count(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn count_user_clearable(&self) -> usize {
        self.lock()
            .entries
            .iter()
            .filter(|e| e.item.user_clearable)
            .count()
    }

    pub fn contains(&self, reason: &str) -> bool {
        self.lock().entries.iter().any(|e| e.item.reason == reason)
    }

    pub fn get(&self, reason: &str) -> Option<PostponeItem> {
        self.lock()
            .entries
            .iter()
            .find(|e| e.item.reason == reason)
            .map(|e| e.item.clone())
    }

    /// Snapshot of the queue in insertion order.
    pub fn items(&self) -> Vec<PostponeItem> {
        self.lock().entries.iter().map(|e| e.item.clone()).collect()
    }

    /// Comma separated reasons, for log lines.
    pub fn summary(&self) -> String {
        self.lock()
            .entries
            .iter()
            .map(|e| e.item.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Register a callback fired each time the queue transitions to empty.
    pub fn on_cleared(&self, listener: impl Fn() + Send + Sync + 'static) {
        self.lock().listeners.push(Arc::new(listener));
    }

    fn listeners_if_empty(queue: &Queue) -> Vec<ClearListener> {
        if queue.entries.is_empty() {
            queue.listeners.clone()
        } else {
            Vec::new()
        }
    }

    fn notify(listeners: Vec<ClearListener>) {
        for listener in listeners {
            listener();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{NaiveDate, TimeDelta};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 5, 4)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn manager() -> (PostponeManager, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start()));
        (PostponeManager::new(clock.clone()), clock)
    }

    #[test]
    fn test_add_is_idempotent_per_reason() {
        let (postpone, _) = manager();

        assert!(postpone.add("GameRunning"));
        assert!(!postpone.add("GameRunning"));
        assert_eq!(postpone.count(), 1);
        assert_eq!(postpone.get("GameRunning").unwrap().created_at(), Some(start()));
    }

    #[test]
    fn test_resumes_only_when_every_reason_is_gone() {
        let (postpone, _) = manager();
        let cleared = Arc::new(AtomicU32::new(0));
        let counter = cleared.clone();
        postpone.on_cleared(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        postpone.add("A");
        postpone.add("B");
        assert!(postpone.remove("A"));
        assert!(postpone.is_postponed());
        assert_eq!(cleared.load(Ordering::SeqCst), 0);

        assert!(postpone.remove("B"));
        assert!(!postpone.is_postponed());
        assert_eq!(cleared.load(Ordering::SeqCst), 1);

        assert!(!postpone.remove("B"));
        assert_eq!(cleared.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove_user_clearable_keeps_protected_reasons() {
        let (postpone, _) = manager();
        postpone.add(PAUSE_AUTO_SWITCH);
        postpone.add_item(PostponeItem::new("IdleCheckModule").not_user_clearable());

        assert_eq!(postpone.count_user_clearable(), 1);
        assert_eq!(postpone.remove_user_clearable(), 1);
        assert!(postpone.contains("IdleCheckModule"));
        assert!(!postpone.contains(PAUSE_AUTO_SWITCH));
    }

    #[test]
    fn test_clear_fires_listener_once() {
        let (postpone, _) = manager();
        let cleared = Arc::new(AtomicU32::new(0));
        let counter = cleared.clone();
        postpone.on_cleared(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(postpone.clear(), 0);
        assert_eq!(cleared.load(Ordering::SeqCst), 0);

        postpone.add("A");
        postpone.add("B");
        assert_eq!(postpone.clear(), 2);
        assert_eq!(cleared.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_past_expiry_is_rejected() {
        let (postpone, _) = manager();
        let item = PostponeItem::new(DELAY_AUTO_SWITCH).expiring_at(start() - TimeDelta::seconds(1));
        assert!(!postpone.add_item(item));
        assert!(!postpone.is_postponed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiring_reason_removes_itself() {
        let (postpone, _) = manager();
        let item = PostponeItem::new(DELAY_AUTO_SWITCH).expiring_at(start() + TimeDelta::seconds(30));
        assert!(postpone.add_item(item));

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert!(postpone.is_postponed());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!postpone.is_postponed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_removed_reason_cancels_expiry() {
        let (postpone, _) = manager();
        let item = PostponeItem::new(DELAY_AUTO_SWITCH).expiring_at(start() + TimeDelta::seconds(10));
        postpone.add_item(item);
        postpone.remove(DELAY_AUTO_SWITCH);

        // Re-adding with a later expiry must not be removed by the first timer.
        let item = PostponeItem::new(DELAY_AUTO_SWITCH).expiring_at(start() + TimeDelta::seconds(60));
        postpone.add_item(item);
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert!(postpone.contains(DELAY_AUTO_SWITCH));
    }

    #[tokio::test]
    async fn test_sync_expiry_uses_wall_clock() {
        let (postpone, clock) = manager();
        postpone.add_item(
            PostponeItem::new(DELAY_AUTO_SWITCH).expiring_at(start() + TimeDelta::minutes(10)),
        );
        postpone.add_item(
            PostponeItem::new(PAUSE_AUTO_SWITCH).expiring_at(start() + TimeDelta::hours(5)),
        );

        clock.advance(TimeDelta::minutes(11));
        assert_eq!(postpone.sync_expiry(), 1);
        assert!(!postpone.contains(DELAY_AUTO_SWITCH));
        assert!(postpone.contains(PAUSE_AUTO_SWITCH));
    }

    #[tokio::test]
    async fn test_skip_next_toggles() {
        let (postpone, _) = manager();
        let expiry = start() + TimeDelta::hours(7);

        assert!(postpone.toggle_skip_next_switch(Some(expiry), SkipType::UntilSunset));
        assert!(postpone.is_skip_next_switch());
        let item = postpone.get(PAUSE_AUTO_SWITCH).unwrap();
        assert_eq!(item.expiry(), Some(expiry));
        assert_eq!(item.skip_type(), SkipType::UntilSunset);
        assert!(item.user_clearable());

        assert!(!postpone.toggle_skip_next_switch(Some(expiry), SkipType::UntilSunset));
        assert!(!postpone.is_skip_next_switch());
    }

    #[tokio::test]
    async fn test_user_delay_replaces_previous() {
        let (postpone, clock) = manager();
        assert_eq!(
            postpone.add_user_delay(30),
            Some(start() + TimeDelta::minutes(30))
        );

        clock.advance(TimeDelta::minutes(10));
        assert_eq!(
            postpone.add_user_delay(60),
            Some(start() + TimeDelta::minutes(70))
        );
        assert!(postpone.is_user_delayed());
        assert_eq!(postpone.count(), 1);
    }

    #[test]
    fn test_summary_lists_reasons() {
        let (postpone, _) = manager();
        postpone.add("A");
        postpone.add_item(PostponeItem::new("B").expiring_at(start() + TimeDelta::hours(1)));
        assert_eq!(postpone.summary(), "A, B (until 2026-05-04 13:00:00)");
    }
}
