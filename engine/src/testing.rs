//! In-memory collaborators.
//!
//! These record what the engine asked them to do and can be told to fail. They
//! back the engine's own tests and are handy for dry runs.

use crate::collaborators::{
    Applier, GpuProbe, IdleProbe, OsSettingWatcher, ProcessProbe, ScriptInvocation, ScriptRunner,
    SettingCallback, SubscriptionId, SunTimesProvider, VisualRefresher,
};
use crate::common::{ApplyError, WatcherError};
use crate::model::{RefreshType, SunTimes};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Ordered log shared between doubles, for asserting cross-component ordering.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        lock(&self.0).push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        lock(&self.0).clone()
    }

    pub fn clear(&self) {
        lock(&self.0).clear();
    }
}

/// Applier that remembers every value and reports the last one as live state.
#[derive(Debug)]
pub struct RecordingApplier<V> {
    label: &'static str,
    applied: Mutex<Vec<V>>,
    live: Mutex<Option<V>>,
    failing: AtomicBool,
    journal: Option<Journal>,
}

impl<V: Clone> RecordingApplier<V> {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            applied: Mutex::new(Vec::new()),
            live: Mutex::new(None),
            failing: AtomicBool::new(false),
            journal: None,
        }
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Pretend the subsystem is already in `value`.
    pub fn with_live(self, value: V) -> Self {
        *lock(&self.live) = Some(value);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn applied(&self) -> Vec<V> {
        lock(&self.applied).clone()
    }

    pub fn apply_count(&self) -> usize {
        lock(&self.applied).len()
    }

    pub fn live(&self) -> Option<V> {
        lock(&self.live).clone()
    }
}

#[async_trait]
impl<V> Applier<V> for RecordingApplier<V>
where
    V: Clone + Debug + Send + Sync + 'static,
{
    async fn apply(&self, value: &V) -> Result<(), ApplyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ApplyError::failed(self.label, "injected failure"));
        }
        if let Some(journal) = &self.journal {
            journal.record(format!("{}:{:?}", self.label, value));
        }
        lock(&self.applied).push(value.clone());
        *lock(&self.live) = Some(value.clone());
        Ok(())
    }

    async fn query(&self) -> Result<Option<V>, ApplyError> {
        Ok(lock(&self.live).clone())
    }
}

#[derive(Debug, Default)]
pub struct RecordingScriptRunner {
    runs: Mutex<Vec<ScriptInvocation>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingScriptRunner {
    pub fn fail_script(&self, name: &str) {
        lock(&self.failing).insert(name.to_string());
    }

    pub fn runs(&self) -> Vec<ScriptInvocation> {
        lock(&self.runs).clone()
    }
}

#[async_trait]
impl ScriptRunner for RecordingScriptRunner {
    async fn run(&self, script: &ScriptInvocation) -> Result<(), ApplyError> {
        lock(&self.runs).push(script.clone());
        if lock(&self.failing).contains(&script.name) {
            return Err(ApplyError::failed(
                format!("script {}", script.name),
                "exit status 1",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingRefresher {
    refreshes: Mutex<Vec<RefreshType>>,
}

impl RecordingRefresher {
    pub fn refreshes(&self) -> Vec<RefreshType> {
        lock(&self.refreshes).clone()
    }
}

#[async_trait]
impl VisualRefresher for RecordingRefresher {
    async fn refresh(&self, kind: RefreshType) -> Result<(), ApplyError> {
        lock(&self.refreshes).push(kind);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct StaticIdleProbe {
    idle: Mutex<Duration>,
}

impl StaticIdleProbe {
    pub fn new(idle: Duration) -> Self {
        Self {
            idle: Mutex::new(idle),
        }
    }

    pub fn set(&self, idle: Duration) {
        *lock(&self.idle) = idle;
    }
}

impl IdleProbe for StaticIdleProbe {
    fn idle_duration(&self) -> Result<Duration, ApplyError> {
        Ok(*lock(&self.idle))
    }
}

#[derive(Debug, Default)]
pub struct StaticProcessProbe {
    running: Mutex<HashSet<String>>,
}

impl StaticProcessProbe {
    pub fn set_running<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *lock(&self.running) = names.into_iter().map(Into::into).collect();
    }
}

impl ProcessProbe for StaticProcessProbe {
    fn running_processes(&self) -> Result<HashSet<String>, ApplyError> {
        Ok(lock(&self.running).clone())
    }
}

/// Returns queued samples first, then the fallback value.
#[derive(Debug)]
pub struct ScriptedGpuProbe {
    samples: Mutex<VecDeque<u32>>,
    fallback: u32,
}

impl ScriptedGpuProbe {
    pub fn new(fallback: u32) -> Self {
        Self {
            samples: Mutex::new(VecDeque::new()),
            fallback,
        }
    }

    pub fn push_samples(&self, samples: impl IntoIterator<Item = u32>) {
        lock(&self.samples).extend(samples);
    }
}

#[async_trait]
impl GpuProbe for ScriptedGpuProbe {
    async fn usage_percent(&self) -> Result<u32, ApplyError> {
        Ok(lock(&self.samples).pop_front().unwrap_or(self.fallback))
    }
}

#[derive(Debug)]
pub struct StaticSunTimes(pub SunTimes);

#[async_trait]
impl SunTimesProvider for StaticSunTimes {
    async fn sun_times(&self, _date: NaiveDate) -> Result<SunTimes, ApplyError> {
        Ok(self.0)
    }
}

/// A boolean OS setting flipped by hand.
#[derive(Default)]
pub struct ManualSettingWatcher {
    value: Mutex<bool>,
    subscribers: Mutex<HashMap<SubscriptionId, SettingCallback>>,
    next_id: AtomicU64,
    refuse_subscriptions: AtomicBool,
}

impl ManualSettingWatcher {
    pub fn new(value: bool) -> Self {
        Self {
            value: Mutex::new(value),
            ..Self::default()
        }
    }

    pub fn refuse_subscriptions(&self) {
        self.refuse_subscriptions.store(true, Ordering::SeqCst);
    }

    /// Change the setting, notifying subscribers on an edge.
    pub fn set(&self, value: bool) {
        {
            let mut current = lock(&self.value);
            if *current == value {
                return;
            }
            *current = value;
        }
        let callbacks: Vec<SettingCallback> = lock(&self.subscribers).values().cloned().collect();
        for callback in callbacks {
            callback(value);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }
}

impl OsSettingWatcher for ManualSettingWatcher {
    fn current(&self) -> Result<bool, WatcherError> {
        Ok(*lock(&self.value))
    }

    fn subscribe(&self, callback: SettingCallback) -> Result<SubscriptionId, WatcherError> {
        if self.refuse_subscriptions.load(Ordering::SeqCst) {
            return Err(WatcherError::SubscribeFailed {
                setting: "night_light".to_string(),
                reason: "refused".to_string(),
            });
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        lock(&self.subscribers).insert(id, callback);
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        lock(&self.subscribers).remove(&id);
    }
}
