use super::{Module, TimerAffinity};
use crate::common::{EngineError, EngineResult};
use crate::config::EngineConfig;
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Fires its registered modules once per period.
///
/// Registration and deregistration may happen while a tick is running; the tick
/// finishes with the module set it captured when it started.
pub struct ModuleTimer {
    affinity: TimerAffinity,
    period: StdMutex<Duration>,
    period_changed: Notify,
    modules: Mutex<Vec<Arc<dyn Module>>>,
    debug_messages: AtomicBool,
}

impl ModuleTimer {
    pub fn new(affinity: TimerAffinity, period: Duration) -> Self {
        Self {
            affinity,
            period: StdMutex::new(period),
            period_changed: Notify::new(),
            modules: Mutex::new(Vec::new()),
            debug_messages: AtomicBool::new(false),
        }
    }

    fn period_lock(&self) -> MutexGuard<'_, Duration> {
        self.period.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn affinity(&self) -> TimerAffinity {
        self.affinity
    }

    pub fn period(&self) -> Duration {
        *self.period_lock()
    }

    /// Change the period. A running loop restarts its interval.
    pub fn set_period(&self, period: Duration) {
        {
            let mut current = self.period_lock();
            if *current == period {
                return;
            }
            *current = period;
        }
        log::info!("{} timer period changed to {}s", self.affinity, period.as_secs());
        self.period_changed.notify_one();
    }

    pub fn set_debug_messages(&self, enabled: bool) {
        self.debug_messages.store(enabled, Ordering::Relaxed);
    }

    /// Add a module. Does nothing and returns false if a module with the same name
    /// is already registered.
    ///
    /// The module's enable hook runs before it is added; modules that ask for it
    /// fire once right after.
    pub async fn register_module(&self, module: Arc<dyn Module>) -> bool {
        {
            let mut modules = self.modules.lock().await;
            if modules.iter().any(|m| m.name() == module.name()) {
                log::debug!(
                    "{} already registered with {} timer",
                    module.name(),
                    self.affinity
                );
                return false;
            }
            module.enable_hook().await;
            modules.push(module.clone());
            // Stable: equal priorities keep registration order.
            modules.sort_by_key(|m| std::cmp::Reverse(m.priority()));
        }
        log::info!("Registered {} with {} timer", module.name(), self.affinity);

        if module.fire_on_registration() {
            fire_module(module.as_ref()).await;
        }
        true
    }

    /// Remove a module and run its cleanup. Returns the module if it was registered.
    pub async fn deregister_module(&self, name: &str) -> Option<Arc<dyn Module>> {
        let removed = {
            let mut modules = self.modules.lock().await;
            let index = modules.iter().position(|m| m.name() == name)?;
            modules.remove(index)
        };
        removed.cleanup().await;
        log::info!("Deregistered {} from {} timer", name, self.affinity);
        Some(removed)
    }

    pub async fn is_registered(&self, name: &str) -> bool {
        self.modules.lock().await.iter().any(|m| m.name() == name)
    }

    /// Names in firing order.
    pub async fn module_names(&self) -> Vec<&'static str> {
        self.modules.lock().await.iter().map(|m| m.name()).collect()
    }

    /// Fire every registered module once, highest priority first.
    pub async fn tick(&self) {
        let snapshot: Vec<Arc<dyn Module>> = self.modules.lock().await.clone();
        if self.debug_messages.load(Ordering::Relaxed) {
            let names: Vec<&str> = snapshot.iter().map(|m| m.name()).collect();
            log::debug!("{} timer signal: [{}]", self.affinity, names.join(", "));
        }
        for module in snapshot {
            fire_module(module.as_ref()).await;
        }
    }

    /// Tick every period until `cancel` fires. The first tick happens one period
    /// after start.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        log::debug!("{} timer started", self.affinity);
        loop {
            let period = self.period();
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        log::debug!("{} timer stopped", self.affinity);
                        return;
                    }
                    () = self.period_changed.notified() => break,
                    _ = interval.tick() => self.tick().await,
                }
            }
        }
    }

    /// Deregister every module, running cleanups.
    pub async fn clear(&self) {
        let names = self.module_names().await;
        for name in names {
            self.deregister_module(name).await;
        }
    }
}

async fn fire_module(module: &dyn Module) {
    if AssertUnwindSafe(module.fire()).catch_unwind().await.is_err() {
        log::error!("Module {} panicked while firing", module.name());
    }
}

impl std::fmt::Debug for ModuleTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleTimer")
            .field("affinity", &self.affinity)
            .field("period", &self.period())
            .finish_non_exhaustive()
    }
}

/// One timer per [`TimerAffinity`].
#[derive(Debug)]
pub struct ModuleTimers {
    timers: HashMap<TimerAffinity, Arc<ModuleTimer>>,
}

impl ModuleTimers {
    pub fn new(config: &EngineConfig) -> Self {
        let debug = config.tunable().debug_timer_message();
        let timers = TimerAffinity::ALL
            .into_iter()
            .map(|affinity| {
                let timer = ModuleTimer::new(affinity, affinity.period(config));
                timer.set_debug_messages(debug);
                (affinity, Arc::new(timer))
            })
            .collect();
        Self { timers }
    }

    pub fn get(&self, affinity: TimerAffinity) -> EngineResult<&Arc<ModuleTimer>> {
        self.timers
            .get(&affinity)
            .ok_or_else(|| EngineError::TimerNotFound {
                affinity: affinity.to_string(),
            })
    }

    /// Timers in a fixed order: main, io, geoposition, state update.
    pub fn all(&self) -> Vec<Arc<ModuleTimer>> {
        TimerAffinity::ALL
            .iter()
            .filter_map(|affinity| self.timers.get(affinity).cloned())
            .collect()
    }

    /// The timer a module with `name` is registered on, if any.
    pub async fn find(&self, name: &str) -> Option<Arc<ModuleTimer>> {
        for timer in self.all() {
            if timer.is_registered(name).await {
                return Some(timer);
            }
        }
        None
    }

    /// Push period and debug settings from a new configuration.
    pub fn apply_config(&self, config: &EngineConfig) {
        for timer in self.timers.values() {
            timer.set_period(timer.affinity().period(config));
            timer.set_debug_messages(config.tunable().debug_timer_message());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Journal;
    use async_trait::async_trait;

    struct Recorder {
        name: &'static str,
        priority: i32,
        fire_on_registration: bool,
        panic: bool,
        journal: Journal,
    }

    impl Recorder {
        fn new(name: &'static str, journal: &Journal) -> Self {
            Self {
                name,
                priority: 0,
                fire_on_registration: false,
                panic: false,
                journal: journal.clone(),
            }
        }
    }

    #[async_trait]
    impl Module for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        fn timer_affinity(&self) -> TimerAffinity {
            TimerAffinity::Main
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn fire_on_registration(&self) -> bool {
            self.fire_on_registration
        }

        async fn fire(&self) {
            if self.panic {
                panic!("module failure");
            }
            self.journal.record(format!("{}:fire", self.name));
        }

        async fn enable_hook(&self) {
            self.journal.record(format!("{}:enable", self.name));
        }

        async fn cleanup(&self) {
            self.journal.record(format!("{}:cleanup", self.name));
        }
    }

    fn timer() -> ModuleTimer {
        ModuleTimer::new(TimerAffinity::Main, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let journal = Journal::default();
        let timer = timer();
        assert!(timer.register_module(Arc::new(Recorder::new("a", &journal))).await);
        assert!(!timer.register_module(Arc::new(Recorder::new("a", &journal))).await);
        assert_eq!(timer.module_names().await, vec!["a"]);
        assert_eq!(journal.entries(), vec!["a:enable"]);
    }

    #[tokio::test]
    async fn test_priority_orders_firing() {
        let journal = Journal::default();
        let timer = timer();
        let mut low = Recorder::new("low", &journal);
        low.priority = 0;
        let mut high = Recorder::new("high", &journal);
        high.priority = 2;
        let mut mid = Recorder::new("mid", &journal);
        mid.priority = 1;
        let other = Recorder::new("other", &journal);

        timer.register_module(Arc::new(low)).await;
        timer.register_module(Arc::new(high)).await;
        timer.register_module(Arc::new(mid)).await;
        timer.register_module(Arc::new(other)).await;
        journal.clear();

        timer.tick().await;
        assert_eq!(
            journal.entries(),
            vec!["high:fire", "mid:fire", "low:fire", "other:fire"]
        );
    }

    #[tokio::test]
    async fn test_fire_on_registration_and_cleanup() {
        let journal = Journal::default();
        let timer = timer();
        let mut module = Recorder::new("warden", &journal);
        module.fire_on_registration = true;
        timer.register_module(Arc::new(module)).await;
        assert_eq!(journal.entries(), vec!["warden:enable", "warden:fire"]);

        assert!(timer.deregister_module("warden").await.is_some());
        assert!(timer.deregister_module("warden").await.is_none());
        assert_eq!(journal.entries().last().map(String::as_str), Some("warden:cleanup"));
        assert!(!timer.is_registered("warden").await);
    }

    #[tokio::test]
    async fn test_panicking_module_does_not_stop_tick() {
        let journal = Journal::default();
        let timer = timer();
        let mut bad = Recorder::new("bad", &journal);
        bad.panic = true;
        bad.priority = 5;
        timer.register_module(Arc::new(bad)).await;
        timer.register_module(Arc::new(Recorder::new("good", &journal))).await;
        journal.clear();

        timer.tick().await;
        assert_eq!(journal.entries(), vec!["good:fire"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ticks_each_period() {
        let journal = Journal::default();
        let timer = Arc::new(ModuleTimer::new(TimerAffinity::Main, Duration::from_secs(10)));
        timer.register_module(Arc::new(Recorder::new("a", &journal))).await;
        journal.clear();

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(timer.clone().run(cancel.clone()));

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(journal.entries(), vec!["a:fire", "a:fire"]);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_timers_lookup() {
        let journal = Journal::default();
        let timers = ModuleTimers::new(&EngineConfig::default());
        assert_eq!(timers.all().len(), 4);
        let main = timers.get(TimerAffinity::Main).unwrap();
        main.register_module(Arc::new(Recorder::new("a", &journal))).await;
        let found = timers.find("a").await.unwrap();
        assert_eq!(found.affinity(), TimerAffinity::Main);
        assert!(timers.find("missing").await.is_none());
    }
}
