use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use engine::clock::ManualClock;
use engine::collaborators::Collaborators;
use engine::config::EngineConfig;
use engine::engine::Engine;
use engine::model::{SwitchEventArgs, SwitchSource, Theme};
use engine::testing::RecordingApplier;
use engine::theme_manager::SwitchOutcome;
use proptest::prelude::*;
use std::sync::Arc;

fn base_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, 5)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

fn engine_with(config: EngineConfig) -> (Engine, Arc<RecordingApplier<Theme>>) {
    let system = Arc::new(RecordingApplier::new("system"));
    let collaborators = Collaborators {
        system_theme: system.clone(),
        ..Collaborators::logging()
    };
    let clock = Arc::new(ManualClock::new(base_time()));
    let engine = Engine::with_clock(config, collaborators, clock).unwrap();
    (engine, system)
}

fn theme_strategy() -> impl Strategy<Value = Theme> {
    prop_oneof![Just(Theme::Light), Just(Theme::Dark)]
}

#[cfg(test)]
mod timed_state_property_tests {
    use super::*;
    use engine::governors::TimedThemeState;

    proptest! {
        #[test]
        fn test_boundaries_surround_now(
            sunrise_min in 0u32..1440,
            sunset_min in 0u32..1440,
            now_min in 0i64..(3 * 1440),
        ) {
            prop_assume!(sunrise_min != sunset_min);
            let sunrise = NaiveTime::from_hms_opt(sunrise_min / 60, sunrise_min % 60, 0).unwrap();
            let sunset = NaiveTime::from_hms_opt(sunset_min / 60, sunset_min % 60, 0).unwrap();
            let now = base_time() + TimeDelta::minutes(now_min);

            let state = TimedThemeState::from_times(
                sunrise,
                sunset,
                TimeDelta::zero(),
                TimeDelta::zero(),
                now,
            );

            // Property: now sits between the current and the next boundary
            prop_assert!(state.current_switch_time() <= now);
            prop_assert!(now < state.next_switch_time());
            prop_assert!(state.next_switch_time() < state.following_switch_time());

            // Property: the current boundary decides the target theme
            let expected = if state.current_switch_time().time() == sunrise {
                Theme::Light
            } else {
                Theme::Dark
            };
            prop_assert_eq!(state.target_theme(), expected);
        }
    }
}

#[cfg(test)]
mod postpone_property_tests {
    use super::*;
    use engine::postpone::PostponeManager;
    use std::collections::BTreeSet;

    #[derive(Debug, Clone)]
    enum Op {
        Add(usize),
        Remove(usize),
        Clear,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => (0usize..6).prop_map(Op::Add),
            3 => (0usize..6).prop_map(Op::Remove),
            1 => Just(Op::Clear),
        ]
    }

    proptest! {
        #[test]
        fn test_queue_matches_set_model(ops in prop::collection::vec(op_strategy(), 0..40)) {
            let manager = PostponeManager::new(Arc::new(ManualClock::new(base_time())));
            let mut model = BTreeSet::new();

            for op in ops {
                match op {
                    Op::Add(i) => {
                        let reason = format!("reason-{i}");
                        // Property: add reports whether the reason was new
                        prop_assert_eq!(manager.add(reason.clone()), model.insert(reason));
                    }
                    Op::Remove(i) => {
                        let reason = format!("reason-{i}");
                        prop_assert_eq!(manager.remove(&reason), model.remove(&reason));
                    }
                    Op::Clear => {
                        prop_assert_eq!(manager.clear(), model.len());
                        model.clear();
                    }
                }

                // Property: postponed exactly while the queue holds a reason
                prop_assert_eq!(manager.is_postponed(), !model.is_empty());
                prop_assert_eq!(manager.count(), model.len());
            }

            let reasons: BTreeSet<String> = manager
                .items()
                .iter()
                .map(|item| item.reason().to_string())
                .collect();
            prop_assert_eq!(reasons, model);
        }

        #[test]
        fn test_postponed_requests_never_reach_components(
            reasons in prop::collection::btree_set("[a-z]{1,8}", 1..5),
            theme in theme_strategy(),
        ) {
            let rt = runtime();
            rt.block_on(async {
                let (engine, system) = engine_with(EngineConfig::default());
                for reason in &reasons {
                    engine.state().postpone().add(reason.clone());
                }

                let outcome = engine
                    .theme_manager()
                    .request_switch(SwitchEventArgs::new(SwitchSource::Api, theme))
                    .await;

                // Property: the outcome names every reason and nothing was applied
                match outcome {
                    SwitchOutcome::Postponed { reasons: listed, .. } => {
                        let listed: std::collections::BTreeSet<String> = listed.into_iter().collect();
                        prop_assert_eq!(&listed, &reasons);
                    }
                    other => prop_assert!(false, "expected postponed, got {:?}", other),
                }
                prop_assert_eq!(system.apply_count(), 0);
                prop_assert!(engine.state().pending_switch().is_some());
                Ok(())
            })?;
        }
    }
}

#[cfg(test)]
mod component_property_tests {
    use super::*;
    use async_trait::async_trait;
    use engine::common::ApplyError;
    use engine::components::{ComponentManager, SwitchComponent};
    use engine::refresh::RefreshCoordinator;
    use engine::testing::{Journal, RecordingRefresher};

    struct Ordered {
        name: &'static str,
        priority: i32,
        applied: Theme,
        journal: Journal,
    }

    #[async_trait]
    impl SwitchComponent for Ordered {
        fn name(&self) -> &'static str {
            self.name
        }

        fn enabled(&self) -> bool {
            true
        }

        fn priority_to_dark(&self) -> i32 {
            self.priority
        }

        fn priority_to_light(&self) -> i32 {
            -self.priority
        }

        fn needs_update(&self, event: &SwitchEventArgs) -> bool {
            self.applied != event.theme()
        }

        async fn handle_switch(&mut self, event: &SwitchEventArgs) -> Result<(), ApplyError> {
            self.applied = event.theme();
            self.journal.record(self.name);
            Ok(())
        }

        fn update_settings_state(&mut self, _config: &EngineConfig) {}
    }

    const NAMES: [&str; 6] = ["alpha", "beta", "gamma", "delta", "epsilon", "zeta"];

    fn manager(priorities: &[i32], journal: &Journal) -> ComponentManager {
        let components: Vec<Box<dyn SwitchComponent>> = priorities
            .iter()
            .zip(NAMES)
            .map(|(&priority, name)| {
                Box::new(Ordered {
                    name,
                    priority,
                    applied: Theme::Unknown,
                    journal: journal.clone(),
                }) as Box<dyn SwitchComponent>
            })
            .collect();
        let refresh = Arc::new(RefreshCoordinator::new(Arc::new(RecordingRefresher::default())));
        ComponentManager::new(components, &EngineConfig::default(), refresh)
    }

    proptest! {
        #[test]
        fn test_components_run_in_priority_order(
            priorities in prop::collection::btree_set(-50i32..50, 1..6)
                .prop_map(|set| set.into_iter().collect::<Vec<_>>())
                .prop_shuffle(),
            theme in theme_strategy(),
        ) {
            let rt = runtime();
            rt.block_on(async {
                let journal = Journal::default();
                let manager = manager(&priorities, &journal);
                manager.run(&SwitchEventArgs::new(SwitchSource::Api, theme)).await;

                let mut expected: Vec<(i32, &str)> = priorities
                    .iter()
                    .zip(NAMES)
                    .map(|(&p, name)| if theme == Theme::Dark { (p, name) } else { (-p, name) })
                    .collect();
                expected.sort();
                let expected: Vec<String> =
                    expected.into_iter().map(|(_, name)| name.to_string()).collect();

                // Property: lower priority for the direction runs first
                prop_assert_eq!(journal.entries(), expected);
                Ok(())
            })?;
        }

        #[test]
        fn test_repeated_request_is_noop(
            count in 1usize..6,
            theme in theme_strategy(),
        ) {
            let rt = runtime();
            rt.block_on(async {
                let journal = Journal::default();
                let priorities: Vec<i32> = (0..count as i32).collect();
                let manager = manager(&priorities, &journal);
                let event = SwitchEventArgs::new(SwitchSource::Api, theme);

                let first = manager.run(&event).await;
                let second = manager.run(&event).await;

                // Property: every component switches once, the second run touches nothing
                prop_assert_eq!(first.updated.len(), count);
                prop_assert!(second.is_noop());
                prop_assert_eq!(journal.entries().len(), count);
                Ok(())
            })?;
        }
    }
}

#[cfg(test)]
mod warden_property_tests {
    use super::*;
    use engine::modules::ModuleKind;
    use engine::testing::{ScriptedGpuProbe, StaticIdleProbe, StaticProcessProbe};
    use std::collections::BTreeSet;
    use std::time::Duration;

    #[derive(Debug, Clone, Copy)]
    struct Toggles {
        auto: bool,
        idle: bool,
        processes: bool,
        gpu: bool,
    }

    fn toggles_strategy() -> impl Strategy<Value = Toggles> {
        (any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>()).prop_map(
            |(auto, idle, processes, gpu)| Toggles {
                auto,
                idle,
                processes,
                gpu,
            },
        )
    }

    fn config_for(toggles: Toggles) -> EngineConfig {
        serde_json::from_value(serde_json::json!({
            "auto_theme_switching_enabled": toggles.auto,
            "sunrise": "07:00:00",
            "sunset": "19:00:00",
            "idle_checker": { "enabled": toggles.idle },
            "process_block_list": { "enabled": toggles.processes },
            "gpu_monitoring": { "enabled": toggles.gpu },
            "components": { "system": { "taskbar_switch_delay_ms": 0 } }
        }))
        .unwrap()
    }

    fn expected_modules(toggles: Toggles) -> BTreeSet<&'static str> {
        let mut expected = BTreeSet::from([ModuleKind::PostponeSync.name()]);
        if toggles.auto {
            expected.insert(ModuleKind::Governor.name());
            if toggles.idle {
                expected.insert(ModuleKind::IdleCheck.name());
            }
            if toggles.processes {
                expected.insert(ModuleKind::ProcessBlockList.name());
            }
            if toggles.gpu {
                expected.insert(ModuleKind::GpuMonitor.name());
            }
        }
        expected
    }

    async fn registered(engine: &Engine) -> BTreeSet<&'static str> {
        let mut names = BTreeSet::new();
        for timer in engine.timers().all() {
            names.extend(timer.module_names().await);
        }
        names.remove("WardenModule");
        names
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn test_warden_converges_after_every_reload(
            sequence in prop::collection::vec(toggles_strategy(), 1..8)
        ) {
            let rt = runtime();
            rt.block_on(async {
                let collaborators = Collaborators {
                    idle: Some(Arc::new(StaticIdleProbe::new(Duration::from_secs(3600)))),
                    processes: Some(Arc::new(StaticProcessProbe::default())),
                    gpu: Some(Arc::new(ScriptedGpuProbe::new(0))),
                    ..Collaborators::logging()
                };
                let clock = Arc::new(ManualClock::new(base_time()));
                let engine = Engine::with_clock(config_for(sequence[0]), collaborators, clock).unwrap();
                engine.initialize().await.unwrap();
                prop_assert_eq!(registered(&engine).await, expected_modules(sequence[0]));

                for toggles in sequence.iter().skip(1).copied() {
                    engine.reload_config(config_for(toggles)).await.unwrap();

                    // Property: one reconcile reaches the desired set, a second changes nothing
                    prop_assert_eq!(registered(&engine).await, expected_modules(toggles));
                    prop_assert!(engine.warden().reconcile().await.is_converged());
                }

                engine.shutdown().await;
                Ok(())
            })?;
        }
    }
}
