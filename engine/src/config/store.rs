use super::{ConfigValidationError, EngineConfig};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Holds the current configuration snapshot.
///
/// Readers take a cheap `Arc` clone and keep working with it even if a reload
/// lands mid-tick. Invalid snapshots are rejected and the previous one stays.
#[derive(Debug)]
pub struct ConfigStore {
    current: RwLock<Arc<EngineConfig>>,
    generation: AtomicU64,
}

impl ConfigStore {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(config)),
            generation: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> Arc<EngineConfig> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Validate and publish a new snapshot, returning its generation.
    pub fn replace(&self, config: EngineConfig) -> Result<u64, Vec<ConfigValidationError>> {
        config.validate()?;

        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Arc::new(config);
        Ok(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Number of snapshots published since construction.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GovernorKind;
    use claims::{assert_err, assert_ok_eq};

    #[test]
    fn test_replace_publishes_new_snapshot() {
        let store = ConfigStore::default();
        let before = store.snapshot();

        let next = EngineConfig::default().with_governor(GovernorKind::NightLight);
        assert_ok_eq!(store.replace(next), 1);

        assert_eq!(before.governor(), GovernorKind::Default);
        assert_eq!(store.snapshot().governor(), GovernorKind::NightLight);
        assert_eq!(store.generation(), 1);
    }

    #[test]
    fn test_invalid_snapshot_keeps_previous() {
        let store = ConfigStore::default();
        let invalid: EngineConfig =
            serde_json::from_str(r#"{ "tunable": { "main_timer_secs": 0 } }"#).unwrap();

        assert_err!(store.replace(invalid));
        assert_eq!(store.snapshot().tunable().main_timer_secs(), 60);
        assert_eq!(store.generation(), 0);
    }
}
