use configuration::CurrencySettings;
use core_types::PairKey;
use parking_lot::RwLock;
use std::collections::HashMap;

/// The outcome of registering settings for a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Created,
    Updated,
}

/// A flat map of per-pair settings, shared between readers and the single writer.
#[derive(Debug, Default)]
pub struct SettingsRegistry {
    inner: RwLock<HashMap<PairKey, CurrencySettings>>,
}

impl SettingsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the settings for `key`.
    pub fn register(&self, key: PairKey, settings: CurrencySettings) -> Registration {
        let mut inner = self.inner.write();
        match inner.insert(key, settings) {
            Some(_) => Registration::Updated,
            None => Registration::Created,
        }
    }

    pub fn get(&self, key: &PairKey) -> Option<CurrencySettings> {
        self.inner.read().get(key).cloned()
    }

    pub fn contains(&self, key: &PairKey) -> bool {
        self.inner.read().contains_key(key)
    }

    pub fn keys(&self) -> Vec<PairKey> {
        let mut keys: Vec<PairKey> = self.inner.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
