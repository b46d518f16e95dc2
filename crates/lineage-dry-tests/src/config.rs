// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory config store fake for testing without filesystem I/O.

use lineage_app_core::{ConfigError, ConfigStore};
use std::collections::BTreeMap;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// In-memory [`ConfigStore`] that counts calls and can simulate failures.
///
/// Clones share state, so a test can keep a handle after moving one into a
/// [`ConfigService`](lineage_app_core::ConfigService).
///
/// # Example
///
/// ```
/// use lineage_app_core::{ConfigService, EngineConfigPort};
/// use lineage_core::EngineConfig;
/// use lineage_dry_tests::InMemoryConfigStore;
///
/// let store = InMemoryConfigStore::new();
/// let service = ConfigService::new(store.clone());
/// service.save_engine_config(&EngineConfig::default()).unwrap();
/// assert_eq!(store.save_count(), 1);
/// assert!(store.contains_key("engine"));
/// ```
#[derive(Clone, Default)]
pub struct InMemoryConfigStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    data: BTreeMap<String, Vec<u8>>,
    load_count: usize,
    save_count: usize,
    fail_on_load: bool,
    fail_on_save: bool,
}

impl InMemoryConfigStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every subsequent `load_raw` fail with [`ConfigError::Io`].
    pub fn set_fail_on_load(&self, fail: bool) {
        self.lock().fail_on_load = fail;
    }

    /// Make every subsequent `save_raw` fail with [`ConfigError::Io`].
    pub fn set_fail_on_save(&self, fail: bool) {
        self.lock().fail_on_save = fail;
    }

    /// `load_raw` attempts, failed ones included.
    pub fn load_count(&self) -> usize {
        self.lock().load_count
    }

    /// `save_raw` attempts, failed ones included.
    pub fn save_count(&self) -> usize {
        self.lock().save_count
    }

    /// Stored keys in sorted order.
    pub fn keys(&self) -> Vec<String> {
        self.lock().data.keys().cloned().collect()
    }

    /// Returns `true` if `key` holds a blob.
    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().data.contains_key(key)
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn load_raw(&self, key: &str) -> Result<Option<Vec<u8>>, ConfigError> {
        let mut inner = self.lock();
        inner.load_count += 1;
        if inner.fail_on_load {
            return Err(simulated(key, "load"));
        }
        Ok(inner.data.get(key).cloned())
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        let mut inner = self.lock();
        inner.save_count += 1;
        if inner.fail_on_save {
            return Err(simulated(key, "save"));
        }
        inner.data.insert(key.to_owned(), data.to_vec());
        Ok(())
    }
}

fn simulated(key: &str, op: &str) -> ConfigError {
    ConfigError::Io {
        key: key.to_owned(),
        source: io::Error::other(format!("simulated {op} failure")),
    }
}
