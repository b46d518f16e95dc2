// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Filesystem-backed [`ConfigStore`] for Lineage hosts (platform config dir).

use directories::ProjectDirs;
use lineage_app_core::{ConfigError, ConfigStore};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Stores config blobs as `<key>.json` files in one directory.
#[derive(Debug, Clone)]
pub struct FsConfigStore {
    base: PathBuf,
}

impl FsConfigStore {
    /// Create a store rooted at the user config directory.
    pub fn new() -> Result<Self, ConfigError> {
        let dirs = ProjectDirs::from("dev", "flyingrobots", "Lineage")
            .ok_or_else(|| ConfigError::Unavailable("no home directory".into()))?;
        Self::with_base(dirs.config_dir())
    }

    /// Create a store rooted at `base`, creating the directory if needed.
    pub fn with_base(base: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let base = base.into();
        fs::create_dir_all(&base)
            .map_err(|err| ConfigError::Unavailable(format!("{}: {err}", base.display())))?;
        Ok(Self { base })
    }

    /// Directory the blobs live in.
    pub fn base(&self) -> &Path {
        &self.base
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, ConfigError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(ConfigError::InvalidKey(key.to_owned()));
        }
        Ok(self.base.join(format!("{key}.json")))
    }
}

impl ConfigStore for FsConfigStore {
    fn load_raw(&self, key: &str) -> Result<Option<Vec<u8>>, ConfigError> {
        match fs::read(self.path_for(key)?) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ConfigError::Io {
                key: key.to_owned(),
                source,
            }),
        }
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        let path = self.path_for(key)?;
        let io = |source| ConfigError::Io {
            key: key.to_owned(),
            source,
        };
        fs::create_dir_all(&self.base).map_err(io)?;
        // Readers never observe a partially written blob.
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, data).map_err(io)?;
        fs::rename(&staging, &path).map_err(io)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use lineage_app_core::{ConfigService, EngineConfigPort};
    use lineage_core::EngineConfig;

    #[test]
    fn missing_key_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsConfigStore::with_base(dir.path()).unwrap();
        assert!(store.load_raw("engine").unwrap().is_none());
    }

    #[test]
    fn blobs_land_in_json_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsConfigStore::with_base(dir.path().join("nested")).unwrap();
        store.save_raw("engine", b"{}").unwrap();
        assert_eq!(fs::read(dir.path().join("nested/engine.json")).unwrap(), b"{}");
        assert_eq!(store.load_raw("engine").unwrap().as_deref(), Some(&b"{}"[..]));
        assert!(!dir.path().join("nested/engine.json.tmp").exists());
    }

    #[test]
    fn rejects_keys_that_escape_the_base() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsConfigStore::with_base(dir.path()).unwrap();
        assert!(matches!(store.save_raw("../evil", b"x"), Err(ConfigError::InvalidKey(_))));
        assert!(matches!(store.load_raw(""), Err(ConfigError::InvalidKey(_))));
        assert!(matches!(store.load_raw(".hidden"), Err(ConfigError::InvalidKey(_))));
    }

    #[test]
    fn unreadable_blob_reports_its_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsConfigStore::with_base(dir.path()).unwrap();
        fs::create_dir(dir.path().join("engine.json")).unwrap();
        let err = store.load_raw("engine").unwrap_err();
        assert!(matches!(err, ConfigError::Io { ref key, .. } if key == "engine"));
    }

    #[test]
    fn engine_config_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig {
            verify_consistency: true,
            commit_store_budget_bytes: Some(1 << 20),
            ..EngineConfig::default()
        };
        ConfigService::new(FsConfigStore::with_base(dir.path()).unwrap())
            .save_engine_config(&config)
            .unwrap();
        let reopened = ConfigService::new(FsConfigStore::with_base(dir.path()).unwrap());
        assert_eq!(reopened.load_engine_config(), config);
    }
}
