// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Engine configuration persistence.

use lineage_core::EngineConfig;
use tracing::{debug, warn};

use crate::config::{ConfigError, ConfigService, ConfigStore};

/// Store key of the engine configuration blob.
pub const ENGINE_CONFIG_KEY: &str = "engine";

/// Config-facing port for the engine configuration.
pub trait EngineConfigPort {
    /// Load the stored engine config, `None` when nothing usable is stored.
    fn try_load_engine_config(&self) -> Result<Option<EngineConfig>, ConfigError>;

    /// Load the engine config. Missing or unreadable blobs yield defaults.
    fn load_engine_config(&self) -> EngineConfig {
        match self.try_load_engine_config() {
            Ok(Some(config)) => config,
            Ok(None) => {
                debug!("no stored engine config; using defaults");
                EngineConfig::default()
            }
            Err(err) => {
                warn!(error = %err, "engine config unreadable; using defaults");
                EngineConfig::default()
            }
        }
    }

    /// Persist the engine config.
    fn save_engine_config(&self, config: &EngineConfig) -> Result<(), ConfigError>;
}

impl<S: ConfigStore> EngineConfigPort for ConfigService<S> {
    fn try_load_engine_config(&self) -> Result<Option<EngineConfig>, ConfigError> {
        self.read(ENGINE_CONFIG_KEY)
    }

    fn save_engine_config(&self, config: &EngineConfig) -> Result<(), ConfigError> {
        self.write(ENGINE_CONFIG_KEY, config)
    }
}
