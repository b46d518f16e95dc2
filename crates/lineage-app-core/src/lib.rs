// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared application services for Lineage hosts (config storage, engine config).
//! Keeps host adapters thin and framework-agnostic.

pub mod config;
pub mod engine_config;

pub use config::{ConfigError, ConfigService, ConfigStore};
pub use engine_config::{EngineConfigPort, ENGINE_CONFIG_KEY};
