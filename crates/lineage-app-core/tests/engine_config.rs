// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]
#![allow(clippy::expect_used, clippy::unwrap_used)]
//! Engine config persistence through the config service.

use lineage_app_core::{
    ConfigError, ConfigService, ConfigStore, EngineConfigPort, ENGINE_CONFIG_KEY,
};
use lineage_core::{EngineConfig, DEFAULT_STAGED_MESSAGE};
use lineage_dry_tests::InMemoryConfigStore;

#[test]
fn missing_config_yields_defaults() {
    let store = InMemoryConfigStore::new();
    let service = ConfigService::new(store.clone());
    assert!(service.try_load_engine_config().unwrap().is_none());
    assert_eq!(service.load_engine_config(), EngineConfig::default());
    assert_eq!(store.load_count(), 2);
}

#[test]
fn saved_config_is_loaded_back() {
    let store = InMemoryConfigStore::new();
    let service = ConfigService::new(store.clone());
    let config = EngineConfig {
        compact_view: true,
        fetch_concurrency: 4,
        staged_message: "work in progress".into(),
        ..EngineConfig::default()
    };
    service.save_engine_config(&config).unwrap();
    assert!(store.contains_key(ENGINE_CONFIG_KEY));
    assert_eq!(service.try_load_engine_config().unwrap(), Some(config));
}

#[test]
fn partial_blob_fills_remaining_fields_with_defaults() {
    let store = InMemoryConfigStore::new();
    store
        .save_raw(ENGINE_CONFIG_KEY, br#"{ "compact_view": true }"#)
        .unwrap();
    let config = ConfigService::new(store).load_engine_config();
    assert!(config.compact_view);
    assert_eq!(config.staged_message, DEFAULT_STAGED_MESSAGE);
    assert_eq!(config.fetch_concurrency, 32);
    assert!(config.resolve_upstreams);
}

#[test]
fn corrupt_blob_is_reported_and_falls_back_to_defaults() {
    let store = InMemoryConfigStore::new();
    store.save_raw(ENGINE_CONFIG_KEY, b"{ not json").unwrap();
    let service = ConfigService::new(store);
    let err = service.try_load_engine_config().unwrap_err();
    assert!(matches!(&err, ConfigError::Corrupt { key, .. } if key == ENGINE_CONFIG_KEY));
    assert!(err.to_string().starts_with("[CONFIG_CORRUPT] engine:"));
    assert_eq!(service.load_engine_config(), EngineConfig::default());
}

#[test]
fn store_failures_fall_back_or_propagate() {
    let store = InMemoryConfigStore::new();
    store.set_fail_on_load(true);
    store.set_fail_on_save(true);
    let service = ConfigService::new(store);
    assert!(matches!(
        service.try_load_engine_config(),
        Err(ConfigError::Io { .. })
    ));
    assert_eq!(service.load_engine_config(), EngineConfig::default());
    assert!(matches!(
        service.save_engine_config(&EngineConfig::default()),
        Err(ConfigError::Io { .. })
    ));
}

#[test]
fn blank_blob_reads_as_missing() {
    let store = InMemoryConfigStore::new();
    store.save_raw(ENGINE_CONFIG_KEY, b"  \n").unwrap();
    let service = ConfigService::new(store);
    assert!(service.try_load_engine_config().unwrap().is_none());
    assert_eq!(service.load_engine_config(), EngineConfig::default());
}

#[test]
fn saved_blob_is_pretty_json_with_trailing_newline() {
    let store = InMemoryConfigStore::new();
    ConfigService::new(store.clone())
        .save_engine_config(&EngineConfig::default())
        .unwrap();
    let raw = store.load_raw(ENGINE_CONFIG_KEY).unwrap().unwrap();
    let text = String::from_utf8(raw).unwrap();
    assert!(text.starts_with("{\n"));
    assert!(text.ends_with("}\n"));
    assert!(text.contains("\"staged_message\": \"staged changes\""));
}
