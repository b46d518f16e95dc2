// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Config blob storage port and the JSON service the engine config rides on.
//!
//! Stores deal in raw bytes under a logical key; absence is `Ok(None)`, not an
//! error. Decoding happens in [`ConfigService`] so every adapter shares one
//! notion of an empty or corrupt blob.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Storage port for raw config blobs, keyed by logical name.
pub trait ConfigStore {
    /// Load the blob stored under `key`, or `None` when nothing is stored.
    fn load_raw(&self, key: &str) -> Result<Option<Vec<u8>>, ConfigError>;
    /// Persist `data` under `key`, replacing any previous blob.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError>;
}

/// Errors raised by config stores and the config service.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The key is empty or not a plain file-safe name.
    #[error("[INVALID_CONFIG_KEY] {0:?}")]
    InvalidKey(String),
    /// No location for config blobs could be determined or created.
    #[error("[CONFIG_UNAVAILABLE] {0}")]
    Unavailable(String),
    /// Reading or writing the blob failed.
    #[error("[CONFIG_IO] {key}: {source}")]
    Io {
        /// Key being read or written.
        key: String,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },
    /// The stored blob is not valid JSON for the expected type.
    #[error("[CONFIG_CORRUPT] {key}: {source}")]
    Corrupt {
        /// Key whose blob failed to decode.
        key: String,
        /// Decoder failure.
        #[source]
        source: serde_json::Error,
    },
    /// The value could not be encoded.
    #[error("[CONFIG_ENCODE] {key}: {source}")]
    Encode {
        /// Key the value was meant for.
        key: String,
        /// Encoder failure.
        #[source]
        source: serde_json::Error,
    },
}

/// JSON codec in front of a [`ConfigStore`].
///
/// Typed access goes through ports such as
/// [`EngineConfigPort`](crate::EngineConfigPort).
pub struct ConfigService<S> {
    store: S,
}

impl<S> ConfigService<S> {
    /// Create a service over `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Borrow the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: ConfigStore> ConfigService<S> {
    /// Decode the blob under `key`; missing and empty blobs read as `None`.
    pub(crate) fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        let Some(bytes) = self.store.load_raw(key)? else {
            return Ok(None);
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| ConfigError::Corrupt {
                key: key.to_owned(),
                source,
            })
    }

    /// Encode `value` as pretty JSON and store it under `key`.
    pub(crate) fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<(), ConfigError> {
        let mut data = serde_json::to_vec_pretty(value).map_err(|source| ConfigError::Encode {
            key: key.to_owned(),
            source,
        })?;
        data.push(b'\n');
        self.store.save_raw(key, &data)
    }
}
