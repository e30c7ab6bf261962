//! Runtime configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_MAP_SIZE, DEFAULT_MAX_READERS};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub engine: EngineConfig,
}

impl Config {
    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| Error::invalid(format!("config: {}", e)))
    }
}

/// LMDB environment options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: String,
    pub map_size: usize,
    pub max_readers: u32,
}

impl StoreConfig {
    pub fn at(path: impl AsRef<Path>) -> Self {
        StoreConfig { path: path.as_ref().to_string_lossy().into_owned(), ..Self::default() }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            path: "data/hierarchy".into(),
            map_size: DEFAULT_MAP_SIZE,
            max_readers: DEFAULT_MAX_READERS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Open bootstrap mode at startup. Only for seeding an empty store.
    pub allow_bootstrap: bool,
}
