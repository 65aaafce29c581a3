//! Client configuration
//!
//! Read from TOML. Every section is optional:
//!
//! ```toml
//! relays = ["wss://relay.example.com"]
//!
//! [cache]
//! mode = "sqlite"          # "memory" | "sqlite" | "archive"
//! path = "./cache.db"
//!
//! [subscription]
//! id_prefix = "quasar"
//! ```

use crate::cache::StoreMode;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Relay urls, one pool member each
    pub relays: Vec<String>,
    pub cache: CacheConfig,
    pub subscription: SubscriptionConfig,
}

impl ClientConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {:?}: {}", path, e)))?;
        Self::from_toml_str(&text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
    #[default]
    Memory,
    Sqlite,
    Archive,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub mode: CacheKind,
    /// Required by the persistent modes
    pub path: Option<PathBuf>,
}

impl CacheConfig {
    pub fn store_mode(&self) -> Result<StoreMode> {
        let path = || {
            self.path
                .clone()
                .ok_or_else(|| Error::Config(format!("cache mode {:?} needs a path", self.mode)))
        };

        Ok(match self.mode {
            CacheKind::Memory => StoreMode::InMemory,
            CacheKind::Sqlite => StoreMode::Sqlite(path()?),
            CacheKind::Archive => StoreMode::Archive(path()?),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SubscriptionConfig {
    pub id_prefix: String,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            id_prefix: "quasar".to_string(),
        }
    }
}
