//! Asset manifest delivered with the `ready` snapshot.
//!
//! Decoding of images and audio is left to the platform; the store only
//! records what the server announced so renderers can resolve names.

use crate::error::ClientError;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetEntry {
    pub name: String,
    #[serde(alias = "type")]
    pub kind: String,
    #[serde(default)]
    pub src: Option<String>,
    /// Inline payload, used instead of `src` for small assets
    #[serde(default)]
    pub raw: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetManifest {
    pub assets: Vec<AssetEntry>,
}

impl AssetManifest {
    /// Parses manifest text; an empty string is an empty manifest.
    pub fn parse(text: &str) -> Result<Self, ClientError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(text).map_err(|e| ClientError::Assets(e.to_string()))
    }
}

pub trait AssetLoader {
    fn load(&mut self, manifest: &AssetManifest) -> Result<(), ClientError>;
}

#[derive(Debug, Default)]
pub struct AssetStore {
    entries: HashMap<String, AssetEntry>,
}

impl AssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&AssetEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl AssetLoader for AssetStore {
    /// Validates the whole manifest before recording any of it.
    fn load(&mut self, manifest: &AssetManifest) -> Result<(), ClientError> {
        for entry in &manifest.assets {
            if entry.src.is_none() && entry.raw.is_none() {
                return Err(ClientError::Assets(format!("{} has neither src nor raw data", entry.name)));
            }
        }
        for entry in &manifest.assets {
            debug!("AssetStore: {} ({})", entry.name, entry.kind);
            self.entries.insert(entry.name.clone(), entry.clone());
        }
        Ok(())
    }
}
