use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use lockable_model::ResourceDef;

use crate::error::CoreError;

const DEFAULT_TOMBSTONE_CAPACITY: usize = 1024;

/// Startup configuration of the lock manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerConfig {
    /// Resources registered when the manager is built.
    #[serde(default)]
    pub resources: Vec<ResourceDef>,
    /// How many cancelled request ids `status` keeps answering for.
    #[serde(default = "default_tombstone_capacity")]
    pub tombstone_capacity: usize,
}

fn default_tombstone_capacity() -> usize {
    DEFAULT_TOMBSTONE_CAPACITY
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            resources: Vec::new(),
            tombstone_capacity: DEFAULT_TOMBSTONE_CAPACITY,
        }
    }
}

impl ManagerConfig {
    pub fn from_json_str(s: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&raw)
    }

    pub fn with_resource(mut self, def: ResourceDef) -> Self {
        self.resources.push(def);
        self
    }
}
