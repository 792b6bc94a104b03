use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::{Labels, ModelError, RequestId, ResourceName};

/// Occupancy of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceState {
    /// Nobody holds the resource.
    Free,
    /// Bound to exactly one granted request.
    Held,
}

/// Durable definition of a resource, as provided by configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDef {
    /// Unique resource name.
    pub name: ResourceName,
    /// Labels grouping interchangeable resources.
    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub labels: Labels,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub note: String,
    /// Owner of a manual reservation to restore at startup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserved_by: Option<String>,
}

impl ResourceDef {
    pub fn new(name: impl Into<ResourceName>) -> Self {
        Self {
            name: name.into(),
            labels: Labels::new(),
            note: String::new(),
            reserved_by: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.insert(label.into());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.name.trim().is_empty() {
            return Err(ModelError::EmptyResourceName);
        }
        if self.labels.iter().any(|l| l.trim().is_empty()) {
            return Err(ModelError::EmptyLabel);
        }
        Ok(())
    }
}

/// Snapshot of a registered resource and its current state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// Unique resource name.
    pub name: ResourceName,
    /// Labels grouping interchangeable resources.
    pub labels: Labels,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub note: String,
    /// Current occupancy.
    pub state: ResourceState,
    /// Request holding the resource while `Held`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holder: Option<RequestId>,
    /// Last state or definition change.
    #[serde(with = "time_serde")]
    pub updated_at: SystemTime,
}

impl Resource {
    pub fn from_def(def: &ResourceDef) -> Self {
        Self {
            name: def.name.clone(),
            labels: def.labels.clone(),
            note: def.note.clone(),
            state: ResourceState::Free,
            holder: None,
            updated_at: SystemTime::now(),
        }
    }

    #[inline]
    pub fn is_free(&self) -> bool {
        self.state == ResourceState::Free
    }
}

mod time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let since_epoch = time
            .duration_since(UNIX_EPOCH)
            .map_err(serde::ser::Error::custom)?;
        since_epoch.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + std::time::Duration::from_secs(secs))
    }
}
