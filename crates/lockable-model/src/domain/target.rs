use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{ModelError, ResourceName};

/// What a lock request asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TargetSpec {
    /// Every listed resource, all at once, bound in the given order.
    Names(Vec<ResourceName>),
    /// Any `quantity` resources carrying `label`.
    Label { label: String, quantity: usize },
}

impl TargetSpec {
    /// Request a single resource by name.
    pub fn name(name: impl Into<ResourceName>) -> Self {
        TargetSpec::Names(vec![name.into()])
    }

    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ResourceName>,
    {
        TargetSpec::Names(names.into_iter().map(Into::into).collect())
    }

    pub fn label(label: impl Into<String>, quantity: usize) -> Self {
        TargetSpec::Label {
            label: label.into(),
            quantity,
        }
    }

    /// Number of resources bound once this request is granted.
    pub fn quantity(&self) -> usize {
        match self {
            TargetSpec::Names(names) => names.len(),
            TargetSpec::Label { quantity, .. } => *quantity,
        }
    }

    /// Short symbolic identifier used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            TargetSpec::Names(_) => "names",
            TargetSpec::Label { .. } => "label",
        }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        match self {
            TargetSpec::Names(names) => {
                if names.is_empty() {
                    return Err(ModelError::EmptyNames);
                }
                let mut seen = HashSet::with_capacity(names.len());
                for name in names {
                    if name.trim().is_empty() {
                        return Err(ModelError::EmptyResourceName);
                    }
                    if !seen.insert(name.as_str()) {
                        return Err(ModelError::DuplicateName(name.clone()));
                    }
                }
                Ok(())
            }
            TargetSpec::Label { label, quantity } => {
                if label.trim().is_empty() {
                    return Err(ModelError::EmptyLabel);
                }
                if *quantity == 0 {
                    return Err(ModelError::ZeroQuantity);
                }
                Ok(())
            }
        }
    }
}
