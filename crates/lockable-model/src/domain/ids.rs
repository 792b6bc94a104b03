use std::fmt;

use serde::{Deserialize, Serialize};

const MANUAL_PREFIX: &str = "manual:";

/// Identity of a task that asks the manager for resources.
///
/// The manager never owns the task; it only uses this id to correlate
/// submissions with stop/terminate signals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Generate a fresh random task id.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Task id used for manual reservations made on behalf of `owner`.
    pub fn manual(owner: &str) -> Self {
        Self(format!("{MANUAL_PREFIX}{owner}"))
    }

    /// Returns `true` if this id was produced by [`TaskId::manual`].
    pub fn is_manual(&self) -> bool {
        self.0.starts_with(MANUAL_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a single lock request, assigned by the manager on submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(u64);

impl RequestId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_task_ids_are_unique() {
        assert_ne!(TaskId::new(), TaskId::new());
    }

    #[test]
    fn manual_task_id_is_recognized() {
        let id = TaskId::manual("alice");
        assert_eq!(id.as_str(), "manual:alice");
        assert!(id.is_manual());
        assert!(!TaskId::from("build-7").is_manual());
    }

    #[test]
    fn request_id_display() {
        assert_eq!(RequestId::new(42).to_string(), "req-42");
    }

    #[test]
    fn ids_serialize_transparently() {
        let json = serde_json::to_string(&TaskId::from("t1")).unwrap();
        assert_eq!(json, r#""t1""#);

        let json = serde_json::to_string(&RequestId::new(7)).unwrap();
        assert_eq!(json, "7");
    }
}
