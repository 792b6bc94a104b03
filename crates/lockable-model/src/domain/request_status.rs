use serde::{Deserialize, Serialize};

/// Current state of a lock request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestStatus {
    /// Queued, no resources bound yet.
    Waiting,
    /// Resources bound; the task owns them until release.
    Granted,
    /// Withdrawn or terminated before it was ever granted.
    Cancelled,
}

/// Cancellation intent observed for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CancelState {
    /// Running normally.
    Active,
    /// Asked to stop; the task may still wind down and release on its own.
    StopRequested,
    /// Hard-killed; every footprint in the manager has been cleaned up.
    Terminated,
}

impl CancelState {
    /// Returns `true` unless the task has been force-terminated.
    pub fn is_alive(&self) -> bool {
        !matches!(self, CancelState::Terminated)
    }
}
