use std::time::Duration;

use serde::Serialize;

use crate::{RequestId, ResourceName, TargetSpec, TaskId};

/// Why resources went back to the pool or a request left the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReleaseCause {
    /// The task released its grant after the body completed.
    Completed,
    /// A manual reservation was lifted.
    Unreserved,
    /// The task withdrew its own request before it was granted.
    Withdrawn,
    /// The task was asked to stop before its request was granted.
    Stopped,
    /// The task was force-terminated.
    Terminated,
}

impl ReleaseCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseCause::Completed => "completed",
            ReleaseCause::Unreserved => "unreserved",
            ReleaseCause::Withdrawn => "withdrawn",
            ReleaseCause::Stopped => "stopped",
            ReleaseCause::Terminated => "terminated",
        }
    }
}

/// Something observable that happened inside the manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum LockEvent {
    ResourceRegistered {
        name: ResourceName,
    },
    ResourceRemoved {
        name: ResourceName,
    },
    Submitted {
        request: RequestId,
        task: TaskId,
        target: TargetSpec,
    },
    Granted {
        request: RequestId,
        task: TaskId,
        resources: Vec<ResourceName>,
        waited: Duration,
    },
    Released {
        request: RequestId,
        task: TaskId,
        resources: Vec<ResourceName>,
        cause: ReleaseCause,
    },
    Cancelled {
        request: RequestId,
        task: TaskId,
        cause: ReleaseCause,
    },
    StopRequested {
        task: TaskId,
    },
    Terminated {
        task: TaskId,
    },
}

impl LockEvent {
    /// Short symbolic name of the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            LockEvent::ResourceRegistered { .. } => "resourceRegistered",
            LockEvent::ResourceRemoved { .. } => "resourceRemoved",
            LockEvent::Submitted { .. } => "submitted",
            LockEvent::Granted { .. } => "granted",
            LockEvent::Released { .. } => "released",
            LockEvent::Cancelled { .. } => "cancelled",
            LockEvent::StopRequested { .. } => "stopRequested",
            LockEvent::Terminated { .. } => "terminated",
        }
    }

    /// Task the event refers to, if any.
    pub fn task(&self) -> Option<&TaskId> {
        match self {
            LockEvent::ResourceRegistered { .. } | LockEvent::ResourceRemoved { .. } => None,
            LockEvent::Submitted { task, .. }
            | LockEvent::Granted { task, .. }
            | LockEvent::Released { task, .. }
            | LockEvent::Cancelled { task, .. }
            | LockEvent::StopRequested { task }
            | LockEvent::Terminated { task } => Some(task),
        }
    }

    /// Request the event refers to, if any.
    pub fn request(&self) -> Option<RequestId> {
        match self {
            LockEvent::Submitted { request, .. }
            | LockEvent::Granted { request, .. }
            | LockEvent::Released { request, .. }
            | LockEvent::Cancelled { request, .. } => Some(*request),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_serialized_tag() {
        let ev = LockEvent::Terminated {
            task: TaskId::from("t1"),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["kind"], ev.kind());
        assert_eq!(json["task"], "t1");
    }

    #[test]
    fn accessors() {
        let ev = LockEvent::Cancelled {
            request: RequestId::new(3),
            task: TaskId::from("t1"),
            cause: ReleaseCause::Terminated,
        };
        assert_eq!(ev.request(), Some(RequestId::new(3)));
        assert_eq!(ev.task().map(TaskId::as_str), Some("t1"));

        let ev = LockEvent::ResourceRemoved { name: "r1".into() };
        assert!(ev.task().is_none());
        assert!(ev.request().is_none());
    }
}
