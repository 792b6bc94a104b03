use std::sync::Arc;

use tokio::sync::oneshot;

use lockable_model::{LockEvent, RequestId, ResourceName, TaskId};

use crate::error::CoreError;

/// Resources bound to a request at the moment it was granted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub request: RequestId,
    pub task: TaskId,
    pub resources: Vec<ResourceName>,
}

/// Handle returned by a submission.
///
/// Resolves exactly once: with the [`Grant`] when the scheduler binds
/// resources, or with [`CoreError::Cancelled`] if the request leaves the
/// queue without being granted.
#[derive(Debug)]
pub struct Ticket {
    request: RequestId,
    task: TaskId,
    rx: oneshot::Receiver<Grant>,
}

impl Ticket {
    pub(crate) fn new(request: RequestId, task: TaskId, rx: oneshot::Receiver<Grant>) -> Self {
        Self { request, task, rx }
    }

    pub fn id(&self) -> RequestId {
        self.request
    }

    pub fn task(&self) -> &TaskId {
        &self.task
    }

    /// Non-blocking check; returns the grant if it has already been issued.
    pub fn try_granted(&mut self) -> Option<Grant> {
        self.rx.try_recv().ok()
    }

    /// Suspend until the request is granted or cancelled.
    pub async fn granted(self) -> Result<Grant, CoreError> {
        self.rx.await.map_err(|_| CoreError::Cancelled(self.request))
    }
}

/// Observer of manager events.
///
/// Called after the manager has left its critical section, in the order the
/// events were produced by a single operation. Implementations must not block.
pub trait Subscribe: Send + Sync {
    fn on_event(&self, event: &LockEvent);

    fn name(&self) -> &'static str;
}

pub(crate) fn publish(subscribers: &[Arc<dyn Subscribe>], events: &[LockEvent]) {
    for event in events {
        for sub in subscribers {
            sub.on_event(event);
        }
    }
}
