use lockable_model::{RequestId, ResourceName, TaskId};
use tracing::trace;

use crate::{error::CoreError, manager::LockManager, notify::Grant};

/// Held grant that is released when dropped.
///
/// If the task was force-terminated in the meantime the resources are
/// already back in the pool and the drop does nothing.
pub struct LockGuard {
    manager: LockManager,
    grant: Grant,
    released: bool,
}

impl LockGuard {
    pub(crate) fn new(manager: LockManager, grant: Grant) -> Self {
        Self {
            manager,
            grant,
            released: false,
        }
    }

    pub fn id(&self) -> RequestId {
        self.grant.request
    }

    pub fn task(&self) -> &TaskId {
        &self.grant.task
    }

    pub fn resources(&self) -> &[ResourceName] {
        &self.grant.resources
    }

    /// Release now and report the outcome.
    pub fn release(mut self) -> Result<Vec<ResourceName>, CoreError> {
        self.released = true;
        self.manager.release(self.grant.request)
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.manager.release_granted(self.grant.request) {
            trace!(request = %self.grant.request, error = %e, "guard dropped after grant was gone");
        }
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("grant", &self.grant)
            .field("released", &self.released)
            .finish()
    }
}

/// Withdraws a submitted request unless disarmed once it is granted.
pub(crate) struct PendingRequest {
    manager: LockManager,
    id: RequestId,
    armed: bool,
}

impl PendingRequest {
    pub(crate) fn new(manager: LockManager, id: RequestId) -> Self {
        Self {
            manager,
            id,
            armed: true,
        }
    }

    pub(crate) fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        if self.armed {
            self.manager.abandon(self.id);
        }
    }
}
