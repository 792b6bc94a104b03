//! Wait queue, allocation pass and the grant/release protocol.
//!
//! Everything here runs with the manager's mutex held: a method on [`State`]
//! is one atomic step with respect to every other submission, release or
//! termination.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    time::Instant,
};

use tokio::sync::oneshot;
use tracing::{debug, error, trace};

use lockable_model::{
    LockEvent, ReleaseCause, RequestId, RequestStatus, ResourceName, TargetSpec, TaskId,
};

use crate::{
    error::CoreError,
    lifecycle::TaskRecord,
    matcher,
    notify::Grant,
    registry::Registry,
};

/// A single outstanding lock call.
#[derive(Debug)]
pub(crate) struct LockRequest {
    pub(crate) id: RequestId,
    pub(crate) task: TaskId,
    pub(crate) target: TargetSpec,
    /// Arrival order; the fairness key.
    pub(crate) sequence: u64,
    pub(crate) status: RequestStatus,
    /// Resources bound once granted, empty while waiting.
    pub(crate) bound: Vec<ResourceName>,
    pub(crate) submitted_at: Instant,
    /// Wakes the suspended task; taken on grant so it fires at most once.
    notify: Option<oneshot::Sender<Grant>>,
}

/// Events produced while the state was locked, published after unlocking.
#[derive(Debug, Default)]
pub(crate) struct Effects {
    pub(crate) events: Vec<LockEvent>,
}

impl Effects {
    #[inline]
    pub(crate) fn push(&mut self, event: LockEvent) {
        self.events.push(event);
    }
}

/// Recently cancelled request ids, so `status` can still answer for them.
#[derive(Debug)]
struct Tombstones {
    order: VecDeque<RequestId>,
    ids: HashSet<RequestId>,
    capacity: usize,
}

impl Tombstones {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::new(),
            ids: HashSet::new(),
            capacity,
        }
    }

    fn insert(&mut self, id: RequestId) {
        if self.capacity == 0 {
            return;
        }
        if self.order.len() == self.capacity
            && let Some(old) = self.order.pop_front()
        {
            self.ids.remove(&old);
        }
        self.order.push_back(id);
        self.ids.insert(id);
    }

    fn contains(&self, id: &RequestId) -> bool {
        self.ids.contains(id)
    }
}

/// All shared mutable state of the manager.
#[derive(Debug)]
pub(crate) struct State {
    pub(crate) registry: Registry,
    /// Waiting request ids in ascending sequence order.
    queue: VecDeque<RequestId>,
    /// Waiting and granted requests.
    pub(crate) requests: HashMap<RequestId, LockRequest>,
    pub(crate) tasks: HashMap<TaskId, TaskRecord>,
    tombstones: Tombstones,
    next_sequence: u64,
}

impl State {
    pub(crate) fn new(tombstone_capacity: usize) -> Self {
        Self {
            registry: Registry::new(),
            queue: VecDeque::new(),
            requests: HashMap::new(),
            tasks: HashMap::new(),
            tombstones: Tombstones::new(tombstone_capacity),
            next_sequence: 1,
        }
    }

    /// Append a new waiting request and run an allocation pass.
    pub(crate) fn submit(
        &mut self,
        task: &TaskId,
        target: TargetSpec,
        fx: &mut Effects,
    ) -> Result<(RequestId, oneshot::Receiver<Grant>), CoreError> {
        self.admit(task, &target)?;

        let (tx, rx) = oneshot::channel();
        let req = self.new_request(task, target, Some(tx));
        let id = req.id;
        if !matcher::is_feasible(&req.target, &self.registry) {
            debug!(request = %id, "request cannot be met by the registered resources yet");
        }

        fx.push(LockEvent::Submitted {
            request: id,
            task: task.clone(),
            target: req.target.clone(),
        });
        self.track(req);
        self.queue.push_back(id);

        self.allocate(fx);
        if self.status(id) == Ok(RequestStatus::Waiting) {
            debug!(request = %id, task = %task, "request queued, waiting for resources");
        }
        Ok((id, rx))
    }

    /// Grant right away if the target is free now; never enqueues.
    pub(crate) fn try_grant(
        &mut self,
        task: &TaskId,
        target: TargetSpec,
        fx: &mut Effects,
    ) -> Result<Option<Grant>, CoreError> {
        self.admit(task, &target)?;

        let Some(chosen) = matcher::find_match(&target, &self.registry) else {
            trace!(task = %task, "target busy, not waiting");
            return Ok(None);
        };

        let req = self.new_request(task, target, None);
        let id = req.id;
        self.registry.occupy_all(&chosen, id)?;

        fx.push(LockEvent::Submitted {
            request: id,
            task: task.clone(),
            target: req.target.clone(),
        });
        self.track(req);
        Ok(self.mark_granted(id, chosen, fx))
    }

    /// One allocation pass over the wait queue.
    ///
    /// Scans in sequence order against the shrinking free set. An unmatched
    /// request does not stop the scan, so independent requests behind it can
    /// still be granted.
    pub(crate) fn allocate(&mut self, fx: &mut Effects) {
        if self.queue.is_empty() || !self.registry.has_free() {
            return;
        }

        let mut granted = Vec::new();
        for id in &self.queue {
            let Some(req) = self.requests.get(id) else {
                continue;
            };
            let Some(chosen) = matcher::find_match(&req.target, &self.registry) else {
                trace!(request = %id, "not satisfiable in this pass");
                continue;
            };
            if let Err(e) = self.registry.occupy_all(&chosen, *id) {
                error!(request = %id, error = %e, "matched resources could not be occupied");
                continue;
            }
            granted.push((*id, chosen));
        }

        if granted.is_empty() {
            return;
        }

        let done: HashSet<RequestId> = granted.iter().map(|(id, _)| *id).collect();
        self.queue.retain(|id| !done.contains(id));
        for (id, chosen) in granted {
            self.mark_granted(id, chosen, fx);
        }
    }

    /// Free a granted request's resources, drop it, then run a pass.
    pub(crate) fn release(
        &mut self,
        id: RequestId,
        cause: ReleaseCause,
        fx: &mut Effects,
    ) -> Result<Vec<ResourceName>, CoreError> {
        let freed = self.free_request(id, cause, fx)?;
        self.allocate(fx);
        Ok(freed)
    }

    /// Release without the follow-up allocation pass.
    pub(crate) fn free_request(
        &mut self,
        id: RequestId,
        cause: ReleaseCause,
        fx: &mut Effects,
    ) -> Result<Vec<ResourceName>, CoreError> {
        if !self
            .requests
            .get(&id)
            .is_some_and(|r| r.status == RequestStatus::Granted)
        {
            return Err(CoreError::NotGranted(id));
        }
        let req = self
            .requests
            .remove(&id)
            .ok_or(CoreError::NotGranted(id))?;

        for name in &req.bound {
            if let Err(e) = self.registry.free(name) {
                error!(request = %id, resource = %name, error = %e, "bound resource was not held");
            }
        }
        self.untrack(&req.task, id);

        debug!(request = %id, task = %req.task, cause = cause.as_str(), resources = ?req.bound, "resources released");
        fx.push(LockEvent::Released {
            request: id,
            task: req.task,
            resources: req.bound.clone(),
            cause,
        });
        Ok(req.bound)
    }

    /// Withdraw a request that has not been granted yet.
    pub(crate) fn cancel_waiting(
        &mut self,
        id: RequestId,
        cause: ReleaseCause,
        fx: &mut Effects,
    ) -> Result<(), CoreError> {
        match self.requests.get(&id).map(|r| r.status) {
            Some(RequestStatus::Waiting) => {}
            Some(_) => return Err(CoreError::NotWaiting(id)),
            None => return Err(CoreError::RequestNotFound(id)),
        }
        let Some(req) = self.requests.remove(&id) else {
            return Err(CoreError::RequestNotFound(id));
        };

        // Dropping `req.notify` wakes the waiter with a cancellation.
        self.queue.retain(|q| *q != id);
        self.tombstones.insert(id);
        self.untrack(&req.task, id);

        debug!(request = %id, task = %req.task, cause = cause.as_str(), "waiting request cancelled");
        fx.push(LockEvent::Cancelled {
            request: id,
            task: req.task,
            cause,
        });
        Ok(())
    }

    pub(crate) fn status(&self, id: RequestId) -> Result<RequestStatus, CoreError> {
        if let Some(req) = self.requests.get(&id) {
            return Ok(req.status);
        }
        if self.tombstones.contains(&id) {
            return Ok(RequestStatus::Cancelled);
        }
        Err(CoreError::RequestNotFound(id))
    }

    pub(crate) fn request(&self, id: RequestId) -> Option<&LockRequest> {
        self.requests.get(&id)
    }

    /// Waiting request ids in the order they will be considered.
    pub(crate) fn queue(&self) -> Vec<RequestId> {
        self.queue.iter().copied().collect()
    }

    #[inline]
    pub(crate) fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    /// Checks shared by every entry point that creates a request.
    fn admit(&self, task: &TaskId, target: &TargetSpec) -> Result<(), CoreError> {
        target.validate()?;
        if self
            .tasks
            .get(task)
            .is_some_and(|t| !t.state.is_alive())
        {
            return Err(CoreError::TaskTerminated(task.clone()));
        }
        if let TargetSpec::Names(names) = target {
            for name in names {
                self.registry.lookup(name)?;
            }
        }
        Ok(())
    }

    fn new_request(
        &mut self,
        task: &TaskId,
        target: TargetSpec,
        notify: Option<oneshot::Sender<Grant>>,
    ) -> LockRequest {
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        LockRequest {
            id: RequestId::new(sequence),
            task: task.clone(),
            target,
            sequence,
            status: RequestStatus::Waiting,
            bound: Vec::new(),
            submitted_at: Instant::now(),
            notify,
        }
    }

    fn track(&mut self, req: LockRequest) {
        self.tasks
            .entry(req.task.clone())
            .or_insert_with(TaskRecord::new)
            .requests
            .insert(req.id);
        self.requests.insert(req.id, req);
    }

    /// Forget the request; an active task left with nothing is dropped too.
    fn untrack(&mut self, task: &TaskId, id: RequestId) {
        let Some(record) = self.tasks.get_mut(task) else {
            return;
        };
        record.requests.remove(&id);
        if record.is_idle() {
            self.tasks.remove(task);
        }
    }

    /// Record the binding and wake the task. Resources must already be occupied.
    fn mark_granted(
        &mut self,
        id: RequestId,
        chosen: Vec<ResourceName>,
        fx: &mut Effects,
    ) -> Option<Grant> {
        let req = self.requests.get_mut(&id)?;
        req.status = RequestStatus::Granted;
        req.bound = chosen;

        let grant = Grant {
            request: id,
            task: req.task.clone(),
            resources: req.bound.clone(),
        };
        if let Some(tx) = req.notify.take() {
            // The receiver may already be gone; the grant stands regardless.
            let _ = tx.send(grant.clone());
        }

        debug!(request = %id, task = %req.task, sequence = req.sequence, resources = ?req.bound, "lock granted");
        fx.push(LockEvent::Granted {
            request: id,
            task: req.task.clone(),
            resources: req.bound.clone(),
            waited: req.submitted_at.elapsed(),
        });
        Some(grant)
    }
}
