use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use lockable_model::{
    CancelState, Labels, LockEvent, ReleaseCause, RequestId, RequestStatus, Resource,
    ResourceDef, ResourceName, ResourcePage, ResourceQuery, TargetSpec, TaskId,
};

use crate::{
    config::ManagerConfig,
    error::CoreError,
    guard::{LockGuard, PendingRequest},
    lifecycle::Termination,
    metrics::{self, MetricsBackend, NoopMetrics},
    notify::{self, Grant, Subscribe, Ticket},
    scheduler::{Effects, State},
};

/// Arbitrates access to named and labeled resources among tasks.
///
/// Cheap to clone; every clone talks to the same state. All mutating calls
/// go through one mutex, so allocation passes never interleave and a forced
/// termination racing a release frees the resources exactly once.
#[derive(Clone)]
pub struct LockManager {
    inner: Arc<Shared>,
}

struct Shared {
    state: Mutex<State>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    metrics: Arc<dyn MetricsBackend>,
}

/// Builder for [`LockManager`].
pub struct ManagerBuilder {
    config: ManagerConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    metrics: Arc<dyn MetricsBackend>,
}

impl ManagerBuilder {
    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers.extend(subscribers);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsBackend>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Register the configured resources and restore manual reservations.
    pub fn build(self) -> Result<LockManager, CoreError> {
        let manager = LockManager {
            inner: Arc::new(Shared {
                state: Mutex::new(State::new(self.config.tombstone_capacity)),
                subscribers: self.subscribers,
                metrics: self.metrics,
            }),
        };

        for def in &self.config.resources {
            manager.register(def.clone())?;
        }
        for def in &self.config.resources {
            if let Some(owner) = &def.reserved_by {
                manager.reserve(owner, std::slice::from_ref(&def.name))?;
            }
        }

        info!(
            resources = self.config.resources.len(),
            subscribers = manager.inner.subscribers.len(),
            "lock manager is ready"
        );
        Ok(manager)
    }
}

impl LockManager {
    pub fn builder(config: ManagerConfig) -> ManagerBuilder {
        ManagerBuilder {
            config,
            subscribers: Vec::new(),
            metrics: Arc::new(NoopMetrics),
        }
    }

    /// Manager with no resources, subscribers or metrics.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Shared {
                state: Mutex::new(State::new(ManagerConfig::default().tombstone_capacity)),
                subscribers: Vec::new(),
                metrics: Arc::new(NoopMetrics),
            }),
        }
    }

    pub fn from_config(config: ManagerConfig) -> Result<Self, CoreError> {
        Self::builder(config).build()
    }

    // ---- registry ----

    /// Add a resource; waiters naming it may be granted right away.
    #[instrument(level = "debug", skip(self, def), fields(resource = %def.name))]
    pub fn register(&self, def: ResourceDef) -> Result<(), CoreError> {
        self.mutate(|state, fx| {
            state.registry.register(&def)?;
            info!(resource = %def.name, labels = ?def.labels, "resource registered");
            fx.push(LockEvent::ResourceRegistered {
                name: def.name.clone(),
            });
            state.allocate(fx);
            Ok(())
        })
    }

    /// Shorthand for registering a resource with labels.
    pub fn register_resource<I, S>(&self, name: &str, labels: I) -> Result<(), CoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut def = ResourceDef::new(name);
        def.labels = labels.into_iter().map(Into::into).collect();
        self.register(def)
    }

    /// Delete a free resource.
    #[instrument(level = "debug", skip(self))]
    pub fn remove(&self, name: &str) -> Result<Resource, CoreError> {
        self.mutate(|state, fx| {
            let res = state.registry.remove(name)?;
            fx.push(LockEvent::ResourceRemoved {
                name: res.name.clone(),
            });
            Ok(res)
        })
    }

    /// Replace labels of a free resource; label waiters may become satisfiable.
    pub fn set_labels(&self, name: &str, labels: Labels) -> Result<(), CoreError> {
        self.mutate(|state, fx| {
            state.registry.set_labels(name, labels)?;
            state.allocate(fx);
            Ok(())
        })
    }

    pub fn set_note(&self, name: &str, note: impl Into<String>) -> Result<(), CoreError> {
        let note = note.into();
        self.mutate(|state, _| state.registry.set_note(name, note))
    }

    pub fn resource(&self, name: &str) -> Result<Resource, CoreError> {
        self.read(|state| state.registry.lookup(name).cloned())
    }

    /// Resources carrying `label`, in name order.
    pub fn by_label(&self, label: &str) -> Vec<Resource> {
        self.read(|state| state.registry.by_label(label).into_iter().cloned().collect())
    }

    pub fn resources(&self, query: &ResourceQuery) -> ResourcePage<Resource> {
        self.read(|state| state.registry.query(query))
    }

    /// Request and task currently holding `name`, if any.
    pub fn holder_of(&self, name: &str) -> Result<Option<(RequestId, TaskId)>, CoreError> {
        self.read(|state| {
            let res = state.registry.lookup(name)?;
            Ok(res.holder.and_then(|id| {
                state
                    .request(id)
                    .map(|req| (id, req.task.clone()))
            }))
        })
    }

    // ---- queue & scheduler ----

    /// Enqueue a lock request and run an allocation pass before returning.
    ///
    /// A request that is satisfiable right away comes back already granted;
    /// otherwise await [`Ticket::granted`].
    #[instrument(level = "debug", skip(self, target), fields(task = %task, kind = target.kind()))]
    pub fn submit(&self, task: &TaskId, target: TargetSpec) -> Result<Ticket, CoreError> {
        let (id, rx) = self.mutate(|state, fx| state.submit(task, target, fx))?;
        Ok(Ticket::new(id, task.clone(), rx))
    }

    /// Grant immediately or return `None`; nothing is queued.
    #[instrument(level = "debug", skip(self, target), fields(task = %task, kind = target.kind()))]
    pub fn try_submit(&self, task: &TaskId, target: TargetSpec) -> Result<Option<Grant>, CoreError> {
        self.mutate(|state, fx| state.try_grant(task, target, fx))
    }

    /// Submit and suspend until granted.
    ///
    /// The returned guard releases on drop. If this future is dropped while
    /// still waiting, the request is withdrawn.
    pub async fn lock(&self, task: &TaskId, target: TargetSpec) -> Result<LockGuard, CoreError> {
        let ticket = self.submit(task, target)?;
        let pending = PendingRequest::new(self.clone(), ticket.id());
        let grant = ticket.granted().await?;
        pending.disarm();
        Ok(LockGuard::new(self.clone(), grant))
    }

    /// Free the resources of a granted request and run an allocation pass.
    #[instrument(level = "debug", skip(self))]
    pub fn release(&self, id: RequestId) -> Result<Vec<ResourceName>, CoreError> {
        let res = self.release_granted(id);
        if let Err(CoreError::NotGranted(_)) = &res {
            warn!(request = %id, "release of a request that is not granted");
        }
        res
    }

    pub(crate) fn release_granted(&self, id: RequestId) -> Result<Vec<ResourceName>, CoreError> {
        self.mutate(|state, fx| state.release(id, ReleaseCause::Completed, fx))
    }

    /// Withdraw a request that is still waiting.
    #[instrument(level = "debug", skip(self))]
    pub fn cancel(&self, id: RequestId) -> Result<(), CoreError> {
        self.mutate(|state, fx| state.cancel_waiting(id, ReleaseCause::Withdrawn, fx))
    }

    /// Withdraw if waiting, release if it got granted meanwhile.
    pub(crate) fn abandon(&self, id: RequestId) {
        self.mutate(|state, fx| match state.status(id) {
            Ok(RequestStatus::Waiting) => {
                let _ = state.cancel_waiting(id, ReleaseCause::Withdrawn, fx);
            }
            Ok(RequestStatus::Granted) => {
                let _ = state.release(id, ReleaseCause::Withdrawn, fx);
            }
            _ => {}
        });
    }

    pub fn status(&self, id: RequestId) -> Result<RequestStatus, CoreError> {
        self.read(|state| state.status(id))
    }

    /// Resources bound to a request; empty while it waits.
    pub fn bound(&self, id: RequestId) -> Result<Vec<ResourceName>, CoreError> {
        self.read(|state| {
            state
                .request(id)
                .map(|req| req.bound.clone())
                .ok_or(CoreError::RequestNotFound(id))
        })
    }

    /// Waiting request ids in the order the next pass will consider them.
    pub fn queue(&self) -> Vec<RequestId> {
        self.read(State::queue)
    }

    // ---- manual reservations ----

    /// Reserve free resources on behalf of `owner`, with no task body attached.
    #[instrument(level = "debug", skip(self, names))]
    pub fn reserve(&self, owner: &str, names: &[ResourceName]) -> Result<RequestId, CoreError> {
        let task = TaskId::manual(owner);
        let target = TargetSpec::Names(names.to_vec());
        self.mutate(|state, fx| {
            target.validate()?;
            let mut busy = Vec::new();
            for name in names {
                if !state.registry.lookup(name)?.is_free() {
                    busy.push(name.clone());
                }
            }
            if !busy.is_empty() {
                return Err(CoreError::ResourcesBusy(busy));
            }

            let grant = state
                .try_grant(&task, target, fx)?
                .ok_or_else(|| CoreError::ResourcesBusy(names.to_vec()))?;
            debug!(request = %grant.request, owner, "resources reserved");
            Ok(grant.request)
        })
    }

    /// Lift a manual reservation.
    #[instrument(level = "debug", skip(self))]
    pub fn unreserve(&self, id: RequestId) -> Result<Vec<ResourceName>, CoreError> {
        self.mutate(|state, fx| {
            let req = state.request(id).ok_or(CoreError::NotGranted(id))?;
            if !req.task.is_manual() {
                return Err(CoreError::NotReserved(id));
            }
            state.release(id, ReleaseCause::Unreserved, fx)
        })
    }

    // ---- lifecycle ----

    /// Signal a graceful stop: waiting requests are withdrawn, grants stay.
    #[instrument(level = "debug", skip(self), fields(task = %task))]
    pub fn request_stop(&self, task: &TaskId) -> CancelState {
        self.mutate(|state, fx| state.request_stop(task, fx))
    }

    /// Hard kill: clean up every request of the task. Never fails.
    #[instrument(level = "debug", skip(self), fields(task = %task))]
    pub fn force_terminate(&self, task: &TaskId) -> Termination {
        self.mutate(|state, fx| state.force_terminate(task, fx))
    }

    /// Token cancelled when the task is asked to stop or terminated.
    pub fn stop_token(&self, task: &TaskId) -> CancellationToken {
        self.mutate(|state, _| state.stop_token(task))
    }

    pub fn cancel_state(&self, task: &TaskId) -> Option<CancelState> {
        self.read(|state| state.cancel_state(task))
    }

    /// Requests currently owned by the task.
    pub fn task_requests(&self, task: &TaskId) -> Vec<RequestId> {
        self.read(|state| state.task_requests(task))
    }

    /// Drop the record of a task that owns nothing any more.
    pub fn forget(&self, task: &TaskId) -> bool {
        self.mutate(|state, _| state.forget(task))
    }

    // ---- plumbing ----

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn read<R>(&self, f: impl FnOnce(&State) -> R) -> R {
        f(&*self.lock_state())
    }

    /// Run `f` inside the critical section, then publish what it produced.
    ///
    /// The queue depth gauge is set before unlocking so concurrent callers
    /// cannot overwrite it out of order.
    fn mutate<R>(&self, f: impl FnOnce(&mut State, &mut Effects) -> R) -> R {
        let mut fx = Effects::default();
        let out = {
            let mut state = self.lock_state();
            let out = f(&mut *state, &mut fx);
            self.inner.metrics.set_queue_depth(state.queue_depth());
            out
        };
        self.dispatch(fx);
        out
    }

    fn dispatch(&self, fx: Effects) {
        let backend = self.inner.metrics.as_ref();
        for event in &fx.events {
            metrics::observe(backend, event);
        }
        notify::publish(&self.inner.subscribers, &fx.events);
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}
