//! Graceful stop and hard kill of tasks.
//!
//! The two signals are independent: a stop is advisory for anything already
//! granted, a termination cleans up every footprint of the task without its
//! cooperation.

use std::collections::BTreeSet;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use lockable_model::{CancelState, LockEvent, ReleaseCause, RequestId, RequestStatus, TaskId};

use crate::scheduler::{Effects, State};

/// What the manager knows about a task.
#[derive(Debug)]
pub(crate) struct TaskRecord {
    pub(crate) state: CancelState,
    /// Outstanding requests (waiting or granted) owned by the task.
    pub(crate) requests: BTreeSet<RequestId>,
    /// Cancelled on stop and on termination.
    pub(crate) stop: CancellationToken,
    /// A stop token was handed out, so the record must outlive its requests.
    pub(crate) watched: bool,
}

impl TaskRecord {
    pub(crate) fn new() -> Self {
        Self {
            state: CancelState::Active,
            requests: BTreeSet::new(),
            stop: CancellationToken::new(),
            watched: false,
        }
    }

    /// Nothing would be lost by dropping the record.
    pub(crate) fn is_idle(&self) -> bool {
        self.state == CancelState::Active && self.requests.is_empty() && !self.watched
    }
}

/// Footprint removed by a forced termination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Termination {
    /// Waiting requests taken out of the queue.
    pub cancelled: Vec<RequestId>,
    /// Granted requests whose resources were freed.
    pub released: Vec<RequestId>,
}

impl Termination {
    pub fn is_empty(&self) -> bool {
        self.cancelled.is_empty() && self.released.is_empty()
    }
}

impl State {
    /// Mark the task as asked to stop.
    ///
    /// Waiting requests are withdrawn; granted ones stay granted until the
    /// task releases them or is terminated.
    pub(crate) fn request_stop(&mut self, task: &TaskId, fx: &mut Effects) -> CancelState {
        let record = self
            .tasks
            .entry(task.clone())
            .or_insert_with(TaskRecord::new);
        if record.state == CancelState::Terminated {
            return CancelState::Terminated;
        }

        record.state = CancelState::StopRequested;
        record.stop.cancel();
        let waiting: Vec<RequestId> = record
            .requests
            .iter()
            .copied()
            .filter(|id| {
                self.requests
                    .get(id)
                    .is_some_and(|r| r.status == RequestStatus::Waiting)
            })
            .collect();

        debug!(task = %task, waiting = waiting.len(), "stop requested");
        fx.push(LockEvent::StopRequested { task: task.clone() });
        for id in waiting {
            // Only waiting ids were collected, so this cannot fail.
            let _ = self.cancel_waiting(id, ReleaseCause::Stopped, fx);
        }
        CancelState::StopRequested
    }

    /// Remove every footprint of the task, whatever state it is in.
    ///
    /// Total and idempotent: waiting requests are cancelled, granted ones are
    /// released as if the task had released them itself, and a single
    /// allocation pass follows when anything was freed.
    pub(crate) fn force_terminate(&mut self, task: &TaskId, fx: &mut Effects) -> Termination {
        let record = self
            .tasks
            .entry(task.clone())
            .or_insert_with(TaskRecord::new);
        let first = record.state != CancelState::Terminated;
        record.state = CancelState::Terminated;
        record.stop.cancel();
        let owned: Vec<RequestId> = record.requests.iter().copied().collect();

        if first {
            fx.push(LockEvent::Terminated { task: task.clone() });
        }

        let mut report = Termination::default();
        for id in owned {
            match self.requests.get(&id).map(|r| r.status) {
                Some(RequestStatus::Waiting) => {
                    if self
                        .cancel_waiting(id, ReleaseCause::Terminated, fx)
                        .is_ok()
                    {
                        report.cancelled.push(id);
                    }
                }
                Some(RequestStatus::Granted) => {
                    if self
                        .free_request(id, ReleaseCause::Terminated, fx)
                        .is_ok()
                    {
                        report.released.push(id);
                    }
                }
                _ => {}
            }
        }

        if !report.released.is_empty() {
            self.allocate(fx);
        }
        if !report.is_empty() {
            info!(
                task = %task,
                cancelled = report.cancelled.len(),
                released = report.released.len(),
                "task terminated, footprint cleaned up"
            );
        }
        report
    }

    pub(crate) fn stop_token(&mut self, task: &TaskId) -> CancellationToken {
        let record = self
            .tasks
            .entry(task.clone())
            .or_insert_with(TaskRecord::new);
        record.watched = true;
        record.stop.clone()
    }

    pub(crate) fn cancel_state(&self, task: &TaskId) -> Option<CancelState> {
        self.tasks.get(task).map(|t| t.state)
    }

    /// Drop the record of a task that owns nothing any more.
    ///
    /// Active tasks are pruned on their own once their last request ends;
    /// this is for stopped, terminated or watched ones.
    pub(crate) fn forget(&mut self, task: &TaskId) -> bool {
        if self
            .tasks
            .get(task)
            .is_some_and(|t| t.requests.is_empty())
        {
            self.tasks.remove(task);
            return true;
        }
        false
    }

    /// Requests currently owned by the task, in submission order.
    pub(crate) fn task_requests(&self, task: &TaskId) -> Vec<RequestId> {
        self.tasks
            .get(task)
            .map(|t| t.requests.iter().copied().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockable_model::{ResourceDef, TargetSpec};

    use crate::error::CoreError;

    fn setup() -> State {
        let mut state = State::new(16);
        state.registry.register(&ResourceDef::new("r1")).unwrap();
        state.registry.register(&ResourceDef::new("r2")).unwrap();
        state
    }

    fn submit(state: &mut State, task: &str, target: TargetSpec) -> RequestId {
        let mut fx = Effects::default();
        state.submit(&TaskId::from(task), target, &mut fx).unwrap().0
    }

    #[test]
    fn terminate_holder_hands_resource_to_next_in_line() {
        let mut state = setup();
        let held = submit(&mut state, "t1", TargetSpec::name("r1"));
        let second = submit(&mut state, "t2", TargetSpec::name("r1"));
        let third = submit(&mut state, "t3", TargetSpec::name("r1"));

        let mut fx = Effects::default();
        let report = state.force_terminate(&TaskId::from("t1"), &mut fx);

        assert_eq!(report.released, vec![held]);
        assert!(report.cancelled.is_empty());
        assert_eq!(state.status(second), Ok(RequestStatus::Granted));
        assert_eq!(state.status(third), Ok(RequestStatus::Waiting));
        assert_eq!(
            state.cancel_state(&TaskId::from("t1")),
            Some(CancelState::Terminated)
        );
    }

    #[test]
    fn terminate_waiter_is_clean() {
        let mut state = setup();
        let held = submit(&mut state, "t1", TargetSpec::name("r1"));
        let waiting = submit(&mut state, "t2", TargetSpec::name("r1"));

        let mut fx = Effects::default();
        let report = state.force_terminate(&TaskId::from("t2"), &mut fx);

        assert_eq!(report.cancelled, vec![waiting]);
        assert!(report.released.is_empty());
        assert_eq!(state.status(waiting), Ok(RequestStatus::Cancelled));
        assert_eq!(state.status(held), Ok(RequestStatus::Granted));
        assert!(state.queue().is_empty());
        assert!(!state.registry.is_free("r1"));
    }

    #[test]
    fn terminate_is_idempotent() {
        let mut state = setup();
        submit(&mut state, "t1", TargetSpec::name("r1"));
        let task = TaskId::from("t1");

        let mut fx = Effects::default();
        let first = state.force_terminate(&task, &mut fx);
        let second = state.force_terminate(&task, &mut fx);

        assert_eq!(first.released.len(), 1);
        assert!(second.is_empty());
        let terminated = fx
            .events
            .iter()
            .filter(|e| matches!(e, LockEvent::Terminated { .. }))
            .count();
        assert_eq!(terminated, 1);
        assert!(state.registry.is_free("r1"));
    }

    #[test]
    fn terminate_unknown_task_is_total() {
        let mut state = setup();
        let mut fx = Effects::default();
        let report = state.force_terminate(&TaskId::from("ghost"), &mut fx);
        assert!(report.is_empty());
    }

    #[test]
    fn release_after_terminate_is_not_granted() {
        let mut state = setup();
        let held = submit(&mut state, "t1", TargetSpec::name("r1"));
        let mut fx = Effects::default();
        state.force_terminate(&TaskId::from("t1"), &mut fx);

        assert_eq!(
            state.release(held, ReleaseCause::Completed, &mut fx),
            Err(CoreError::NotGranted(held))
        );
        assert!(state.registry.is_free("r1"));
    }

    #[test]
    fn terminated_task_cannot_submit() {
        let mut state = setup();
        let task = TaskId::from("t1");
        let mut fx = Effects::default();
        state.force_terminate(&task, &mut fx);

        let err = state
            .submit(&task, TargetSpec::name("r1"), &mut fx)
            .unwrap_err();
        assert_eq!(err, CoreError::TaskTerminated(task));
    }

    #[test]
    fn stop_is_advisory_for_granted_requests() {
        let mut state = setup();
        let held = submit(&mut state, "t1", TargetSpec::name("r1"));
        let task = TaskId::from("t1");
        let token = state.stop_token(&task);

        let mut fx = Effects::default();
        assert_eq!(state.request_stop(&task, &mut fx), CancelState::StopRequested);

        assert!(token.is_cancelled());
        assert_eq!(state.status(held), Ok(RequestStatus::Granted));
        assert!(!state.registry.is_free("r1"));
    }

    #[test]
    fn stop_withdraws_waiting_requests() {
        let mut state = setup();
        submit(&mut state, "t1", TargetSpec::name("r1"));
        let waiting = submit(&mut state, "t2", TargetSpec::name("r1"));

        let mut fx = Effects::default();
        state.request_stop(&TaskId::from("t2"), &mut fx);

        assert_eq!(state.status(waiting), Ok(RequestStatus::Cancelled));
        assert!(fx.events.iter().any(|e| matches!(
            e,
            LockEvent::Cancelled {
                cause: ReleaseCause::Stopped,
                ..
            }
        )));
    }

    #[test]
    fn stop_after_terminate_keeps_terminated() {
        let mut state = setup();
        let task = TaskId::from("t1");
        let mut fx = Effects::default();
        state.force_terminate(&task, &mut fx);
        assert_eq!(state.request_stop(&task, &mut fx), CancelState::Terminated);
    }

    #[test]
    fn terminate_with_several_requests() {
        let mut state = setup();
        let a = submit(&mut state, "t1", TargetSpec::name("r1"));
        let b = submit(&mut state, "t1", TargetSpec::name("r2"));
        let waiting = submit(&mut state, "t2", TargetSpec::names(["r1", "r2"]));

        let mut fx = Effects::default();
        let report = state.force_terminate(&TaskId::from("t1"), &mut fx);

        assert_eq!(report.released, vec![a, b]);
        assert_eq!(state.status(waiting), Ok(RequestStatus::Granted));
    }

    #[test]
    fn finished_tasks_leave_no_record() {
        let mut state = setup();
        let mut fx = Effects::default();
        for i in 0..1000 {
            let id = submit(&mut state, &format!("build-{i}"), TargetSpec::name("r1"));
            state.release(id, ReleaseCause::Completed, &mut fx).unwrap();
        }
        assert!(state.tasks.is_empty());

        let waiting = {
            submit(&mut state, "holder", TargetSpec::name("r1"));
            submit(&mut state, "quitter", TargetSpec::name("r1"))
        };
        state.cancel_waiting(waiting, ReleaseCause::Withdrawn, &mut fx).unwrap();
        assert!(state.cancel_state(&TaskId::from("quitter")).is_none());
        assert_eq!(state.tasks.len(), 1);
    }

    #[test]
    fn stopped_killed_and_watched_tasks_keep_their_record() {
        let mut state = setup();
        let mut fx = Effects::default();

        let killed = TaskId::from("killed");
        let id = submit(&mut state, "killed", TargetSpec::name("r1"));
        state.force_terminate(&killed, &mut fx);
        assert_eq!(state.status(id), Err(CoreError::RequestNotFound(id)));
        assert_eq!(state.cancel_state(&killed), Some(CancelState::Terminated));

        let stopped = TaskId::from("stopped");
        let id = submit(&mut state, "stopped", TargetSpec::name("r1"));
        state.request_stop(&stopped, &mut fx);
        state.release(id, ReleaseCause::Completed, &mut fx).unwrap();
        assert_eq!(state.cancel_state(&stopped), Some(CancelState::StopRequested));

        let watched = TaskId::from("watched");
        let token = state.stop_token(&watched);
        let id = submit(&mut state, "watched", TargetSpec::name("r1"));
        state.release(id, ReleaseCause::Completed, &mut fx).unwrap();
        assert_eq!(state.cancel_state(&watched), Some(CancelState::Active));
        state.request_stop(&watched, &mut fx);
        assert!(token.is_cancelled());
    }

    #[test]
    fn forget_only_idle_tasks() {
        let mut state = setup();
        submit(&mut state, "t1", TargetSpec::name("r1"));
        let task = TaskId::from("t1");
        assert!(!state.forget(&task));

        let mut fx = Effects::default();
        state.force_terminate(&task, &mut fx);
        assert!(state.forget(&task));
        assert!(state.cancel_state(&task).is_none());
    }
}
