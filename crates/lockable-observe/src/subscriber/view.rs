use std::borrow::Borrow;

use lockable_model::LockEvent;
use tracing::{debug, info, trace, warn};

pub trait View {
    fn event(&self) -> &LockEvent;
    fn as_task(&self) -> &str;
    fn as_request(&self) -> String;
    fn kind(&self) -> &'static str;
}

impl<T> View for T
where
    T: Borrow<LockEvent>,
{
    #[inline]
    fn event(&self) -> &LockEvent {
        self.borrow()
    }
    #[inline]
    fn as_task(&self) -> &str {
        self.borrow().task().map(|t| t.as_str()).unwrap_or("none")
    }
    #[inline]
    fn as_request(&self) -> String {
        self.borrow()
            .request()
            .map(|r| r.to_string())
            .unwrap_or_else(|| "none".to_string())
    }
    #[inline]
    fn kind(&self) -> &'static str {
        self.borrow().kind()
    }
}

#[inline]
pub fn message_for(event: &LockEvent) -> &'static str {
    match event {
        // registry
        LockEvent::ResourceRegistered { .. } => "resource registered",
        LockEvent::ResourceRemoved { .. } => "resource removed",

        // requests
        LockEvent::Submitted { .. } => "lock request submitted",
        LockEvent::Granted { .. } => "lock request granted",
        LockEvent::Released { .. } => "resources released",
        LockEvent::Cancelled { .. } => "lock request cancelled before grant",

        // lifecycle
        LockEvent::StopRequested { .. } => "task asked to stop",
        LockEvent::Terminated { .. } => "task force-terminated",
    }
}

#[inline]
pub fn log_event<E: View>(e: E) {
    let event = e.event();
    let msg = message_for(event);

    match event {
        LockEvent::ResourceRegistered { name } | LockEvent::ResourceRemoved { name } => {
            debug!(resource = %name, "{msg}")
        }
        LockEvent::Submitted { target, .. } => trace!(
            task = e.as_task(),
            request = %e.as_request(),
            target = target.kind(),
            "{msg}"
        ),
        LockEvent::Granted {
            resources, waited, ..
        } => debug!(
            task = e.as_task(),
            request = %e.as_request(),
            resources = ?resources,
            waited_ms = waited.as_millis() as u64,
            "{msg}"
        ),
        LockEvent::Released {
            resources, cause, ..
        } => debug!(
            task = e.as_task(),
            request = %e.as_request(),
            resources = ?resources,
            cause = cause.as_str(),
            "{msg}"
        ),
        LockEvent::Cancelled { cause, .. } => debug!(
            task = e.as_task(),
            request = %e.as_request(),
            cause = cause.as_str(),
            "{msg}"
        ),
        LockEvent::StopRequested { .. } => info!(task = e.as_task(), "{msg}"),
        LockEvent::Terminated { .. } => warn!(task = e.as_task(), "{msg}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockable_model::{ReleaseCause, RequestId, TaskId};

    #[test]
    fn view_reads_task_and_request() {
        let ev = LockEvent::Cancelled {
            request: RequestId::new(7),
            task: TaskId::from("t1"),
            cause: ReleaseCause::Withdrawn,
        };
        assert_eq!(ev.as_task(), "t1");
        assert_eq!((&ev).as_request(), "req-7");
        assert_eq!(ev.kind(), "cancelled");
    }

    #[test]
    fn registry_events_have_no_task() {
        let ev = LockEvent::ResourceRegistered { name: "r1".into() };
        assert_eq!(ev.as_task(), "none");
        assert_eq!(ev.as_request(), "none");
        assert_eq!(message_for(&ev), "resource registered");
    }

    #[test]
    fn log_event_without_subscriber_is_harmless() {
        log_event(LockEvent::Terminated {
            task: TaskId::from("t1"),
        });
    }
}
