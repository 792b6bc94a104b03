use std::time::Duration;

use lockable_model::{LockEvent, ReleaseCause};

/// Metrics sink fed by the manager.
///
/// The core only calls these hooks; exporting is up to the backend.
pub trait MetricsBackend: Send + Sync {
    fn record_submitted(&self, kind: &'static str);
    fn record_granted(&self, waited: Duration);
    fn record_released(&self, cause: ReleaseCause);
    fn record_cancelled(&self, cause: ReleaseCause);
    fn set_queue_depth(&self, depth: usize);
}

/// Backend that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsBackend for NoopMetrics {
    fn record_submitted(&self, _kind: &'static str) {}
    fn record_granted(&self, _waited: Duration) {}
    fn record_released(&self, _cause: ReleaseCause) {}
    fn record_cancelled(&self, _cause: ReleaseCause) {}
    fn set_queue_depth(&self, _depth: usize) {}
}

pub(crate) fn observe(metrics: &dyn MetricsBackend, event: &LockEvent) {
    match event {
        LockEvent::Submitted { target, .. } => metrics.record_submitted(target.kind()),
        LockEvent::Granted { waited, .. } => metrics.record_granted(*waited),
        LockEvent::Released { cause, .. } => metrics.record_released(*cause),
        LockEvent::Cancelled { cause, .. } => metrics.record_cancelled(*cause),
        _ => {}
    }
}
