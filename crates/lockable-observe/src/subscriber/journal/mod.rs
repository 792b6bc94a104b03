use lockable_core::Subscribe;
use lockable_model::LockEvent;

use crate::subscriber::view::log_event;

/// Writes every lock manager event to the tracing pipeline.
#[derive(Debug, Default)]
pub struct Journal;

impl Journal {
    pub fn new() -> Self {
        Self
    }
}

impl Subscribe for Journal {
    fn on_event(&self, event: &LockEvent) {
        log_event(event);
    }
    fn name(&self) -> &'static str {
        "journal"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lockable_core::{LockManager, ManagerConfig};
    use lockable_model::{ResourceDef, TargetSpec, TaskId};

    use super::*;

    #[test]
    fn journal_plugs_into_the_manager() {
        let manager = LockManager::builder(ManagerConfig::default())
            .with_subscriber(Arc::new(Journal::new()))
            .build()
            .unwrap();
        manager.register(ResourceDef::new("r1")).unwrap();
        let grant = manager
            .try_submit(&TaskId::from("t1"), TargetSpec::name("r1"))
            .unwrap()
            .unwrap();
        assert_eq!(grant.resources, vec!["r1".to_string()]);
        assert_eq!(Journal::new().name(), "journal");
    }
}
