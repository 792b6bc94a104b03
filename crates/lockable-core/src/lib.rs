//! In-process lock manager for named and labeled resources.
//!
//! Tasks submit lock requests for explicit resource names or for a quantity
//! of resources sharing a label. Requests wait in arrival order; whenever
//! availability changes an allocation pass grants everything it can, waking
//! each granted task exactly once. Tasks can be asked to stop gracefully or
//! be terminated hard, in which case their footprint is cleaned up without
//! their cooperation.

pub mod config;
pub use config::ManagerConfig;

pub mod error;
pub use error::CoreError;

mod guard;
pub use guard::LockGuard;

mod lifecycle;
pub use lifecycle::Termination;

mod manager;
pub use manager::{LockManager, ManagerBuilder};

pub mod matcher;

pub mod metrics;
pub use metrics::{MetricsBackend, NoopMetrics};

mod notify;
pub use notify::{Grant, Subscribe, Ticket};

pub mod registry;
pub use registry::Registry;

mod scheduler;
