mod ids;
pub use ids::{RequestId, TaskId};

mod resource;
pub use resource::{Resource, ResourceDef, ResourceState};

mod target;
pub use target::TargetSpec;

mod request_status;
pub use request_status::{CancelState, RequestStatus};

mod resource_query;
pub use resource_query::{ResourcePage, ResourceQuery};

mod event;
pub use event::{LockEvent, ReleaseCause};

/// Unique resource identifier.
///
/// Immutable once the resource is registered.
pub type ResourceName = String;

/// Set of labels attached to a resource.
///
/// Ordered so that iteration, logging and serialization are stable.
pub type Labels = std::collections::BTreeSet<String>;
