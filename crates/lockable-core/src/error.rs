use thiserror::Error;

use lockable_model::{ModelError, RequestId, ResourceName, ResourceState, TaskId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("resource already exists: {0}")]
    DuplicateResource(ResourceName),

    #[error("resource not found: {0}")]
    NotFound(ResourceName),

    #[error("resource {resource} is {actual:?}, expected {expected:?}")]
    InvalidState {
        resource: ResourceName,
        expected: ResourceState,
        actual: ResourceState,
    },

    #[error("request is not granted: {0}")]
    NotGranted(RequestId),

    #[error("request is not waiting: {0}")]
    NotWaiting(RequestId),

    #[error("request is not a manual reservation: {0}")]
    NotReserved(RequestId),

    #[error("request not found: {0}")]
    RequestNotFound(RequestId),

    #[error("request cancelled before grant: {0}")]
    Cancelled(RequestId),

    #[error("task has been terminated: {0}")]
    TaskTerminated(TaskId),

    #[error("resources are busy: {}", .0.join(", "))]
    ResourcesBusy(Vec<ResourceName>),

    #[error("invalid lock target: {0}")]
    InvalidSpec(#[from] ModelError),

    #[error("config error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Config(e.to_string())
    }
}
