use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("explicit request names no resources")]
    EmptyNames,
    #[error("resource named more than once: {0}")]
    DuplicateName(String),
    #[error("label must not be empty")]
    EmptyLabel,
    #[error("quantity must be at least 1")]
    ZeroQuantity,
    #[error("resource name must not be empty")]
    EmptyResourceName,
}
