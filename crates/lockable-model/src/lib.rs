//! Plain data records shared by the lock manager and its collaborators.
//!
//! Nothing in this crate holds state or locks; it only describes resources,
//! lock requests and the events the manager emits about them.

mod error;
pub use error::ModelError;

mod domain;
pub use domain::*;
