//! Remediation actions: the actionner contract, registry and dispatcher.
//!
//! This crate provides:
//! - The [`Actionner`] trait with load-time parameter validation
//! - [`ActionnerRegistry`], which also validates rule actions
//! - [`Dispatcher`], turning every execution into a `LogLine`
//! - [`Envelope`], the deduplicated unit sent through the broker
//! - Built-in `kubernetes:labelize` and `kubernetes:terminate`

pub mod dispatcher;
pub mod envelope;
pub mod kubernetes;
pub mod registry;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatcher::Dispatcher;
pub use envelope::{dedup_key, Envelope};
pub use registry::{ActionnerRegistry, DuplicateActionner};
pub use traits::{ActionError, Actionner, Outcome};
