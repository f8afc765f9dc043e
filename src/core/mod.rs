//! Core registration and dispatch types.

mod registry;
mod sentinel;

pub use registry::{ExecutorRef, Registry};
pub use sentinel::{DEFAULT_NAMESPACE, Sentinel};
