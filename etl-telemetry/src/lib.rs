//! Logging and metrics initialization for the synchronization binaries and tests.

pub mod metrics;
pub mod tracing;
