//! Batch reconciliation of a source query into a destination table.
//!
//! Records are paged out of the source ordered by a fingerprint of their identity columns and
//! classified against an in-memory index of the destination fingerprints: known rows are
//! updated, unknown rows inserted. See [`executor::EtlExecutor`] for the run sequence.

pub mod conversions;
pub mod definition;
pub mod destination;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod extractor;
pub mod loader;
mod macros;
pub mod metrics;
pub mod registry;
pub mod runtime;
pub mod source;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
