use std::future::Future;

use crate::error::EtlResult;
use crate::runtime::LoaderRuntimeInfo;
use crate::types::{Cell, Record};

/// Writes the records of a run to a destination.
///
/// A run calls [`Loader::prepare`] once, [`Loader::load`] for every record and
/// [`Loader::cleanup`] once after the last record.
pub trait Loader {
    /// Readies the loader for a run and resets its counters.
    ///
    /// Writes a failed previous run left uncommitted are discarded.
    fn prepare(&mut self) -> impl Future<Output = EtlResult<()>> + Send;

    /// Classifies and writes a single record.
    ///
    /// Records without a fingerprint are fingerprinted over the loader's unique columns.
    fn load(&mut self, record: Record) -> impl Future<Output = EtlResult<()>> + Send;

    /// Finishes the run, making every pending write durable.
    fn cleanup(&mut self) -> impl Future<Output = EtlResult<()>> + Send;

    /// Returns the watermark incremental runs start from.
    fn incremental_last_value(&mut self) -> impl Future<Output = EtlResult<Option<Cell>>> + Send;

    /// Returns a snapshot of the loading counters.
    fn runtime_info(&self) -> LoaderRuntimeInfo;
}
