use futures::Stream;

use crate::error::EtlResult;
use crate::runtime::ExtractorRuntimeInfo;
use crate::types::{Cell, Record};

/// Produces the records of a run as a lazy, consume-once stream.
pub trait Extractor {
    /// Returns the records of the source, restricted to rows whose watermark column is at
    /// least `watermark` when one is given.
    ///
    /// Nothing is fetched until the stream is polled.
    fn extract(
        &self,
        watermark: Option<Cell>,
    ) -> impl Stream<Item = EtlResult<Record>> + Send + '_;

    /// Returns the columns the fingerprint of every extracted record is computed over.
    fn unique_columns(&self) -> &[String];

    /// Returns a snapshot of the extraction counters.
    fn runtime_info(&self) -> ExtractorRuntimeInfo;
}
