use std::sync::Arc;

use crate::error::EtlResult;
use crate::types::Record;

/// Callback applied to a record right before it is written.
///
/// Returning an error aborts the run.
pub type RecordHook = Arc<dyn Fn(Record) -> EtlResult<Record> + Send + Sync>;

/// Wraps a closure into a [`RecordHook`].
pub fn record_hook<F>(hook: F) -> RecordHook
where
    F: Fn(Record) -> EtlResult<Record> + Send + Sync + 'static,
{
    Arc::new(hook)
}
