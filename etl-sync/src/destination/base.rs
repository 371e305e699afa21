use std::future::Future;

use crate::dialect::Dialect;
use crate::error::EtlResult;
use crate::loader::{InsertStatement, UpdateStatement};
use crate::types::{Cell, Fingerprint, Record, TableName};

/// Storage a [`crate::loader::HashIndexLoader`] reconciles.
///
/// Writes issued between [`Destination::begin_transaction`] and
/// [`Destination::commit_transaction`] become visible atomically. Dropping a destination with
/// an open transaction discards its writes.
pub trait Destination {
    /// Returns the dialect statements must be rendered in.
    fn dialect(&self) -> Dialect;

    /// Returns the fingerprint of every row of `table` over `unique_columns`.
    fn load_fingerprints(
        &mut self,
        table: &TableName,
        unique_columns: &[String],
    ) -> impl Future<Output = EtlResult<Vec<Fingerprint>>> + Send;

    /// Returns the greatest non-null value of `column` in `table`.
    fn max_value(
        &mut self,
        table: &TableName,
        column: &str,
    ) -> impl Future<Output = EtlResult<Option<Cell>>> + Send;

    fn begin_transaction(&mut self) -> impl Future<Output = EtlResult<()>> + Send;

    fn commit_transaction(&mut self) -> impl Future<Output = EtlResult<()>> + Send;

    /// Discards every write of the open transaction.
    fn rollback_transaction(&mut self) -> impl Future<Output = EtlResult<()>> + Send;

    /// Prepares `sql` ahead of its first execution.
    ///
    /// Destinations that bind parameters by type resolve the statement's parameter types here.
    fn prepare_statement(&mut self, sql: &str) -> impl Future<Output = EtlResult<()>> + Send;

    /// Executes `statement` for `record` and returns the number of affected rows.
    fn insert(
        &mut self,
        statement: &InsertStatement,
        record: &Record,
    ) -> impl Future<Output = EtlResult<u64>> + Send;

    /// Executes `statement` for `record` and returns the number of affected rows.
    fn update(
        &mut self,
        statement: &UpdateStatement,
        record: &Record,
    ) -> impl Future<Output = EtlResult<u64>> + Send;
}
