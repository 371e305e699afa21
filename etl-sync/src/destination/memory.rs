use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::bail;
use crate::destination::Destination;
use crate::dialect::Dialect;
use crate::error::{ErrorKind, EtlResult};
use crate::loader::{InsertStatement, UpdateStatement};
use crate::types::{Cell, Fingerprint, Record, TableName};

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<TableName, Vec<Record>>,
    /// Copy of `tables` receiving the writes of the open transaction.
    staged: Option<HashMap<TableName, Vec<Record>>>,
    staged_writes: u64,
    transactions_begun: u64,
    rollbacks: u64,
    /// Number of writes of every committed transaction, in commit order.
    commits: Vec<u64>,
    writes: u64,
    fail_after_writes: Option<u64>,
}

impl Inner {
    fn check_write(&mut self) -> EtlResult<()> {
        if self.fail_after_writes == Some(self.writes) {
            bail!(
                ErrorKind::DestinationQueryFailed,
                "Memory destination write failed",
                format!("after {} writes", self.writes)
            );
        }

        self.writes += 1;
        if self.staged.is_some() {
            self.staged_writes += 1;
        }

        Ok(())
    }

    fn table_mut(&mut self, table: &TableName) -> &mut Vec<Record> {
        let tables = match self.staged.as_mut() {
            Some(staged) => staged,
            None => &mut self.tables,
        };

        tables.entry(table.clone()).or_default()
    }
}

/// In-memory [`Destination`] for tests and development.
///
/// Handles are cheap to clone and share the same tables, so a test can keep one to inspect
/// what a loader wrote. Writes made inside a transaction only become visible on commit.
#[derive(Debug, Clone, Default)]
pub struct MemoryDestination {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `rows` in `table` as already committed data.
    pub async fn seed(&self, table: &TableName, rows: Vec<Record>) {
        let mut inner = self.inner.lock().await;
        inner.tables.entry(table.clone()).or_default().extend(rows);
    }

    /// Makes every write after the first `writes` fail with
    /// [`ErrorKind::DestinationQueryFailed`].
    pub async fn fail_after_writes(&self, writes: u64) {
        let mut inner = self.inner.lock().await;
        inner.fail_after_writes = Some(writes);
    }

    /// Returns the committed rows of `table`.
    pub async fn rows(&self, table: &TableName) -> Vec<Record> {
        let inner = self.inner.lock().await;
        inner.tables.get(table).cloned().unwrap_or_default()
    }

    pub async fn transactions_begun(&self) -> u64 {
        self.inner.lock().await.transactions_begun
    }

    /// Returns the number of writes of every committed transaction.
    pub async fn commits(&self) -> Vec<u64> {
        self.inner.lock().await.commits.clone()
    }

    pub async fn rollbacks(&self) -> u64 {
        self.inner.lock().await.rollbacks
    }

    pub async fn in_transaction(&self) -> bool {
        self.inner.lock().await.staged.is_some()
    }
}

impl Destination for MemoryDestination {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn load_fingerprints(
        &mut self,
        table: &TableName,
        unique_columns: &[String],
    ) -> EtlResult<Vec<Fingerprint>> {
        let inner = self.inner.lock().await;

        let fingerprints: Vec<Fingerprint> = inner
            .tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .map(|row| row.compute_fingerprint(unique_columns))
                    .collect()
            })
            .unwrap_or_default();

        Ok(fingerprints)
    }

    async fn max_value(&mut self, table: &TableName, column: &str) -> EtlResult<Option<Cell>> {
        let inner = self.inner.lock().await;

        let max = inner
            .tables
            .get(table)
            .into_iter()
            .flatten()
            .filter_map(|row| row.get(column))
            .filter(|value| !value.is_null())
            .fold(None::<&Cell>, |max, value| match max {
                Some(current) if value.partial_cmp(current).is_some_and(|o| o.is_le()) => {
                    Some(current)
                }
                _ => Some(value),
            });

        Ok(max.cloned())
    }

    async fn begin_transaction(&mut self) -> EtlResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.staged.is_some() {
            bail!(
                ErrorKind::InvalidState,
                "A destination transaction is already open"
            );
        }

        inner.staged = Some(inner.tables.clone());
        inner.staged_writes = 0;
        inner.transactions_begun += 1;

        Ok(())
    }

    async fn commit_transaction(&mut self) -> EtlResult<()> {
        let mut inner = self.inner.lock().await;
        let Some(staged) = inner.staged.take() else {
            bail!(
                ErrorKind::InvalidState,
                "No destination transaction is open to commit"
            );
        };

        inner.tables = staged;
        let writes = inner.staged_writes;
        inner.commits.push(writes);
        debug!(writes, "committed memory transaction");

        Ok(())
    }

    async fn rollback_transaction(&mut self) -> EtlResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.staged.take().is_none() {
            bail!(
                ErrorKind::InvalidState,
                "No destination transaction is open to roll back"
            );
        }

        inner.rollbacks += 1;
        debug!(writes = inner.staged_writes, "rolled back memory transaction");

        Ok(())
    }

    async fn prepare_statement(&mut self, _sql: &str) -> EtlResult<()> {
        Ok(())
    }

    async fn insert(&mut self, statement: &InsertStatement, record: &Record) -> EtlResult<u64> {
        let mut inner = self.inner.lock().await;
        inner.check_write()?;

        let row = Record::from_pairs(
            statement
                .columns()
                .iter()
                .map(|column| (column.clone(), record.value_or_null(column))),
        );
        inner.table_mut(statement.table()).push(row);

        Ok(1)
    }

    async fn update(&mut self, statement: &UpdateStatement, record: &Record) -> EtlResult<u64> {
        let mut inner = self.inner.lock().await;
        inner.check_write()?;

        let keys = statement
            .key_columns()
            .iter()
            .map(|column| (column.as_str(), record.value_or_null(column)))
            .collect::<Vec<_>>();

        // NULL never equals anything, as in SQL.
        if keys.iter().any(|(_, value)| value.is_null()) {
            return Ok(0);
        }

        let mut affected = 0;
        for row in inner.table_mut(statement.table()).iter_mut() {
            let matches = keys
                .iter()
                .all(|(column, value)| row.get(column) == Some(value));
            if !matches {
                continue;
            }

            for column in statement.set_columns() {
                row.set(column.clone(), record.value_or_null(column));
            }
            affected += 1;
        }

        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TableName {
        "products".parse().unwrap()
    }

    #[tokio::test]
    async fn writes_are_visible_after_commit_only() {
        let mut destination = MemoryDestination::new();
        let statement = InsertStatement::plan(
            Dialect::Postgres,
            &table(),
            &["id".to_string()],
            &[],
        )
        .unwrap();

        destination.begin_transaction().await.unwrap();
        destination
            .insert(&statement, &Record::from_pairs([("id", 1)]))
            .await
            .unwrap();
        assert!(destination.rows(&table()).await.is_empty());

        destination.commit_transaction().await.unwrap();
        assert_eq!(destination.rows(&table()).await.len(), 1);
        assert_eq!(destination.commits().await, vec![1]);
    }

    #[tokio::test]
    async fn max_value_ignores_nulls() {
        let mut destination = MemoryDestination::new();
        destination
            .seed(
                &table(),
                vec![
                    Record::from_pairs([("updated_at", Cell::I64(3))]),
                    Record::from_pairs([("updated_at", Cell::Null)]),
                    Record::from_pairs([("updated_at", Cell::I64(9))]),
                ],
            )
            .await;

        assert_eq!(
            destination.max_value(&table(), "updated_at").await.unwrap(),
            Some(Cell::I64(9))
        );
        assert_eq!(
            destination.max_value(&table(), "missing").await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn rollback_discards_staged_writes() {
        let mut destination = MemoryDestination::new();
        let statement = InsertStatement::plan(
            Dialect::Postgres,
            &table(),
            &["id".to_string()],
            &[],
        )
        .unwrap();

        destination.begin_transaction().await.unwrap();
        destination
            .insert(&statement, &Record::from_pairs([("id", 1)]))
            .await
            .unwrap();
        destination.rollback_transaction().await.unwrap();

        assert!(!destination.in_transaction().await);
        assert!(destination.rows(&table()).await.is_empty());
        assert!(destination.commits().await.is_empty());
        assert_eq!(destination.rollbacks().await, 1);

        let err = destination.rollback_transaction().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn commit_without_transaction_is_invalid() {
        let mut destination = MemoryDestination::new();
        let err = destination.commit_transaction().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }
}
