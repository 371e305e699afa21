use std::collections::HashMap;

use futures::TryStreamExt;
use sqlx::postgres::PgTypeInfo;
use sqlx::{Either, Executor, PgPool, Postgres, Statement, Transaction};
use tracing::debug;

use crate::bail;
use crate::conversions::postgres::{TypedCell, decode_cell};
use crate::destination::Destination;
use crate::dialect::{Dialect, FINGERPRINT_COLUMN};
use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::loader::{InsertStatement, UpdateStatement};
use crate::types::{Cell, Fingerprint, Record, TableName};

/// Re-classifies a database error as a destination failure.
fn destination_error(err: sqlx::Error) -> EtlError {
    let err = EtlError::from(err);

    match err.kind() {
        ErrorKind::SourceConnectionFailed => err.with_kind(ErrorKind::DestinationConnectionFailed),
        ErrorKind::SourceQueryFailed => err.with_kind(ErrorKind::DestinationQueryFailed),
        _ => err,
    }
}

/// A [`Destination`] writing to Postgres.
///
/// Writes go through the open transaction when there is one. The parameter types of every
/// statement are resolved by the server once, and each value is bound as its parameter's type.
#[derive(Debug)]
pub struct PgDestination {
    pool: PgPool,
    transaction: Option<Transaction<'static, Postgres>>,
    parameter_types: HashMap<String, Vec<PgTypeInfo>>,
}

impl PgDestination {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            transaction: None,
            parameter_types: HashMap::new(),
        }
    }

    /// Returns the parameter types the server resolved for `sql`, preparing it on first use.
    async fn parameter_types(&mut self, sql: &str) -> EtlResult<&[PgTypeInfo]> {
        if !self.parameter_types.contains_key(sql) {
            let statement = match self.transaction.as_mut() {
                Some(transaction) => (&mut **transaction).prepare(sql).await,
                None => (&self.pool).prepare(sql).await,
            }
            .map_err(destination_error)?;

            let types = match statement.parameters() {
                Some(Either::Left(types)) => types.to_vec(),
                _ => Vec::new(),
            };
            debug!(sql, parameters = types.len(), "prepared destination statement");

            self.parameter_types.insert(sql.to_string(), types);
        }

        Ok(self
            .parameter_types
            .get(sql)
            .map(Vec::as_slice)
            .unwrap_or_default())
    }

    async fn execute(&mut self, sql: &str, parameters: Vec<Cell>) -> EtlResult<u64> {
        let types = self.parameter_types(sql).await?.to_vec();

        let mut query = sqlx::query(sql);
        for (index, parameter) in parameters.into_iter().enumerate() {
            let parameter = match types.get(index) {
                Some(type_info) => TypedCell::coerce(parameter, type_info)?,
                None => TypedCell::untyped(parameter),
            };
            query = query.bind(parameter);
        }

        let result = match self.transaction.as_mut() {
            Some(transaction) => query.execute(&mut **transaction).await,
            None => query.execute(&self.pool).await,
        }
        .map_err(destination_error)?;

        Ok(result.rows_affected())
    }
}

impl Destination for PgDestination {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn load_fingerprints(
        &mut self,
        table: &TableName,
        unique_columns: &[String],
    ) -> EtlResult<Vec<Fingerprint>> {
        let sql = format!(
            "select {} as {} from {}",
            Dialect::Postgres.fingerprint_expression(unique_columns),
            Dialect::Postgres.quote_identifier(FINGERPRINT_COLUMN),
            table.as_quoted_identifier()
        );

        let fingerprints = sqlx::query_scalar::<_, String>(&sql)
            .fetch(&self.pool)
            .map_ok(Fingerprint::new)
            .try_collect::<Vec<_>>()
            .await
            .map_err(destination_error)?;

        debug!(table = %table, fingerprints = fingerprints.len(), "loaded destination fingerprints");

        Ok(fingerprints)
    }

    async fn max_value(&mut self, table: &TableName, column: &str) -> EtlResult<Option<Cell>> {
        let column = Dialect::Postgres.quote_identifier(column);
        let sql = format!(
            "select {column} from {} where {column} is not null order by {column} desc limit 1",
            table.as_quoted_identifier()
        );

        let row = sqlx::query(&sql)
            .fetch_optional(&self.pool)
            .await
            .map_err(destination_error)?;

        row.map(|row| decode_cell(&row, 0)).transpose()
    }

    async fn begin_transaction(&mut self) -> EtlResult<()> {
        if self.transaction.is_some() {
            bail!(
                ErrorKind::InvalidState,
                "A destination transaction is already open"
            );
        }

        let transaction = self.pool.begin().await.map_err(destination_error)?;
        self.transaction = Some(transaction);

        Ok(())
    }

    async fn commit_transaction(&mut self) -> EtlResult<()> {
        let Some(transaction) = self.transaction.take() else {
            bail!(
                ErrorKind::InvalidState,
                "No destination transaction is open to commit"
            );
        };

        transaction.commit().await.map_err(destination_error)
    }

    async fn rollback_transaction(&mut self) -> EtlResult<()> {
        let Some(transaction) = self.transaction.take() else {
            bail!(
                ErrorKind::InvalidState,
                "No destination transaction is open to roll back"
            );
        };

        transaction.rollback().await.map_err(destination_error)
    }

    async fn prepare_statement(&mut self, sql: &str) -> EtlResult<()> {
        self.parameter_types(sql).await?;

        Ok(())
    }

    async fn insert(&mut self, statement: &InsertStatement, record: &Record) -> EtlResult<u64> {
        self.execute(statement.sql(), statement.parameters(record))
            .await
    }

    async fn update(&mut self, statement: &UpdateStatement, record: &Record) -> EtlResult<u64> {
        self.execute(statement.sql(), statement.parameters(record))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_errors_are_reported_as_destination_failures() {
        let err = destination_error(sqlx::Error::PoolTimedOut);
        assert_eq!(err.kind(), ErrorKind::DestinationConnectionFailed);
        assert!(err.location().file().ends_with("postgres.rs"));

        let err = destination_error(sqlx::Error::RowNotFound);
        assert_eq!(err.kind(), ErrorKind::DestinationQueryFailed);
    }
}
