use etl_config::shared::LoaderConfig;
use metrics::counter;
use tracing::{debug, info, warn};

use crate::bail;
use crate::destination::Destination;
use crate::error::{ErrorKind, EtlResult};
use crate::loader::{
    FingerprintIndex, InsertStatement, Loader, RecordHook, UpdateStatement,
};
use crate::metrics::{
    ACTION_LABEL, ETL_SYNC_LOADED_ROWS_TOTAL, ETL_SYNC_TRANSACTIONS_COMMITTED_TOTAL,
};
use crate::runtime::LoaderRuntimeInfo;
use crate::types::{Cell, Record, TableName};

/// Settings of a [`HashIndexLoader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderSettings {
    pub table: TableName,
    /// Columns written by both inserts and updates.
    pub columns: Vec<String>,
    pub insert_only_columns: Vec<String>,
    pub update_only_columns: Vec<String>,
    pub unique_columns: Vec<String>,
    pub update_column: String,
    pub perform_inserts: bool,
    pub perform_updates: bool,
    pub perform_deletes: bool,
    pub batch_size: usize,
}

impl LoaderSettings {
    pub fn new(table: TableName, columns: Vec<String>) -> Self {
        Self {
            table,
            columns,
            insert_only_columns: Vec::new(),
            update_only_columns: Vec::new(),
            unique_columns: vec!["id".to_string()],
            update_column: "updated_at".to_string(),
            perform_inserts: true,
            perform_updates: true,
            perform_deletes: true,
            batch_size: LoaderConfig::DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_unique_columns(mut self, unique_columns: Vec<String>) -> Self {
        self.unique_columns = unique_columns;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_update_column(mut self, update_column: impl Into<String>) -> Self {
        self.update_column = update_column.into();
        self
    }

    fn validate(&self) -> EtlResult<()> {
        if self.batch_size == 0 {
            bail!(ErrorKind::ConfigError, "Loader batch size must be positive");
        }

        if self.unique_columns.is_empty() {
            bail!(ErrorKind::ConfigError, "Loader needs at least one unique column");
        }

        Ok(())
    }
}

impl TryFrom<&LoaderConfig> for LoaderSettings {
    type Error = crate::error::EtlError;

    fn try_from(config: &LoaderConfig) -> Result<Self, Self::Error> {
        let table = match config.table.parse::<TableName>() {
            Ok(table) => table,
            Err(err) => bail!(
                ErrorKind::ConfigError,
                "Invalid destination table name",
                err.to_string(),
                source: err
            ),
        };

        Ok(Self {
            table,
            columns: config.columns.clone(),
            insert_only_columns: config.insert_only_columns.clone(),
            update_only_columns: config.update_only_columns.clone(),
            unique_columns: config.unique_columns.clone(),
            update_column: config.update_column.clone(),
            perform_inserts: config.perform_inserts,
            perform_updates: config.perform_updates,
            perform_deletes: config.perform_deletes,
            batch_size: config.batch_size,
        })
    }
}

/// Loader classifying records with an in-memory index of destination fingerprints.
///
/// [`Loader::prepare`] reads the fingerprint of every destination row once. Records whose
/// fingerprint is in the index are updated and all others are inserted, so no per record
/// lookup is issued against the destination. Writes are grouped in transactions of
/// `batch_size` loads.
pub struct HashIndexLoader<D> {
    destination: D,
    settings: LoaderSettings,
    insert_hook: Option<RecordHook>,
    update_hook: Option<RecordHook>,
    index: FingerprintIndex,
    insert_statement: Option<InsertStatement>,
    update_statement: Option<UpdateStatement>,
    prepared: bool,
    iteration: u64,
    transaction_open: bool,
    runtime_info: LoaderRuntimeInfo,
}

impl<D> HashIndexLoader<D>
where
    D: Destination,
{
    pub fn new(destination: D, settings: LoaderSettings) -> EtlResult<Self> {
        settings.validate()?;

        Ok(Self {
            destination,
            settings,
            insert_hook: None,
            update_hook: None,
            index: FingerprintIndex::new(),
            insert_statement: None,
            update_statement: None,
            prepared: false,
            iteration: 0,
            transaction_open: false,
            runtime_info: LoaderRuntimeInfo::default(),
        })
    }

    /// Sets the hook applied to every record before it is inserted.
    pub fn with_insert_hook(mut self, hook: RecordHook) -> Self {
        self.insert_hook = Some(hook);
        self
    }

    /// Sets the hook applied to every record before it is updated.
    pub fn with_update_hook(mut self, hook: RecordHook) -> Self {
        self.update_hook = Some(hook);
        self
    }

    pub fn destination(&self) -> &D {
        &self.destination
    }

    pub fn settings(&self) -> &LoaderSettings {
        &self.settings
    }

    pub fn index(&self) -> &FingerprintIndex {
        &self.index
    }

    fn plan_statements(&mut self) -> EtlResult<()> {
        let dialect = self.destination.dialect();
        let settings = &self.settings;

        self.insert_statement = if settings.perform_inserts {
            Some(InsertStatement::plan(
                dialect,
                &settings.table,
                &settings.columns,
                &settings.insert_only_columns,
            )?)
        } else {
            None
        };

        self.update_statement = if settings.perform_updates {
            Some(UpdateStatement::plan(
                dialect,
                &settings.table,
                &settings.columns,
                &settings.update_only_columns,
                &settings.unique_columns,
            )?)
        } else {
            None
        };

        self.runtime_info.insert_query = self
            .insert_statement
            .as_ref()
            .map(|statement| statement.sql().to_string());
        self.runtime_info.update_query = self
            .update_statement
            .as_ref()
            .map(|statement| statement.sql().to_string());

        Ok(())
    }

    async fn begin(&mut self) -> EtlResult<()> {
        self.destination.begin_transaction().await?;
        self.transaction_open = true;
        debug!(iteration = self.iteration, "began destination transaction");

        Ok(())
    }

    async fn commit(&mut self) -> EtlResult<()> {
        self.destination.commit_transaction().await?;
        self.transaction_open = false;
        debug!(iteration = self.iteration, "committed destination transaction");
        counter!(ETL_SYNC_TRANSACTIONS_COMMITTED_TOTAL).increment(1);

        Ok(())
    }

    /// Discards the transaction a failed run left open.
    async fn rollback(&mut self) -> EtlResult<()> {
        self.destination.rollback_transaction().await?;
        self.transaction_open = false;
        warn!(
            table = %self.settings.table,
            "rolled back destination transaction left open by a previous run"
        );

        Ok(())
    }

    async fn insert(&mut self, record: Record) -> EtlResult<()> {
        let Some(statement) = self.insert_statement.as_ref() else {
            bail!(ErrorKind::InvalidState, "Insert statement was not prepared");
        };

        let record = match &self.insert_hook {
            Some(hook) => hook(record)?,
            None => record,
        };

        let affected = self.destination.insert(statement, &record).await?;
        self.runtime_info.insert_count += affected;
        counter!(ETL_SYNC_LOADED_ROWS_TOTAL, ACTION_LABEL => "insert").increment(1);

        Ok(())
    }

    async fn update(&mut self, record: Record) -> EtlResult<()> {
        let Some(statement) = self.update_statement.as_ref() else {
            bail!(ErrorKind::InvalidState, "Update statement was not prepared");
        };

        let record = match &self.update_hook {
            Some(hook) => hook(record)?,
            None => record,
        };

        let affected = self.destination.update(statement, &record).await?;
        if affected == 0 {
            debug!(table = %self.settings.table, "update matched no destination row");
        }
        self.runtime_info.update_count += affected;
        counter!(ETL_SYNC_LOADED_ROWS_TOTAL, ACTION_LABEL => "update").increment(1);

        Ok(())
    }

    fn skip(&mut self) {
        self.runtime_info.skip_count += 1;
        counter!(ETL_SYNC_LOADED_ROWS_TOTAL, ACTION_LABEL => "skip").increment(1);
    }
}

impl<D> Loader for HashIndexLoader<D>
where
    D: Destination + Send,
{
    async fn prepare(&mut self) -> EtlResult<()> {
        if self.transaction_open {
            self.rollback().await?;
        }

        self.runtime_info = LoaderRuntimeInfo::default();
        self.iteration = 0;
        self.plan_statements()?;

        if let Some(statement) = &self.insert_statement {
            self.destination.prepare_statement(statement.sql()).await?;
        }
        if let Some(statement) = &self.update_statement {
            self.destination.prepare_statement(statement.sql()).await?;
        }

        let fingerprints = self
            .destination
            .load_fingerprints(&self.settings.table, &self.settings.unique_columns)
            .await?;
        self.index.rebuild(fingerprints);
        self.runtime_info.index_count = self.index.len() as u64;
        self.prepared = true;

        info!(
            table = %self.settings.table,
            index_count = self.runtime_info.index_count,
            "built destination fingerprint index"
        );

        Ok(())
    }

    async fn load(&mut self, record: Record) -> EtlResult<()> {
        if !self.prepared {
            bail!(ErrorKind::InvalidState, "Loader used before prepare");
        }

        self.iteration += 1;
        let batch_size = self.settings.batch_size as u64;
        let position = (self.iteration - 1) % batch_size + 1;

        if position == 1 && !self.transaction_open {
            self.begin().await?;
        }

        let fingerprint = match record.fingerprint() {
            Some(fingerprint) => fingerprint.clone(),
            None => record.compute_fingerprint(&self.settings.unique_columns),
        };

        if self.index.mark_reconciled(&fingerprint) {
            if self.settings.perform_updates {
                self.update(record).await?;
            } else {
                self.skip();
            }
        } else if self.settings.perform_inserts {
            self.insert(record).await?;
            self.index.insert_reconciled(fingerprint);
        } else {
            self.skip();
        }

        if position == batch_size {
            self.commit().await?;
        }

        Ok(())
    }

    async fn cleanup(&mut self) -> EtlResult<()> {
        if self.transaction_open {
            self.commit().await?;
        }

        if self.settings.perform_deletes {
            let unreconciled = self.index.unreconciled();
            if unreconciled > 0 {
                info!(
                    table = %self.settings.table,
                    unreconciled,
                    "destination rows were not found in the source, deletion is not performed"
                );
            }
        }

        self.index.clear();
        self.prepared = false;

        Ok(())
    }

    async fn incremental_last_value(&mut self) -> EtlResult<Option<Cell>> {
        self.destination
            .max_value(&self.settings.table, &self.settings.update_column)
            .await
    }

    fn runtime_info(&self) -> LoaderRuntimeInfo {
        self.runtime_info.clone()
    }
}
