use etl_config::shared::{DefinitionConfig, PgConnectionConfig, RunnerConfig};
use etl_postgres::sqlx::pool::connect_to_database;
use etl_sync::definition::EtlDefinition;
use etl_sync::destination::postgres::PgDestination;
use etl_sync::error::{ErrorKind, EtlResult};
use etl_sync::etl_error;
use etl_sync::executor::EtlExecutor;
use etl_sync::extractor::{ExtractorSettings, FingerprintExtractor};
use etl_sync::loader::{HashIndexLoader, Loader, LoaderSettings};
use etl_sync::registry::DefinitionRegistry;
use etl_sync::runtime::RuntimeInfo;
use etl_sync::source::Source;
use etl_sync::source::postgres::PgSource;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::error::RunnerResult;

/// Connections kept per pool. A run issues one statement at a time on each side.
const MAX_CONNECTIONS: u32 = 2;

pub type PgDefinition =
    EtlDefinition<FingerprintExtractor<PgSource>, HashIndexLoader<PgDestination>>;

/// Summary printed by the `info` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionInfo {
    pub name: String,
    pub source_count: u64,
    pub indexed_count: u64,
    pub base_query: String,
}

/// Builds a Postgres backed definition forwarding records unchanged.
pub fn build_definition(
    config: &DefinitionConfig,
    source_pool: PgPool,
    destination_pool: PgPool,
) -> EtlResult<PgDefinition> {
    let extractor = FingerprintExtractor::new(
        PgSource::new(source_pool, config.extractor.query.clone()),
        ExtractorSettings::from(&config.extractor),
    )?;
    let loader = HashIndexLoader::new(
        PgDestination::new(destination_pool),
        LoaderSettings::try_from(&config.loader)?,
    )?;

    Ok(EtlDefinition::new(config.name.clone(), extractor, loader))
}

/// Runs the definitions of a [`RunnerConfig`] by name.
pub struct Runner {
    config: RunnerConfig,
    registry: DefinitionRegistry<DefinitionConfig>,
    verbose: bool,
}

impl Runner {
    pub fn new(config: RunnerConfig, verbose: bool) -> RunnerResult<Self> {
        let mut registry = DefinitionRegistry::new();
        for definition in &config.definitions {
            registry.register(definition.name.clone(), definition.clone())?;
        }

        log_config(&config);

        Ok(Self {
            config,
            registry,
            verbose,
        })
    }

    /// Returns the kebab case names of every configured definition.
    pub fn list(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Executes the definition called `name`.
    pub async fn run(&self, name: &str, incremental: bool) -> RunnerResult<RuntimeInfo> {
        let mut definition = self.definition(name).await?;

        let mut executor = EtlExecutor::new();
        if self.verbose {
            executor = executor
                .with_progress_callback(self.config.progress.every, |info, _| {
                    println!("{}", info.summary());
                })?;
        }

        let runtime_info = executor.execute(&mut definition, incremental).await?;

        if self.verbose {
            println!("{}", runtime_info.summary());
        }
        println!("Complete");

        Ok(runtime_info)
    }

    /// Counts the source rows and indexes the destination of the definition called `name`.
    pub async fn info(&self, name: &str) -> RunnerResult<DefinitionInfo> {
        let mut definition = self.definition(name).await?;

        let source_count = definition.extractor().source().count().await?;

        let loader = definition.loader_mut();
        loader.prepare().await?;
        let indexed_count = loader.runtime_info().index_count;

        Ok(DefinitionInfo {
            name: definition.name().to_string(),
            source_count,
            indexed_count,
            base_query: definition.extractor().source().base_query().to_string(),
        })
    }

    async fn definition(&self, name: &str) -> RunnerResult<PgDefinition> {
        let config = self.registry.get(name)?;

        let source_pool = connect(&self.config.source, ErrorKind::SourceConnectionFailed).await?;
        let destination_pool =
            connect(&self.config.destination, ErrorKind::DestinationConnectionFailed).await?;

        info!(definition = %config.name, "built definition");

        Ok(build_definition(config, source_pool, destination_pool)?)
    }
}

async fn connect(config: &PgConnectionConfig, kind: ErrorKind) -> EtlResult<PgPool> {
    log_pg_connection_config(config);

    connect_to_database(config, MAX_CONNECTIONS)
        .await
        .map_err(|err| {
            etl_error!(
                kind,
                "Failed to connect to database",
                format!("{}:{}/{}", config.host, config.port, config.name),
                source: err
            )
        })
}

fn log_config(config: &RunnerConfig) {
    debug!(
        definitions = config.definitions.len(),
        progress_every = config.progress.every,
        metrics_port = config.metrics_port,
        "runner config"
    );
}

fn log_pg_connection_config(config: &PgConnectionConfig) {
    debug!(
        host = config.host,
        port = config.port,
        dbname = config.name,
        username = config.username,
        tls_enabled = config.tls.enabled,
        "postgres connection config",
    );
}
