use std::time::Duration;

use etl_config::shared::{IntoConnectOptions, PgConnectionConfig};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::debug;

/// Maximum time spent waiting for a connection before giving up.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Connects to the database described by `config` with a pool of at most `max_connections`.
///
/// The connection is established eagerly so that misconfiguration surfaces before any work
/// is started.
pub async fn connect_to_database(
    config: &PgConnectionConfig,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    debug!(
        host = %config.host,
        port = config.port,
        database = %config.name,
        max_connections,
        "connecting to postgres"
    );

    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect_with(config.with_db())
        .await
}
