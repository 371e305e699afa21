use std::path::Path;

use etl_config::shared::RunnerConfig;
use etl_config::{load_config, load_config_from};

use crate::error::{RunnerError, RunnerResult};

/// Loads and validates the runner configuration.
///
/// Reads from `directory` when given and from `./configuration` otherwise.
pub fn load_runner_config(directory: Option<&Path>) -> RunnerResult<RunnerConfig> {
    let config = match directory {
        Some(directory) => load_config_from::<RunnerConfig>(directory),
        None => load_config::<RunnerConfig>(),
    }
    .map_err(RunnerError::config)?;
    config.validate().map_err(RunnerError::config)?;

    Ok(config)
}
