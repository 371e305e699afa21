//! Command line entry point running configured reconciliation definitions.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use etl_config::shared::RunnerConfig;
use etl_telemetry::metrics::init_metrics;
use etl_telemetry::tracing::init_tracing;
use tracing::error;

use crate::config::load_runner_config;
use crate::core::Runner;
use crate::error::{RunnerError, RunnerResult};

mod config;
mod core;
mod error;

#[derive(Parser, Debug)]
#[command(name = "etl-runner")]
#[command(about = "Reconciles source queries into destination tables")]
struct Args {
    /// Directory holding the base and environment configuration files
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Print progress reports and queries
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a definition
    Run {
        name: String,

        /// Only extract rows at or past the destination watermark
        #[arg(long)]
        incremental: bool,
    },
    /// List the configured definitions
    List,
    /// Show source and destination row counts of a definition
    Info { name: String },
}

fn main() -> ExitCode {
    let args = Args::parse();

    match start(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprint!("{}", err.render_report());
            ExitCode::FAILURE
        }
    }
}

fn start(args: Args) -> RunnerResult<()> {
    let config = load_runner_config(args.config_dir.as_deref())?;

    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME")).map_err(RunnerError::config)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(args, config))
}

async fn async_main(args: Args, config: RunnerConfig) -> RunnerResult<()> {
    if let (Some(port), Command::Run { name, .. }) = (config.metrics_port, &args.command) {
        init_metrics(port, Some(name.as_str())).map_err(RunnerError::config)?;
    }

    let runner = Runner::new(config, args.verbose)?;

    let result = match &args.command {
        Command::Run { name, incremental } => runner.run(name, *incremental).await.map(|_| ()),
        Command::List => {
            for name in runner.list() {
                println!("{name}");
            }
            Ok(())
        }
        Command::Info { name } => runner.info(name).await.map(|info| {
            println!("{}", info.name);
            println!("Source records: {}", info.source_count);
            println!("Indexed records: {}", info.indexed_count);
            if args.verbose {
                println!("Query: {}", info.base_query);
            }
        }),
    };

    if let Err(err) = &result {
        error!("{err}");
    }

    result
}
