//! Shared configuration types.

mod base;
mod connection;
mod definition;
mod runner;

pub use base::ValidationError;
pub use connection::{IntoConnectOptions, PgConnectionConfig, TlsConfig};
pub use definition::{
    DefinitionConfig, ExtractorConfig, LoaderConfig, normalize_definition_name,
};
pub use runner::{ProgressConfig, RunnerConfig};
