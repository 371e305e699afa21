//! Configuration types and loading for fingerprint synchronization runs.
//!
//! Configuration is read from `configuration/base.*`, then from the environment specific file
//! selected by `APP_ENVIRONMENT`, and finally from `APP_` prefixed environment variables.

mod environment;
mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{Config, ConfigLayer, LoadConfigError, load_config, load_config_from};
