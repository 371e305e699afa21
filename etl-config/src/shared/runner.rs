use std::collections::HashSet;

use serde::Deserialize;

use crate::Config;
use crate::shared::definition::normalize_definition_name;
use crate::shared::{DefinitionConfig, PgConnectionConfig, ValidationError};

/// Progress reporting settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProgressConfig {
    /// Number of extracted records between two progress reports.
    #[serde(default = "default_progress_every")]
    pub every: u64,
}

impl ProgressConfig {
    /// Default number of records between progress reports.
    pub const DEFAULT_EVERY: u64 = 10;
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            every: default_progress_every(),
        }
    }
}

fn default_progress_every() -> u64 {
    ProgressConfig::DEFAULT_EVERY
}

/// Top level configuration of the runner binary.
///
/// Not `Serialize` because both connection configs carry secrets.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RunnerConfig {
    /// Database the extractors read from.
    pub source: PgConnectionConfig,
    /// Database the loaders write to.
    pub destination: PgConnectionConfig,
    /// Definitions that can be run by name.
    #[serde(default)]
    pub definitions: Vec<DefinitionConfig>,
    #[serde(default)]
    pub progress: ProgressConfig,
    /// Port of the Prometheus endpoint. Metrics are not exported when absent.
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

impl RunnerConfig {
    /// Validates connections, progress settings and every definition.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.source.validate()?;
        self.destination.validate()?;

        if self.progress.every == 0 {
            return Err(ValidationError::ZeroValue("progress.every".to_string()));
        }

        let mut seen = HashSet::new();
        for definition in &self.definitions {
            definition.validate()?;

            if !seen.insert(normalize_definition_name(&definition.name)) {
                return Err(ValidationError::DuplicateDefinition(
                    definition.name.clone(),
                ));
            }
        }

        Ok(())
    }
}

impl Config for RunnerConfig {
    const LIST_KEYS: &'static [&'static str] = &[];
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = r#"
source:
  host: localhost
  port: 5432
  name: source_db
  username: postgres
destination:
  host: localhost
  port: 5432
  name: destination_db
  username: postgres
  password: secret
definitions:
  - name: merchant-seo-data
    extractor:
      query: "select * from merchants"
    loader:
      table: merchant_seo_data
      columns: [id, name]
  - name: merchant_seo_data
    extractor:
      query: "select * from merchants"
    loader:
      table: merchant_seo_data
      columns: [id, name]
"#;

    fn parse(yaml: &str) -> RunnerConfig {
        config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn duplicate_normalized_names_are_rejected() {
        let config = parse(BASE);

        assert_eq!(config.progress.every, 10);
        assert!(config.metrics_port.is_none());
        assert!(matches!(
            config.validate(),
            Err(ValidationError::DuplicateDefinition(name)) if name == "merchant_seo_data"
        ));
    }

    #[test]
    fn zero_progress_interval_is_rejected() {
        let mut config = parse(BASE);
        config.definitions.truncate(1);
        assert!(config.validate().is_ok());

        config.progress.every = 0;
        assert!(matches!(
            config.validate(),
            Err(ValidationError::ZeroValue(field)) if field == "progress.every"
        ));
    }
}
