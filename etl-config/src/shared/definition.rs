use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Configuration of the fingerprinting extractor side of a definition.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExtractorConfig {
    /// Base selection whose rows are extracted. It is wrapped, never modified.
    pub query: String,
    /// Ordered identity columns the fingerprint is computed over.
    #[serde(default = "default_unique_columns")]
    pub unique_columns: Vec<String>,
    /// Maximum number of rows fetched per page.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Watermark column used to restrict incremental runs.
    #[serde(default = "default_update_column")]
    pub update_column: String,
}

impl ExtractorConfig {
    /// Default number of rows fetched per page.
    pub const DEFAULT_CHUNK_SIZE: usize = 1000;

    /// Validates the extractor settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.query.trim().is_empty() {
            return Err(ValidationError::EmptyValue("extractor.query".to_string()));
        }

        if self.unique_columns.is_empty() {
            return Err(ValidationError::EmptyList(
                "extractor.unique_columns".to_string(),
            ));
        }

        if self.chunk_size == 0 {
            return Err(ValidationError::ZeroValue("extractor.chunk_size".to_string()));
        }

        Ok(())
    }
}

/// Configuration of the hash index loader side of a definition.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoaderConfig {
    /// Destination table, optionally schema qualified (`schema.table`).
    pub table: String,
    /// Columns written by both inserts and updates.
    pub columns: Vec<String>,
    /// Columns written only by inserts.
    #[serde(default)]
    pub insert_only_columns: Vec<String>,
    /// Columns written only by updates.
    #[serde(default)]
    pub update_only_columns: Vec<String>,
    /// Ordered identity columns the fingerprint is computed over.
    #[serde(default = "default_unique_columns")]
    pub unique_columns: Vec<String>,
    /// Watermark column whose maximum seeds incremental runs.
    #[serde(default = "default_update_column")]
    pub update_column: String,
    #[serde(default = "default_true")]
    pub perform_inserts: bool,
    #[serde(default = "default_true")]
    pub perform_updates: bool,
    #[serde(default = "default_true")]
    pub perform_deletes: bool,
    /// Number of loaded records grouped in a single transaction.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl LoaderConfig {
    /// Default number of loaded records per transaction.
    pub const DEFAULT_BATCH_SIZE: usize = 1000;

    /// Validates the loader settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.table.trim().is_empty() {
            return Err(ValidationError::EmptyValue("loader.table".to_string()));
        }

        if self.columns.is_empty() {
            return Err(ValidationError::EmptyList("loader.columns".to_string()));
        }

        if self.unique_columns.is_empty() {
            return Err(ValidationError::EmptyList("loader.unique_columns".to_string()));
        }

        if self.batch_size == 0 {
            return Err(ValidationError::ZeroValue("loader.batch_size".to_string()));
        }

        Ok(())
    }
}

/// A named pairing of extractor and loader settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DefinitionConfig {
    /// Name the definition is registered and looked up under.
    pub name: String,
    pub extractor: ExtractorConfig,
    pub loader: LoaderConfig,
}

impl DefinitionConfig {
    /// Validates the definition and both of its sides.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if normalize_definition_name(&self.name).is_empty() {
            return Err(ValidationError::EmptyValue("name".to_string()));
        }

        self.extractor.validate()?;
        self.loader.validate()
    }
}

/// Normalizes a definition name for lookups.
///
/// Dashes and underscores are removed and the result is lowercased, so `merchant-seo-data`,
/// `merchant_seo_data` and `MerchantSeoData` all refer to the same definition.
pub fn normalize_definition_name(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

fn default_unique_columns() -> Vec<String> {
    vec!["id".to_string()]
}

fn default_update_column() -> String {
    "updated_at".to_string()
}

fn default_chunk_size() -> usize {
    ExtractorConfig::DEFAULT_CHUNK_SIZE
}

fn default_batch_size() -> usize {
    LoaderConfig::DEFAULT_BATCH_SIZE
}

fn default_true() -> bool {
    true
}
