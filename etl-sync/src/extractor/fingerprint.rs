use std::sync::{Mutex, PoisonError};

use etl_config::shared::ExtractorConfig;
use futures::{Stream, TryStreamExt, stream};
use metrics::counter;
use tracing::debug;

use crate::bail;
use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::extractor::Extractor;
use crate::metrics::ETL_SYNC_EXTRACTED_ROWS_TOTAL;
use crate::runtime::ExtractorRuntimeInfo;
use crate::source::{PageRequest, Source};
use crate::types::{Cell, Fingerprint, Record};

/// Settings of a [`FingerprintExtractor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorSettings {
    pub unique_columns: Vec<String>,
    pub chunk_size: usize,
    pub update_column: String,
}

impl ExtractorSettings {
    pub fn new(unique_columns: Vec<String>) -> Self {
        Self {
            unique_columns,
            chunk_size: ExtractorConfig::DEFAULT_CHUNK_SIZE,
            update_column: "updated_at".to_string(),
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_update_column(mut self, update_column: impl Into<String>) -> Self {
        self.update_column = update_column.into();
        self
    }

    fn validate(&self) -> EtlResult<()> {
        if self.chunk_size == 0 {
            bail!(ErrorKind::ConfigError, "Extractor chunk size must be positive");
        }

        if self.unique_columns.is_empty() {
            bail!(
                ErrorKind::ConfigError,
                "Extractor needs at least one unique column"
            );
        }

        Ok(())
    }
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self::new(vec!["id".to_string()])
    }
}

impl From<&ExtractorConfig> for ExtractorSettings {
    fn from(config: &ExtractorConfig) -> Self {
        Self {
            unique_columns: config.unique_columns.clone(),
            chunk_size: config.chunk_size,
            update_column: config.update_column.clone(),
        }
    }
}

/// Cursor state carried between page fetches.
struct PageState {
    after: Option<Fingerprint>,
    watermark: Option<Cell>,
}

/// Extractor paginating a [`Source`] by fingerprint instead of offsets.
///
/// Every page asks for rows whose fingerprint is greater than the last one seen, ordered by
/// fingerprint, so the cost of a page does not grow with its position. Extraction ends at the
/// first empty page.
#[derive(Debug)]
pub struct FingerprintExtractor<S> {
    source: S,
    settings: ExtractorSettings,
    runtime_info: Mutex<ExtractorRuntimeInfo>,
}

impl<S> FingerprintExtractor<S>
where
    S: Source,
{
    pub fn new(source: S, settings: ExtractorSettings) -> EtlResult<Self> {
        settings.validate()?;

        Ok(Self {
            source,
            settings,
            runtime_info: Mutex::new(ExtractorRuntimeInfo::default()),
        })
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn settings(&self) -> &ExtractorSettings {
        &self.settings
    }

    fn record_page(&self, query: String, rows: usize) {
        let mut runtime_info = self
            .runtime_info
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        runtime_info.extracted_rows += rows as u64;
        runtime_info.current_query = Some(query);

        counter!(ETL_SYNC_EXTRACTED_ROWS_TOTAL).increment(rows as u64);
    }

    async fn next_page(&self, state: &PageState) -> EtlResult<Vec<Record>> {
        let request = PageRequest {
            unique_columns: &self.settings.unique_columns,
            after: state.after.as_ref(),
            watermark: state
                .watermark
                .as_ref()
                .map(|value| (self.settings.update_column.as_str(), value)),
            limit: self.settings.chunk_size,
        };

        let query = self.source.page_query(&request);
        let page = self.source.fetch_page(&request).await?;

        debug!(rows = page.len(), after = ?state.after, "extracted page");
        self.record_page(query, page.len());

        Ok(page)
    }
}

impl<S> Extractor for FingerprintExtractor<S>
where
    S: Source + Send + Sync,
{
    fn extract(
        &self,
        watermark: Option<Cell>,
    ) -> impl Stream<Item = EtlResult<Record>> + Send + '_ {
        *self
            .runtime_info
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = ExtractorRuntimeInfo::default();

        let state = PageState {
            after: None,
            watermark,
        };

        stream::try_unfold(state, move |mut state| async move {
            let page = self.next_page(&state).await?;

            let Some(last) = page.last() else {
                return Ok(None);
            };

            let Some(fingerprint) = last.fingerprint().cloned() else {
                bail!(
                    ErrorKind::InvalidData,
                    "Extracted record is missing its fingerprint"
                );
            };

            state.after = Some(fingerprint);

            let records = page.into_iter().map(Ok::<Record, EtlError>);

            Ok(Some((stream::iter(records), state)))
        })
        .try_flatten()
    }

    fn unique_columns(&self) -> &[String] {
        &self.settings.unique_columns
    }

    fn runtime_info(&self) -> ExtractorRuntimeInfo {
        self.runtime_info
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;

    use super::*;
    use crate::source::memory::MemorySource;

    fn rows(count: i32) -> Vec<Record> {
        (1..=count)
            .map(|id| Record::from_pairs([("id", Cell::I32(id)), ("name", Cell::from("row"))]))
            .collect()
    }

    fn extractor(count: i32, chunk_size: usize) -> FingerprintExtractor<MemorySource> {
        FingerprintExtractor::new(
            MemorySource::new("products", rows(count)),
            ExtractorSettings::default().with_chunk_size(chunk_size),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn records_are_ordered_by_fingerprint() {
        let extractor = extractor(7, 3);
        let records: Vec<Record> = extractor.extract(None).try_collect().await.unwrap();

        let fingerprints = records
            .iter()
            .map(|record| record.fingerprint().cloned().unwrap())
            .collect::<Vec<_>>();
        let mut sorted = fingerprints.clone();
        sorted.sort();

        assert_eq!(fingerprints, sorted);
        assert_eq!(records.len(), 7);
        assert_eq!(extractor.runtime_info().extracted_rows, 7);
    }

    #[tokio::test]
    async fn nothing_is_fetched_before_polling() {
        let extractor = extractor(3, 2);
        let stream = extractor.extract(None);

        assert_eq!(extractor.source().page_fetches(), 0);
        drop(stream);
        assert_eq!(extractor.runtime_info(), ExtractorRuntimeInfo::default());
    }

    #[tokio::test]
    async fn current_query_tracks_last_page() {
        let extractor = extractor(2, 5);
        let _: Vec<Record> = extractor.extract(None).try_collect().await.unwrap();

        let query = extractor.runtime_info().current_query.unwrap();
        assert!(query.contains("where _fingerprint > $1"));
        assert!(query.ends_with("limit 5"));
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let err = FingerprintExtractor::new(
            MemorySource::new("products", Vec::new()),
            ExtractorSettings::default().with_chunk_size(0),
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }
}
