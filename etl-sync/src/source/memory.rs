use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::bail;
use crate::dialect::Dialect;
use crate::error::{ErrorKind, EtlResult};
use crate::source::{PageQuery, PageRequest, Source};
use crate::types::Record;

/// In-memory [`Source`] for tests and development.
///
/// Fingerprints are computed in process with the same rules the SQL expression follows.
#[derive(Debug, Clone)]
pub struct MemorySource {
    base_query: String,
    rows: Arc<Vec<Record>>,
    page_fetches: Arc<AtomicUsize>,
    fail_at_page: Option<usize>,
}

impl MemorySource {
    /// Creates a source named `relation` holding `rows`.
    pub fn new(relation: &str, rows: Vec<Record>) -> Self {
        Self {
            base_query: format!("select * from {relation}"),
            rows: Arc::new(rows),
            page_fetches: Arc::new(AtomicUsize::new(0)),
            fail_at_page: None,
        }
    }

    /// Makes the `page`-th fetch (1-based) fail with [`ErrorKind::SourceQueryFailed`].
    pub fn fail_at_page(mut self, page: usize) -> Self {
        self.fail_at_page = Some(page);
        self
    }

    /// Returns how many pages were fetched so far, including empty ones.
    pub fn page_fetches(&self) -> usize {
        self.page_fetches.load(Ordering::SeqCst)
    }
}

impl Source for MemorySource {
    fn base_query(&self) -> &str {
        &self.base_query
    }

    fn page_query(&self, request: &PageRequest<'_>) -> String {
        PageQuery::render(Dialect::Postgres, &self.base_query, request).sql
    }

    async fn fetch_page(&self, request: &PageRequest<'_>) -> EtlResult<Vec<Record>> {
        let page = self.page_fetches.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_at_page == Some(page) {
            bail!(
                ErrorKind::SourceQueryFailed,
                "Memory source page fetch failed",
                format!("page {page}")
            );
        }

        let mut rows = self
            .rows
            .iter()
            .filter(|row| match request.watermark {
                Some((column, minimum)) => row
                    .get(column)
                    .and_then(|value| value.partial_cmp(minimum))
                    .is_some_and(|ordering| ordering.is_ge()),
                None => true,
            })
            .map(|row| {
                let fingerprint = row.compute_fingerprint(request.unique_columns);
                row.clone().with_fingerprint(fingerprint)
            })
            .filter(|row| match request.after {
                Some(after) => row.fingerprint().is_some_and(|fingerprint| fingerprint > after),
                None => true,
            })
            .collect::<Vec<_>>();

        rows.sort_by(|a, b| a.fingerprint().cmp(&b.fingerprint()));
        rows.truncate(request.limit);

        Ok(rows)
    }

    async fn count(&self) -> EtlResult<u64> {
        Ok(self.rows.len() as u64)
    }
}
