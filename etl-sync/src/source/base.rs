use std::future::Future;

use crate::dialect::{Dialect, FINGERPRINT_COLUMN};
use crate::error::EtlResult;
use crate::types::{Cell, Fingerprint, Record};

/// Parameters of a single page fetch.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest<'a> {
    /// Ordered identity columns the fingerprint is computed over.
    pub unique_columns: &'a [String],
    /// Fingerprint of the last row of the previous page, if any.
    pub after: Option<&'a Fingerprint>,
    /// Watermark column and the minimum value rows must have in it.
    pub watermark: Option<(&'a str, &'a Cell)>,
    /// Maximum number of rows to return.
    pub limit: usize,
}

/// A rendered page query together with its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PageQuery {
    pub sql: String,
    pub parameters: Vec<Cell>,
}

impl PageQuery {
    /// Renders the page query for `request` around `base_query`.
    ///
    /// The base query is wrapped as a derived table, never rewritten, and the fingerprint is
    /// added as the `_fingerprint` column which the page is ordered by.
    pub fn render(dialect: Dialect, base_query: &str, request: &PageRequest<'_>) -> Self {
        let fingerprint_column = dialect.quote_identifier(FINGERPRINT_COLUMN);
        let mut conditions = Vec::new();
        let mut parameters = Vec::new();

        if let Some(after) = request.after {
            parameters.push(Cell::from(after.clone()));
            conditions.push(format!(
                "{fingerprint_column} > {}",
                dialect.placeholder(parameters.len())
            ));
        }

        if let Some((column, value)) = request.watermark {
            parameters.push(value.clone());
            conditions.push(format!(
                "{} >= {}",
                dialect.quote_identifier(column),
                dialect.placeholder(parameters.len())
            ));
        }

        let mut sql = format!(
            "select * from (select source.*, {} as {fingerprint_column} from ({}) as source) as fingerprinted",
            dialect.fingerprint_expression(request.unique_columns),
            base_query.trim().trim_end_matches(';')
        );

        if !conditions.is_empty() {
            sql.push_str(" where ");
            sql.push_str(&conditions.join(" and "));
        }

        sql.push_str(&format!(
            " order by {fingerprint_column} asc {}",
            dialect.limit_clause(request.limit)
        ));

        Self { sql, parameters }
    }
}

/// A relation whose rows can be fetched in fingerprint order.
pub trait Source {
    /// Returns the selection every page query wraps.
    fn base_query(&self) -> &str;

    /// Returns the text of the query [`Source::fetch_page`] issues for `request`.
    fn page_query(&self, request: &PageRequest<'_>) -> String;

    /// Fetches up to `request.limit` rows whose fingerprint is greater than `request.after`,
    /// ordered by fingerprint ascending.
    ///
    /// Every returned record carries its fingerprint.
    fn fetch_page(
        &self,
        request: &PageRequest<'_>,
    ) -> impl Future<Output = EtlResult<Vec<Record>>> + Send;

    /// Counts the rows of the base selection.
    fn count(&self) -> impl Future<Output = EtlResult<u64>> + Send;
}
