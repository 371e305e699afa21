use sqlx::PgPool;
use tracing::debug;

use crate::conversions::postgres::decode_record;
use crate::dialect::Dialect;
use crate::error::EtlResult;
use crate::source::{PageQuery, PageRequest, Source};
use crate::types::Record;

/// A [`Source`] reading pages of a base query from Postgres.
#[derive(Debug, Clone)]
pub struct PgSource {
    pool: PgPool,
    base_query: String,
}

impl PgSource {
    pub fn new(pool: PgPool, base_query: impl Into<String>) -> Self {
        Self {
            pool,
            base_query: base_query.into(),
        }
    }
}

impl Source for PgSource {
    fn base_query(&self) -> &str {
        &self.base_query
    }

    fn page_query(&self, request: &PageRequest<'_>) -> String {
        PageQuery::render(Dialect::Postgres, &self.base_query, request).sql
    }

    async fn fetch_page(&self, request: &PageRequest<'_>) -> EtlResult<Vec<Record>> {
        let PageQuery { sql, parameters } =
            PageQuery::render(Dialect::Postgres, &self.base_query, request);

        let mut query = sqlx::query(&sql);
        for parameter in parameters {
            query = query.bind(parameter);
        }

        let rows = query.fetch_all(&self.pool).await?;
        debug!(rows = rows.len(), limit = request.limit, "fetched source page");

        rows.iter().map(decode_record).collect()
    }

    async fn count(&self) -> EtlResult<u64> {
        let sql = format!(
            "select count(*) from ({}) as source",
            self.base_query.trim().trim_end_matches(';')
        );
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;

        Ok(count.max(0) as u64)
    }
}
