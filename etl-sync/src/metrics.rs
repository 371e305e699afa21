//! Metric names emitted during runs.

/// Label for the loader action in [`ETL_SYNC_LOADED_ROWS_TOTAL`].
pub const ACTION_LABEL: &str = "action";

/// Counter for rows fetched from sources.
pub const ETL_SYNC_EXTRACTED_ROWS_TOTAL: &str = "etl_sync_extracted_rows_total";

/// Counter for records handled by loaders, labelled by `insert`, `update` or `skip`.
pub const ETL_SYNC_LOADED_ROWS_TOTAL: &str = "etl_sync_loaded_rows_total";

/// Counter for committed loader transactions.
pub const ETL_SYNC_TRANSACTIONS_COMMITTED_TOTAL: &str = "etl_sync_transactions_committed_total";
