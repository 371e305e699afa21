//! Value types flowing through a synchronization run.

mod cell;
mod fingerprint;
mod record;

pub use cell::Cell;
pub use fingerprint::Fingerprint;
pub use record::Record;

pub use etl_postgres::types::TableName;
