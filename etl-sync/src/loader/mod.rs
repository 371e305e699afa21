//! Loaders reconciling extracted records with a destination.

mod base;
mod hash_index;
mod hooks;
mod index;
mod statement;

pub use base::Loader;
pub use hash_index::{HashIndexLoader, LoaderSettings};
pub use hooks::{RecordHook, record_hook};
pub use index::FingerprintIndex;
pub use statement::{InsertStatement, UpdateStatement};
