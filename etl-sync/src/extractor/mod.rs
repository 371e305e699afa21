//! Extractors producing the records of a run.

mod base;
mod fingerprint;

pub use base::Extractor;
pub use fingerprint::{ExtractorSettings, FingerprintExtractor};
