//! Sources the fingerprinting extractor pages through.

mod base;
pub mod memory;
pub mod postgres;

pub use base::{PageQuery, PageRequest, Source};
