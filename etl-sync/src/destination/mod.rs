//! Destinations the hash index loader reads fingerprints from and writes records to.

mod base;
pub mod memory;
pub mod postgres;

pub use base::Destination;
