//! Conversions between [`crate::types::Cell`] and database representations.

pub mod postgres;
