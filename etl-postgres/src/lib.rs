//! Postgres helpers shared by the synchronization engine and the runner.
//!
//! Contains table name handling, connection pool construction and, behind the `test-utils`
//! feature, utilities to create and drop throwaway databases.

pub mod sqlx;
pub mod types;
