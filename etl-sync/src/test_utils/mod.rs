//! Helpers for tests running against a live Postgres server.

pub mod database;
