//! PostgreSQL datastore for bucketsum
//!
//! Runs the grouped sum inside the database with `date_trunc`, one
//! connection per session.

pub mod store;

pub use store::{PgSession, PgStore, TableSchema};
