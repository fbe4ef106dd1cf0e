//! bucketsum - Dense hour/day/month bucketed sums over timestamped records
//!
//! This library provides functionality to:
//! - Enumerate the buckets a time range covers at hour, day or month granularity
//! - Sum record values per bucket in a datastore (memory, JSONL files or PostgreSQL)
//! - Reconcile the sparse datastore result into a gap-filled series
//! - Answer JSON requests and render results as tables or JSON
//!
//! # Examples
//!
//! ```no_run
//! use bucketsum::{aggregation::Aggregator, backend::{Backend, BackendConfig}};
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> bucketsum::Result<()> {
//!     let store = Backend::from_config(&BackendConfig {
//!         data_path: Some(PathBuf::from("./records")),
//!         ..Default::default()
//!     })?;
//!
//!     let json = Aggregator::new()
//!         .aggregate(&store, "2022-09-01T00:00:00", "2022-12-31T23:59:00", "month")
//!         .await?;
//!     println!("{json}");
//!     Ok(())
//! }
//! ```

pub mod aggregation;
pub mod backend;
pub mod cli;
pub mod output;
pub mod request;

pub use bucketsum_core::error;

// Re-export commonly used types
pub use error::{BucketsumError, Result};
pub use bucketsum_core::types::{BucketLabel, BucketPoint, Granularity, GranularityPolicy, SeriesResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
