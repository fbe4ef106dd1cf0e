//! Core types, traits, and utilities for bucketsum
//!
//! This crate provides the foundational types, error handling, the bucket
//! enumerator, and the datastore traits used by all other bucketsum crates.

pub mod buckets;
pub mod error;
pub mod memory;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use buckets::{BucketAlignment, Buckets, enumerate, expected_labels};
pub use error::{BucketsumError, Result};
pub use store::{BucketQuery, RecordStore, StoreSession};
pub use types::{
    AggregatedRow, BucketLabel, BucketPoint, Granularity, GranularityPolicy, Record, SeriesResult,
    TimeRange,
};
