//! Error types for bucketsum
//!
//! This module defines the error taxonomy used throughout the bucketsum
//! library. The aggregation path only ever produces two kinds:
//! [`BucketsumError::MalformedRange`] for bad input and
//! [`BucketsumError::DataSource`] for anything that goes wrong while talking
//! to the datastore. The remaining variants belong to the command-line front
//! end.
//!
//! # Example
//!
//! ```
//! use bucketsum_core::error::{BucketsumError, Result};
//!
//! fn parse_bound(raw: &str) -> Result<chrono::NaiveDateTime> {
//!     chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
//!         .map_err(|e| BucketsumError::malformed_range(raw, e.to_string()))
//! }
//!
//! assert!(parse_bound("not-a-date").unwrap_err().is_malformed_range());
//! ```

use std::error::Error as StdError;
use std::time::Duration;
use thiserror::Error;

/// Boxed underlying cause attached to a [`BucketsumError::DataSource`]
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Main error type for bucketsum operations
#[derive(Error, Debug)]
pub enum BucketsumError {
    /// A date string could not be parsed, the range is inverted, or the
    /// granularity was rejected by a strict policy
    #[error("Malformed range '{input}': {reason}")]
    MalformedRange {
        /// The offending input as received
        input: String,
        /// Why it was rejected
        reason: String,
    },

    /// The datastore could not be reached, the query failed, or it timed out
    #[error("Data source error during {operation}: {source}")]
    DataSource {
        /// Which step against the datastore failed (open, query, ...)
        operation: &'static str,
        /// The original cause
        #[source]
        source: BoxError,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BucketsumError {
    /// Build a `MalformedRange` error
    pub fn malformed_range(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedRange {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Build a `DataSource` error, keeping `source` as the cause
    pub fn data_source<E>(operation: &'static str, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::DataSource {
            operation,
            source: source.into(),
        }
    }

    /// Whether this is a `MalformedRange` error
    pub fn is_malformed_range(&self) -> bool {
        matches!(self, Self::MalformedRange { .. })
    }

    /// Whether this is a `DataSource` error
    pub fn is_data_source(&self) -> bool {
        matches!(self, Self::DataSource { .. })
    }
}

/// Cause attached to a `DataSource` error when a query exceeds its deadline
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("query did not complete within {0:?}")]
pub struct QueryTimeout(pub Duration);

/// Convenience type alias for Results in bucketsum
pub type Result<T> = std::result::Result<T, BucketsumError>;
