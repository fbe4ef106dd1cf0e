//! Datastore traits
//!
//! A [`RecordStore`] is the handle passed into an aggregation. Each call opens
//! its own [`StoreSession`], runs exactly one grouped-sum query through it and
//! closes it again, so concurrent aggregations never share a connection.

use crate::error::Result;
use crate::types::{AggregatedRow, Granularity, TimeRange};
use async_trait::async_trait;
use std::time::Duration;

/// One grouped-sum request against a datastore
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketQuery {
    /// Records with a timestamp inside this range (both ends included) are summed
    pub range: TimeRange,
    /// Grouping unit; row labels are the truncated bucket start
    pub granularity: Granularity,
    /// Deadline for the query, if any
    pub timeout: Option<Duration>,
}

impl BucketQuery {
    pub fn new(range: TimeRange, granularity: Granularity) -> Self {
        Self {
            range,
            granularity,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A source of timestamped records that can open query sessions
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Session type handed out by [`RecordStore::open`]
    type Session: StoreSession;

    /// Acquire a fresh session (connection, file handles, snapshot)
    async fn open(&self) -> Result<Self::Session>;
}

/// A scoped acquisition of a [`RecordStore`]
#[async_trait]
pub trait StoreSession: Send + Sized {
    /// Sum record values per bucket
    ///
    /// Returns one row per bucket that holds at least one matching record,
    /// in no particular order, labelled with
    /// [`Granularity::bucket_label`](crate::types::Granularity::bucket_label).
    async fn sum_by_bucket(&mut self, query: &BucketQuery) -> Result<Vec<AggregatedRow>>;

    /// Release the session
    async fn close(self) -> Result<()>;
}
