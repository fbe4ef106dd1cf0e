//! Aggregation module for dense bucketed sums
//!
//! The [`Aggregator`] turns a `(dt_from, dt_upto, group_type)` request into a
//! gap-filled series. It computes the expected bucket labels locally, asks the
//! datastore for the sums of the buckets that actually hold data, and then
//! lays those sums onto the expected labels so every bucket gets a value.
//!
//! A bucket whose records sum to zero looks exactly like a bucket with no
//! records in the JSON result; [`Aggregator::aggregate_points`] keeps the two
//! apart for callers that care.
//!
//! # Examples
//!
//! ```
//! use bucketsum::aggregation::Aggregator;
//! use bucketsum_core::memory::MemoryStore;
//! use bucketsum_core::types::Record;
//! use chrono::NaiveDateTime;
//!
//! # tokio_test::block_on(async {
//! let ts = NaiveDateTime::parse_from_str("2022-01-02T10:00:00", "%Y-%m-%dT%H:%M:%S").unwrap();
//! let store = MemoryStore::new(vec![Record::new(ts, 5.0)]);
//!
//! let json = Aggregator::new()
//!     .aggregate(&store, "2022-01-01T00:00:00", "2022-03-01T00:00:00", "month")
//!     .await
//!     .unwrap();
//! assert_eq!(
//!     json,
//!     r#"{"dataset":[5,0,0],"labels":["2022-01-01T00:00:00","2022-02-01T00:00:00","2022-03-01T00:00:00"]}"#
//! );
//! # });
//! ```

use crate::error::{BucketsumError, Result};
use bucketsum_core::buckets::{BucketAlignment, expected_labels};
use bucketsum_core::error::QueryTimeout;
use bucketsum_core::store::{BucketQuery, RecordStore, StoreSession};
use bucketsum_core::types::{
    AggregatedRow, BucketLabel, BucketPoint, GranularityPolicy, SeriesResult, TimeRange,
};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Runs bucketed-sum requests against a datastore
///
/// Holds configuration only; one instance can serve concurrent requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct Aggregator {
    policy: GranularityPolicy,
    alignment: BucketAlignment,
    timeout: Option<Duration>,
}

impl Aggregator {
    /// Aggregator with month fallback, truncated alignment and no timeout
    pub fn new() -> Self {
        Self::default()
    }

    /// How `group_type` strings are resolved
    pub fn with_policy(mut self, policy: GranularityPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Where label enumeration starts
    pub fn with_alignment(mut self, alignment: BucketAlignment) -> Self {
        self.alignment = alignment;
        self
    }

    /// Deadline for the datastore query
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Aggregate and encode as `{"dataset": [...], "labels": [...]}`
    pub async fn aggregate<S: RecordStore>(
        &self,
        store: &S,
        dt_from: &str,
        dt_upto: &str,
        group_type: &str,
    ) -> Result<String> {
        Ok(self
            .aggregate_series(store, dt_from, dt_upto, group_type)
            .await?
            .to_json())
    }

    /// Aggregate into a [`SeriesResult`]
    pub async fn aggregate_series<S: RecordStore>(
        &self,
        store: &S,
        dt_from: &str,
        dt_upto: &str,
        group_type: &str,
    ) -> Result<SeriesResult> {
        let (labels, rows) = self.collect(store, dt_from, dt_upto, group_type).await?;
        Ok(reconcile(labels, &rows))
    }

    /// Aggregate into per-bucket points that record whether data was present
    pub async fn aggregate_points<S: RecordStore>(
        &self,
        store: &S,
        dt_from: &str,
        dt_upto: &str,
        group_type: &str,
    ) -> Result<Vec<BucketPoint>> {
        let (labels, rows) = self.collect(store, dt_from, dt_upto, group_type).await?;
        Ok(reconcile_points(labels, &rows))
    }

    /// Expected labels for a request, without touching any datastore
    pub fn labels(&self, dt_from: &str, dt_upto: &str, group_type: &str) -> Result<Vec<BucketLabel>> {
        let range = TimeRange::parse(dt_from, dt_upto)?;
        let granularity = self.policy.resolve(group_type)?;
        Ok(expected_labels(&range, granularity, self.alignment))
    }

    async fn collect<S: RecordStore>(
        &self,
        store: &S,
        dt_from: &str,
        dt_upto: &str,
        group_type: &str,
    ) -> Result<(Vec<BucketLabel>, Vec<AggregatedRow>)> {
        let range = TimeRange::parse(dt_from, dt_upto)?;
        let granularity = self.policy.resolve(group_type)?;
        let labels = expected_labels(&range, granularity, self.alignment);
        debug!(
            "Expecting {} {} buckets between {} and {}",
            labels.len(),
            granularity,
            dt_from,
            dt_upto
        );

        let query = BucketQuery::new(range, granularity).with_timeout(self.timeout);
        let rows = query_store(store, &query).await?;
        debug!("Datastore returned {} non-empty buckets", rows.len());
        Ok((labels, rows))
    }
}

/// Open a session, run the query and release the session whatever the outcome
async fn query_store<S: RecordStore>(store: &S, query: &BucketQuery) -> Result<Vec<AggregatedRow>> {
    let mut session = store.open().await?;
    let outcome = run_query(&mut session, query).await;
    if let Err(e) = session.close().await {
        warn!("Failed to release datastore session: {}", e);
    }
    outcome
}

async fn run_query<T: StoreSession>(session: &mut T, query: &BucketQuery) -> Result<Vec<AggregatedRow>> {
    match query.timeout {
        Some(limit) => tokio::time::timeout(limit, session.sum_by_bucket(query))
            .await
            .map_err(|_| BucketsumError::data_source("query", QueryTimeout(limit)))?,
        None => session.sum_by_bucket(query).await,
    }
}

/// Lay sparse datastore rows onto the expected labels, zero-filling gaps
///
/// Rows whose label is not expected are ignored.
pub fn reconcile(labels: Vec<BucketLabel>, rows: &[AggregatedRow]) -> SeriesResult {
    let totals = index_rows(&labels, rows);
    let dataset = labels
        .iter()
        .map(|label| totals.get(label.as_str()).map_or(0.0, |row| row.total))
        .collect();
    SeriesResult { dataset, labels }
}

/// Like [`reconcile`], keeping track of which buckets the datastore returned
pub fn reconcile_points(labels: Vec<BucketLabel>, rows: &[AggregatedRow]) -> Vec<BucketPoint> {
    let totals = index_rows(&labels, rows);
    labels
        .into_iter()
        .map(|label| match totals.get(label.as_str()) {
            Some(row) => BucketPoint {
                total: row.total,
                present: true,
                label,
            },
            None => BucketPoint {
                total: 0.0,
                present: false,
                label,
            },
        })
        .collect()
}

fn index_rows<'a>(labels: &[BucketLabel], rows: &'a [AggregatedRow]) -> HashMap<&'a str, &'a AggregatedRow> {
    let index: HashMap<&str, &AggregatedRow> = rows.iter().map(|row| (row.label.as_str(), row)).collect();

    let unmatched = index
        .keys()
        .filter(|key| labels.binary_search_by(|label| label.as_str().cmp(**key)).is_err())
        .count();
    if unmatched > 0 {
        debug!("{} datastore buckets fall outside the expected labels", unmatched);
    }
    index
}
