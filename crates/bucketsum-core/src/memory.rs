//! In-process datastore
//!
//! Holds an immutable snapshot of records. Sessions share the snapshot
//! through an `Arc`, so opening one is cheap and nothing is mutated while
//! queries run.

use crate::error::Result;
use crate::store::{BucketQuery, RecordStore, StoreSession};
use crate::types::{AggregatedRow, BucketLabel, Record};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Datastore over an in-memory record snapshot
///
/// # Examples
/// ```
/// use bucketsum_core::memory::MemoryStore;
/// use bucketsum_core::store::{BucketQuery, RecordStore, StoreSession};
/// use bucketsum_core::types::{Granularity, Record, TimeRange};
/// use chrono::NaiveDateTime;
///
/// # tokio_test::block_on(async {
/// let ts = NaiveDateTime::parse_from_str("2022-01-02T10:00:00", "%Y-%m-%dT%H:%M:%S").unwrap();
/// let store = MemoryStore::new(vec![Record::new(ts, 5.0)]);
///
/// let range = TimeRange::parse("2022-01-01T00:00:00", "2022-03-01T00:00:00").unwrap();
/// let mut session = store.open().await.unwrap();
/// let rows = session
///     .sum_by_bucket(&BucketQuery::new(range, Granularity::Day))
///     .await
///     .unwrap();
/// session.close().await.unwrap();
///
/// assert_eq!(rows.len(), 1);
/// assert_eq!(rows[0].label.as_str(), "2022-01-02T00:00:00");
/// assert_eq!(rows[0].total, 5.0);
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<[Record]>,
}

impl MemoryStore {
    pub fn new(records: impl Into<Arc<[Record]>>) -> Self {
        Self {
            records: records.into(),
        }
    }

    /// Number of records in the snapshot
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Session over a [`MemoryStore`] snapshot
#[derive(Debug)]
pub struct MemorySession {
    records: Arc<[Record]>,
}

#[async_trait]
impl RecordStore for MemoryStore {
    type Session = MemorySession;

    async fn open(&self) -> Result<MemorySession> {
        Ok(MemorySession {
            records: Arc::clone(&self.records),
        })
    }
}

#[async_trait]
impl StoreSession for MemorySession {
    async fn sum_by_bucket(&mut self, query: &BucketQuery) -> Result<Vec<AggregatedRow>> {
        Ok(sum_records(self.records.iter(), query))
    }

    async fn close(self) -> Result<()> {
        Ok(())
    }
}

/// Group `records` falling inside the query range by bucket and sum them
///
/// Shared by stores that evaluate the grouping client-side.
pub fn sum_records<'a, I>(records: I, query: &BucketQuery) -> Vec<AggregatedRow>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut groups: BTreeMap<BucketLabel, (f64, u64)> = BTreeMap::new();
    let mut outside = 0usize;
    for record in records {
        if !query.range.contains(record.timestamp) {
            outside += 1;
            continue;
        }
        let group = groups
            .entry(query.granularity.bucket_label(record.timestamp))
            .or_insert((0.0, 0));
        group.0 += record.value;
        group.1 += 1;
    }

    debug!(
        "Grouped records into {} {} buckets, {} outside the range",
        groups.len(),
        query.granularity,
        outside
    );
    groups
        .into_iter()
        .map(|(label, (total, records))| AggregatedRow {
            label,
            total,
            records,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Granularity, LABEL_FORMAT, TimeRange};
    use chrono::NaiveDateTime;

    fn record(raw: &str, value: f64) -> Record {
        Record::new(NaiveDateTime::parse_from_str(raw, LABEL_FORMAT).unwrap(), value)
    }

    fn query(from: &str, upto: &str, granularity: Granularity) -> BucketQuery {
        BucketQuery::new(TimeRange::parse(from, upto).unwrap(), granularity)
    }

    #[test]
    fn test_groups_by_truncated_bucket() {
        let records = [
            record("2022-01-02T10:00:00", 5.0),
            record("2022-01-02T23:59:59", 1.5),
            record("2022-01-03T00:00:00", 2.0),
        ];
        let rows = sum_records(
            &records,
            &query("2022-01-01T00:00:00", "2022-01-31T00:00:00", Granularity::Day),
        );

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].label.as_str(), "2022-01-02T00:00:00");
        assert_eq!(rows[0].total, 6.5);
        assert_eq!(rows[0].records, 2);
        assert_eq!(rows[1].label.as_str(), "2022-01-03T00:00:00");
        assert_eq!(rows[1].total, 2.0);
    }

    #[test]
    fn test_range_bounds_are_inclusive() {
        let records = [
            record("2022-01-01T00:00:00", 1.0),
            record("2022-03-01T00:00:00", 2.0),
            record("2022-03-01T00:00:01", 100.0),
            record("2021-12-31T23:59:59", 100.0),
        ];
        let rows = sum_records(
            &records,
            &query("2022-01-01T00:00:00", "2022-03-01T00:00:00", Granularity::Month),
        );

        let totals: Vec<_> = rows.iter().map(|r| (r.label.as_str(), r.total)).collect();
        assert_eq!(
            totals,
            [("2022-01-01T00:00:00", 1.0), ("2022-03-01T00:00:00", 2.0)]
        );
    }

    #[test]
    fn test_zero_sum_bucket_is_still_reported() {
        let records = [
            record("2022-01-01T05:10:00", 3.0),
            record("2022-01-01T05:20:00", -3.0),
        ];
        let rows = sum_records(
            &records,
            &query("2022-01-01T00:00:00", "2022-01-01T23:00:00", Granularity::Hour),
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].label.as_str(), "2022-01-01T05:00:00");
        assert_eq!(rows[0].total, 0.0);
        assert_eq!(rows[0].records, 2);
    }

    #[tokio::test]
    async fn test_sessions_share_snapshot() {
        let store = MemoryStore::new(vec![record("2022-01-02T10:00:00", 5.0)]);
        assert_eq!(store.len(), 1);

        let q = query("2022-01-01T00:00:00", "2022-01-31T00:00:00", Granularity::Month);
        let mut first = store.open().await.unwrap();
        let mut second = store.open().await.unwrap();
        assert_eq!(
            first.sum_by_bucket(&q).await.unwrap(),
            second.sum_by_bucket(&q).await.unwrap()
        );
        first.close().await.unwrap();
        second.close().await.unwrap();
    }

    #[test]
    fn test_empty_store() {
        let store = MemoryStore::default();
        assert!(store.is_empty());
        let rows = tokio_test::block_on(async {
            let mut session = store.open().await.unwrap();
            session
                .sum_by_bucket(&query(
                    "2022-01-01T00:00:00",
                    "2022-01-31T00:00:00",
                    Granularity::Day,
                ))
                .await
                .unwrap()
        });
        assert!(rows.is_empty());
    }
}
