//! Bucket enumeration
//!
//! Produces the ordered sequence of bucket starts covering a time range at a
//! given [`Granularity`]. Enumeration starts at the lower bound, advances one
//! step at a time, and stops at the first point strictly after the upper
//! bound; a point equal to the upper bound is still emitted.
//!
//! # Examples
//!
//! ```
//! use bucketsum_core::buckets::enumerate;
//! use bucketsum_core::types::Granularity;
//! use chrono::NaiveDateTime;
//!
//! let from = NaiveDateTime::parse_from_str("2022-01-01T00:00:00", "%Y-%m-%dT%H:%M:%S").unwrap();
//! let upto = NaiveDateTime::parse_from_str("2022-03-01T00:00:00", "%Y-%m-%dT%H:%M:%S").unwrap();
//!
//! let labels: Vec<String> = enumerate(from, upto, Granularity::Month)
//!     .labels()
//!     .map(|label| label.to_string())
//!     .collect();
//! assert_eq!(
//!     labels,
//!     ["2022-01-01T00:00:00", "2022-02-01T00:00:00", "2022-03-01T00:00:00"]
//! );
//! ```

use crate::types::{BucketLabel, Granularity, TimeRange};
use chrono::NaiveDateTime;
use std::iter::FusedIterator;

/// Where enumeration starts relative to the lower bound of a range
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum BucketAlignment {
    /// Start at the bucket containing the lower bound, so every label names
    /// a bucket boundary and compares equal to datastore labels
    #[default]
    Truncate,
    /// Start at the lower bound itself; hourly labels carry its
    /// minute/second offset and a monthly start late in a month may skip the
    /// following month
    Verbatim,
}

/// Lazy, restartable sequence of bucket starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Buckets {
    from: NaiveDateTime,
    upto: NaiveDateTime,
    granularity: Granularity,
}

/// Enumerate bucket starts from `from` up to and including `upto`
///
/// An inverted range yields an empty sequence.
pub fn enumerate(from: NaiveDateTime, upto: NaiveDateTime, granularity: Granularity) -> Buckets {
    Buckets {
        from,
        upto,
        granularity,
    }
}

/// Build the expected label sequence for a range
pub fn expected_labels(
    range: &TimeRange,
    granularity: Granularity,
    alignment: BucketAlignment,
) -> Vec<BucketLabel> {
    let start = match alignment {
        BucketAlignment::Truncate => granularity.truncate(range.from()),
        BucketAlignment::Verbatim => range.from(),
    };
    enumerate(start, range.upto(), granularity).labels().collect()
}

impl Buckets {
    /// Granularity being enumerated
    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Iterate the bucket starts
    pub fn iter(&self) -> BucketIter {
        BucketIter {
            next: Some(self.from),
            upto: self.upto,
            granularity: self.granularity,
        }
    }

    /// Iterate the bucket labels
    pub fn labels(&self) -> impl Iterator<Item = BucketLabel> + use<> {
        let granularity = self.granularity;
        self.iter().map(move |ts| granularity.label(ts))
    }
}

impl IntoIterator for Buckets {
    type Item = NaiveDateTime;
    type IntoIter = BucketIter;

    fn into_iter(self) -> BucketIter {
        self.iter()
    }
}

impl IntoIterator for &Buckets {
    type Item = NaiveDateTime;
    type IntoIter = BucketIter;

    fn into_iter(self) -> BucketIter {
        self.iter()
    }
}

/// Iterator over [`Buckets`]
#[derive(Debug, Clone)]
pub struct BucketIter {
    next: Option<NaiveDateTime>,
    upto: NaiveDateTime,
    granularity: Granularity,
}

impl Iterator for BucketIter {
    type Item = NaiveDateTime;

    fn next(&mut self) -> Option<NaiveDateTime> {
        let current = self.next.filter(|current| *current <= self.upto)?;
        self.next = self.granularity.advance(current);
        Some(current)
    }
}

impl FusedIterator for BucketIter {}
