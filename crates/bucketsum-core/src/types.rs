//! Core domain types for bucketsum
//!
//! This module contains the fundamental types used throughout the bucketsum
//! library: the time range being queried, the bucketing granularity, the
//! canonical bucket label, and the shapes of datastore rows and final results.

use crate::error::{BucketsumError, Result};
use chrono::{Datelike, Days, Duration, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Number, Value};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

/// Format of request bounds and of every bucket label
pub const LABEL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Label format for day and month buckets: the time of day is always reported as midnight
const MIDNIGHT_LABEL_FORMAT: &str = "%Y-%m-%dT00:00:00";

/// Largest integer an `f64` represents exactly (2^53)
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Bucketing unit for an aggregation
///
/// # Examples
/// ```
/// use bucketsum_core::types::Granularity;
/// use chrono::NaiveDateTime;
///
/// let ts = NaiveDateTime::parse_from_str("2022-02-17T13:45:10", "%Y-%m-%dT%H:%M:%S").unwrap();
/// assert_eq!(Granularity::Hour.bucket_label(ts).as_str(), "2022-02-17T13:00:00");
/// assert_eq!(Granularity::Day.bucket_label(ts).as_str(), "2022-02-17T00:00:00");
/// assert_eq!(Granularity::Month.bucket_label(ts).as_str(), "2022-02-01T00:00:00");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// One bucket per hour
    Hour,
    /// One bucket per calendar day
    Day,
    /// One bucket per calendar month
    Month,
}

impl Granularity {
    /// Name used in requests (`hour`, `day`, `month`)
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Hour => "hour",
            Granularity::Day => "day",
            Granularity::Month => "month",
        }
    }

    /// Start of the bucket containing `ts`
    pub fn truncate(self, ts: NaiveDateTime) -> NaiveDateTime {
        let date = ts.date();
        match self {
            Granularity::Hour => {
                date.and_time(NaiveTime::MIN) + Duration::hours(i64::from(ts.hour()))
            }
            Granularity::Day => date.and_time(NaiveTime::MIN),
            Granularity::Month => {
                (date - Days::new(u64::from(date.day0()))).and_time(NaiveTime::MIN)
            }
        }
    }

    /// Next enumeration point after `current`, or `None` past the end of the calendar
    ///
    /// Months step 32 days forward and then snap back to the first of the
    /// month reached. Starting from the first of a month this always lands on
    /// the first of the following month; from late in a month it can skip one.
    pub fn advance(self, current: NaiveDateTime) -> Option<NaiveDateTime> {
        match self {
            Granularity::Hour => current.checked_add_signed(Duration::hours(1)),
            Granularity::Day => current.checked_add_signed(Duration::days(1)),
            Granularity::Month => current
                .checked_add_signed(Duration::days(32))
                .map(|next| Granularity::Month.truncate(next)),
        }
    }

    /// Render an enumeration point as a label
    ///
    /// Hour labels keep the full time of `ts`; day and month labels always
    /// report `00:00:00`.
    pub fn label(self, ts: NaiveDateTime) -> BucketLabel {
        let format = match self {
            Granularity::Hour => LABEL_FORMAT,
            Granularity::Day | Granularity::Month => MIDNIGHT_LABEL_FORMAT,
        };
        BucketLabel(ts.format(format).to_string())
    }

    /// Label of the bucket a record with timestamp `ts` is summed into
    pub fn bucket_label(self, ts: NaiveDateTime) -> BucketLabel {
        self.label(self.truncate(ts))
    }

    /// Unit name understood by SQL `date_trunc`
    pub fn trunc_unit(self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = BucketsumError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "hour" => Ok(Granularity::Hour),
            "day" => Ok(Granularity::Day),
            "month" => Ok(Granularity::Month),
            other => Err(BucketsumError::malformed_range(
                other,
                "group_type must be one of hour, day, month",
            )),
        }
    }
}

/// How a raw `group_type` string is turned into a [`Granularity`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum GranularityPolicy {
    /// `hour` and `day` are honoured, anything else buckets by month
    #[default]
    FallbackToMonth,
    /// Only `hour`, `day` and `month` are accepted
    Strict,
}

impl GranularityPolicy {
    /// Resolve a raw `group_type`
    pub fn resolve(self, group_type: &str) -> Result<Granularity> {
        match self {
            GranularityPolicy::Strict => group_type.parse(),
            GranularityPolicy::FallbackToMonth => Ok(match group_type {
                "hour" => Granularity::Hour,
                "day" => Granularity::Day,
                _ => Granularity::Month,
            }),
        }
    }
}

/// Closed time range `[from, upto]` in naive local time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    from: NaiveDateTime,
    upto: NaiveDateTime,
}

impl TimeRange {
    /// Create a range, rejecting `from > upto`
    pub fn new(from: NaiveDateTime, upto: NaiveDateTime) -> Result<Self> {
        if from > upto {
            return Err(BucketsumError::malformed_range(
                format!("{} .. {}", from.format(LABEL_FORMAT), upto.format(LABEL_FORMAT)),
                "dt_from is after dt_upto",
            ));
        }
        Ok(Self { from, upto })
    }

    /// Parse `YYYY-MM-DDTHH:MM:SS` bounds
    ///
    /// # Examples
    /// ```
    /// use bucketsum_core::types::TimeRange;
    ///
    /// let range = TimeRange::parse("2022-09-01T00:00:00", "2022-12-31T23:59:00").unwrap();
    /// assert!(range.from() < range.upto());
    /// assert!(TimeRange::parse("not-a-date", "2022-12-31T23:59:00").is_err());
    /// ```
    pub fn parse(dt_from: &str, dt_upto: &str) -> Result<Self> {
        Self::new(parse_timestamp(dt_from)?, parse_timestamp(dt_upto)?)
    }

    /// Lower bound (inclusive)
    pub fn from(&self) -> NaiveDateTime {
        self.from
    }

    /// Upper bound (inclusive)
    pub fn upto(&self) -> NaiveDateTime {
        self.upto
    }

    /// Whether `ts` lies within the range, both ends included
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        self.from <= ts && ts <= self.upto
    }
}

/// Parse a single request bound
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, LABEL_FORMAT)
        .map_err(|e| BucketsumError::malformed_range(raw, e.to_string()))
}

/// Canonical `YYYY-MM-DDTHH:MM:SS` label of a bucket start
///
/// Labels from the enumerator and labels returned by a datastore are matched
/// by exact string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BucketLabel(String);

impl BucketLabel {
    /// Create a label from a preformatted string
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BucketLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for BucketLabel {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<String> for BucketLabel {
    fn from(label: String) -> Self {
        Self(label)
    }
}

/// A stored, timestamped numeric datum
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// When the value was observed
    pub timestamp: NaiveDateTime,
    /// The value being summed
    pub value: f64,
}

impl Record {
    pub fn new(timestamp: NaiveDateTime, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// One non-empty bucket as returned by a datastore
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedRow {
    /// Bucket the records were grouped into
    pub label: BucketLabel,
    /// Sum of the values in the bucket
    pub total: f64,
    /// Number of records summed
    pub records: u64,
}

/// Dense, gap-filled result: `dataset[i]` is the total for `labels[i]`
///
/// # Examples
/// ```
/// use bucketsum_core::types::{BucketLabel, SeriesResult};
///
/// let result = SeriesResult {
///     dataset: vec![0.0, 5.0, 2.5],
///     labels: vec![
///         BucketLabel::new("2022-01-01T00:00:00"),
///         BucketLabel::new("2022-01-02T00:00:00"),
///         BucketLabel::new("2022-01-03T00:00:00"),
///     ],
/// };
/// assert_eq!(
///     result.to_json(),
///     r#"{"dataset":[0,5,2.5],"labels":["2022-01-01T00:00:00","2022-01-02T00:00:00","2022-01-03T00:00:00"]}"#
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesResult {
    /// One total per bucket
    #[serde(serialize_with = "serialize_totals")]
    pub dataset: Vec<f64>,
    /// Bucket labels in ascending order
    pub labels: Vec<BucketLabel>,
}

impl SeriesResult {
    /// Encode as `{"dataset": [...], "labels": [...]}`
    pub fn to_json(&self) -> String {
        let mut object = Map::new();
        object.insert(
            "dataset".to_string(),
            Value::Array(self.dataset.iter().copied().map(total_to_json).collect()),
        );
        object.insert(
            "labels".to_string(),
            Value::Array(
                self.labels
                    .iter()
                    .map(|label| Value::String(label.0.clone()))
                    .collect(),
            ),
        );
        Value::Object(object).to_string()
    }
}

/// Per-bucket detail that keeps "no data" apart from "summed to zero"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketPoint {
    pub label: BucketLabel,
    pub total: f64,
    /// Whether the datastore returned a row for this bucket
    pub present: bool,
}

/// Integral totals are emitted as JSON integers, everything else as floats
fn total_to_json(total: f64) -> Value {
    if total.fract() == 0.0 && total.abs() <= MAX_EXACT_INTEGER {
        Value::from(total as i64)
    } else {
        Number::from_f64(total).map_or(Value::Null, Value::Number)
    }
}

fn serialize_totals<S>(totals: &[f64], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(totals.iter().copied().map(total_to_json))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(raw: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(raw, LABEL_FORMAT).unwrap()
    }

    #[test]
    fn test_truncate_each_granularity() {
        let t = ts("2024-02-29T17:42:09");
        assert_eq!(Granularity::Hour.truncate(t), ts("2024-02-29T17:00:00"));
        assert_eq!(Granularity::Day.truncate(t), ts("2024-02-29T00:00:00"));
        assert_eq!(Granularity::Month.truncate(t), ts("2024-02-01T00:00:00"));
    }

    #[test]
    fn test_month_advance_snaps_to_first() {
        assert_eq!(
            Granularity::Month.advance(ts("2022-01-31T00:00:00")),
            Some(ts("2022-03-01T00:00:00"))
        );
        assert_eq!(
            Granularity::Month.advance(ts("2022-01-01T00:00:00")),
            Some(ts("2022-02-01T00:00:00"))
        );
        assert_eq!(
            Granularity::Month.advance(ts("2022-12-01T00:00:00")),
            Some(ts("2023-01-01T00:00:00"))
        );
    }

    #[test]
    fn test_advance_stops_at_calendar_end() {
        let last = NaiveDate::MAX.and_time(NaiveTime::MIN);
        assert_eq!(Granularity::Day.advance(last), None);
    }

    #[test]
    fn test_label_rules() {
        let t = ts("2022-03-05T10:30:15");
        assert_eq!(Granularity::Hour.label(t).as_str(), "2022-03-05T10:30:15");
        assert_eq!(Granularity::Day.label(t).as_str(), "2022-03-05T00:00:00");
        assert_eq!(Granularity::Month.label(t).as_str(), "2022-03-05T00:00:00");
        assert_eq!(Granularity::Hour.bucket_label(t).as_str(), "2022-03-05T10:00:00");
    }

    #[test]
    fn test_strict_parse() {
        assert_eq!("hour".parse::<Granularity>().unwrap(), Granularity::Hour);
        assert_eq!("month".parse::<Granularity>().unwrap(), Granularity::Month);
        assert!("week".parse::<Granularity>().unwrap_err().is_malformed_range());
        assert!("Day".parse::<Granularity>().is_err());
    }

    #[test]
    fn test_policy_resolution() {
        let fallback = GranularityPolicy::default();
        assert_eq!(fallback.resolve("day").unwrap(), Granularity::Day);
        assert_eq!(fallback.resolve("week").unwrap(), Granularity::Month);
        assert_eq!(fallback.resolve("").unwrap(), Granularity::Month);

        let strict = GranularityPolicy::Strict;
        assert!(strict.resolve("week").is_err());
        assert_eq!(strict.resolve("hour").unwrap(), Granularity::Hour);
    }

    #[test]
    fn test_time_range_validation() {
        assert!(TimeRange::parse("2022-01-01T00:00:00", "2022-01-01T00:00:00").is_ok());
        let inverted = TimeRange::parse("2022-02-01T00:00:00", "2022-01-01T00:00:00");
        assert!(inverted.unwrap_err().is_malformed_range());
        assert!(TimeRange::parse("2022-01-01", "2022-01-02T00:00:00").is_err());
        assert!(TimeRange::parse("2022-01-01T00:00:00Z", "2022-01-02T00:00:00").is_err());
    }

    #[test]
    fn test_time_range_contains_both_ends() {
        let range = TimeRange::parse("2022-01-01T00:00:00", "2022-01-31T23:59:59").unwrap();
        assert!(range.contains(ts("2022-01-01T00:00:00")));
        assert!(range.contains(ts("2022-01-31T23:59:59")));
        assert!(!range.contains(ts("2022-02-01T00:00:00")));
        assert!(!range.contains(ts("2021-12-31T23:59:59")));
    }

    #[test]
    fn test_serialized_totals_prefer_integers() {
        let result = SeriesResult {
            dataset: vec![0.0, 12.0, -3.0, 0.25],
            labels: vec![BucketLabel::new("a"); 4],
        };
        let via_serde = serde_json::to_value(&result).unwrap();
        assert_eq!(via_serde["dataset"], serde_json::json!([0, 12, -3, 0.25]));
        assert_eq!(
            serde_json::from_str::<Value>(&result.to_json()).unwrap(),
            via_serde
        );
    }
}
