//! Output formatting module for bucketsum
//!
//! This module provides formatters for displaying aggregated series:
//! - Table format for human-readable terminal output
//! - JSON format, byte-for-byte the same document a request handler replies with
//!
//! # Examples
//!
//! ```
//! use bucketsum::output::get_formatter;
//! use bucketsum_core::types::{BucketLabel, BucketPoint};
//!
//! let points = vec![
//!     BucketPoint { label: BucketLabel::new("2022-01-01T00:00:00"), total: 5.0, present: true },
//!     BucketPoint { label: BucketLabel::new("2022-02-01T00:00:00"), total: 0.0, present: false },
//! ];
//!
//! let json = get_formatter(true).format_points(&points);
//! assert_eq!(json, r#"{"dataset":[5,0],"labels":["2022-01-01T00:00:00","2022-02-01T00:00:00"]}"#);
//!
//! let table = get_formatter(false).format_points(&points);
//! assert!(table.contains("TOTAL"));
//! ```

use bucketsum_core::types::{BucketLabel, BucketPoint, SeriesResult};
use prettytable::{Table, format, row};

/// Trait for output formatters
pub trait OutputFormatter {
    /// Format a gap-filled series
    fn format_points(&self, points: &[BucketPoint]) -> String;

    /// Format the bare label sequence of a request
    fn format_labels(&self, labels: &[BucketLabel]) -> String;
}

/// Table formatter for human-readable output
///
/// Buckets without any records show `-` instead of a zero so they can be
/// told apart from buckets whose records sum to zero.
pub struct TableFormatter;

impl TableFormatter {
    /// Format a number with thousands separators
    fn format_number(n: u64) -> String {
        let s = n.to_string();
        let mut result = String::new();

        for (count, ch) in s.chars().rev().enumerate() {
            if count > 0 && count % 3 == 0 {
                result.push(',');
            }
            result.push(ch);
        }

        result.chars().rev().collect()
    }

    /// Whole sums get separators, fractional ones two decimals
    fn format_total(total: f64) -> String {
        if total.fract() == 0.0 && total.abs() < 1e15 {
            let grouped = Self::format_number(total.abs() as u64);
            if total < 0.0 {
                format!("-{grouped}")
            } else {
                grouped
            }
        } else {
            format!("{total:.2}")
        }
    }

    fn new_table() -> Table {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table
    }
}

impl OutputFormatter for TableFormatter {
    fn format_points(&self, points: &[BucketPoint]) -> String {
        let mut table = Self::new_table();
        table.set_titles(row![b -> "Bucket", b -> "Total"]);

        for point in points {
            let total = if point.present {
                Self::format_total(point.total)
            } else {
                "-".to_string()
            };
            table.add_row(row![point.label, r -> total]);
        }

        let sum: f64 = points.iter().map(|p| p.total).sum();
        table.add_row(row![b -> "TOTAL", rb -> Self::format_total(sum)]);

        let filled = points.iter().filter(|p| p.present).count();
        format!(
            "{}\n{} of {} buckets hold data\n",
            table,
            filled,
            points.len()
        )
    }

    fn format_labels(&self, labels: &[BucketLabel]) -> String {
        let mut table = Self::new_table();
        table.set_titles(row![b -> "#", b -> "Bucket"]);
        for (i, label) in labels.iter().enumerate() {
            table.add_row(row![r -> i + 1, label]);
        }
        table.to_string()
    }
}

/// JSON formatter for machine-readable output
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn format_points(&self, points: &[BucketPoint]) -> String {
        SeriesResult {
            dataset: points.iter().map(|p| p.total).collect(),
            labels: points.iter().map(|p| p.label.clone()).collect(),
        }
        .to_json()
    }

    fn format_labels(&self, labels: &[BucketLabel]) -> String {
        serde_json::Value::from(labels.iter().map(|l| l.as_str()).collect::<Vec<_>>()).to_string()
    }
}

/// Get the appropriate formatter
pub fn get_formatter(json: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonFormatter)
    } else {
        Box::new(TableFormatter)
    }
}
