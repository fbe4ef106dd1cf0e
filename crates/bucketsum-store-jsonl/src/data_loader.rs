//! Data loader for JSONL record files
//!
//! Each non-empty line holds one record:
//!
//! ```json
//! {"dt": "2022-09-01T00:00:00", "value": 7591}
//! ```
//!
//! The timestamp key may be `dt` or `timestamp`, and the value may also be a
//! MongoDB extended-JSON date (`{"$date": "2022-09-01T00:00:00Z"}`) as written
//! by `mongoexport`. Timestamps are read as naive local time; RFC 3339 values
//! with an offset are converted to UTC and the offset dropped.
//!
//! Lines that cannot be parsed are skipped with a warning. A path that does
//! not exist, or a file that cannot be read, fails the query.
//!
//! # Examples
//!
//! ```no_run
//! use bucketsum_core::store::{BucketQuery, RecordStore, StoreSession};
//! use bucketsum_core::types::{Granularity, TimeRange};
//! use bucketsum_store_jsonl::JsonlStore;
//!
//! # async fn example() -> bucketsum_core::Result<()> {
//! let store = JsonlStore::new("/var/lib/bucketsum/records");
//! let range = TimeRange::parse("2022-09-01T00:00:00", "2022-12-31T23:59:00")?;
//!
//! let mut session = store.open().await?;
//! let rows = session
//!     .sum_by_bucket(&BucketQuery::new(range, Granularity::Month))
//!     .await;
//! session.close().await?;
//! println!("{} non-empty buckets", rows?.len());
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use bucketsum_core::error::{BucketsumError, Result};
use bucketsum_core::memory::sum_records;
use bucketsum_core::store::{BucketQuery, RecordStore, StoreSession};
use bucketsum_core::types::{AggregatedRow, Record};
use chrono::{DateTime, NaiveDateTime};
use futures::StreamExt;
use futures::stream::Stream;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

/// Naive timestamp layouts accepted in record files, tried in order
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Datastore over JSONL files
#[derive(Debug, Clone)]
pub struct JsonlStore {
    /// A `.jsonl` file, or a directory searched recursively for them
    path: PathBuf,
}

impl JsonlStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Configured file or directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve the configured path into the list of files to read
    async fn discover_files(&self) -> Result<Vec<PathBuf>> {
        let metadata = tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| BucketsumError::data_source("open", e))?;

        if metadata.is_file() {
            return Ok(vec![self.path.clone()]);
        }

        let root = self.path.clone();
        let mut files = tokio::task::spawn_blocking(move || {
            walkdir::WalkDir::new(root)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|entry| {
                    entry.file_type().is_file()
                        && entry.path().extension().and_then(|s| s.to_str()) == Some("jsonl")
                })
                .map(|entry| entry.into_path())
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| BucketsumError::data_source("open", e))?;

        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl RecordStore for JsonlStore {
    type Session = JsonlSession;

    async fn open(&self) -> Result<JsonlSession> {
        let files = self.discover_files().await?;
        debug!(
            "Opened JSONL store at {} ({} files)",
            self.path.display(),
            files.len()
        );
        Ok(JsonlSession { files })
    }
}

/// Session over the files discovered when the store was opened
#[derive(Debug)]
pub struct JsonlSession {
    files: Vec<PathBuf>,
}

impl JsonlSession {
    /// Files this session reads
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Stream every parseable record from the session's files
    pub fn load_records(&self) -> Pin<Box<dyn Stream<Item = Result<Record>> + Send + '_>> {
        Box::pin(async_stream::try_stream! {
            for path in &self.files {
                let file = tokio::fs::File::open(path)
                    .await
                    .map_err(|e| BucketsumError::data_source("read", e))?;
                let mut lines = BufReader::new(file).split(b'\n');
                let mut line_number = 0usize;
                let mut skipped = 0usize;

                while let Some(bytes) = lines
                    .next_segment()
                    .await
                    .map_err(|e| BucketsumError::data_source("read", e))?
                {
                    line_number += 1;
                    let line = match std::str::from_utf8(&bytes) {
                        Ok(line) => line,
                        Err(e) => {
                            skipped += 1;
                            warn!(
                                "Skipping record at {}:{}: {}",
                                path.display(),
                                line_number,
                                e
                            );
                            continue;
                        }
                    };
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    match parse_line(trimmed) {
                        Ok(record) => yield record,
                        Err(reason) => {
                            skipped += 1;
                            warn!(
                                "Skipping record at {}:{}: {}",
                                path.display(),
                                line_number,
                                reason
                            );
                        }
                    }
                }

                if skipped > 0 {
                    debug!("Skipped {} malformed lines in {}", skipped, path.display());
                }
            }
        })
    }
}

#[async_trait]
impl StoreSession for JsonlSession {
    async fn sum_by_bucket(&mut self, query: &BucketQuery) -> Result<Vec<AggregatedRow>> {
        let mut in_range = Vec::new();
        let mut records = self.load_records();
        while let Some(record) = records.next().await {
            let record = record?;
            if query.range.contains(record.timestamp) {
                in_range.push(record);
            }
        }

        debug!("{} records fall inside the requested range", in_range.len());
        Ok(sum_records(&in_range, query))
    }

    async fn close(self) -> Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Line schema
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RawRecord {
    #[serde(alias = "dt")]
    timestamp: RawTimestamp,
    value: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Plain(String),
    Extended {
        #[serde(rename = "$date")]
        date: String,
    },
}

impl RawTimestamp {
    fn as_str(&self) -> &str {
        match self {
            RawTimestamp::Plain(s) => s,
            RawTimestamp::Extended { date } => date,
        }
    }
}

fn parse_line(line: &str) -> std::result::Result<Record, String> {
    let raw: RawRecord = serde_json::from_str(line).map_err(|e| e.to_string())?;
    let timestamp = parse_record_timestamp(raw.timestamp.as_str())
        .ok_or_else(|| format!("unrecognised timestamp '{}'", raw.timestamp.as_str()))?;
    Ok(Record::new(timestamp, raw.value))
}

/// Parse a stored timestamp into naive time
pub fn parse_record_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.naive_utc())
        })
}
