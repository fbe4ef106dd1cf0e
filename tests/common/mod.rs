//! Common test utilities and helpers for bucketsum tests
//!
//! This module provides record builders, an instrumented datastore that
//! counts sessions and can be told to fail, and JSONL fixture helpers.

#![allow(dead_code)]

use async_trait::async_trait;
use bucketsum::error::{BucketsumError, Result};
use bucketsum_core::memory::{MemorySession, MemoryStore};
use bucketsum_core::store::{BucketQuery, RecordStore, StoreSession};
use bucketsum_core::types::{AggregatedRow, Record};
use chrono::NaiveDateTime;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

/// Parse `YYYY-MM-DDTHH:MM:SS`
pub fn ts(raw: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").unwrap()
}

/// Builder for creating test records
pub struct RecordBuilder {
    timestamp: NaiveDateTime,
    value: f64,
}

impl RecordBuilder {
    pub fn new() -> Self {
        Self {
            timestamp: ts("2022-01-01T00:00:00"),
            value: 1.0,
        }
    }

    pub fn at(mut self, raw: &str) -> Self {
        self.timestamp = ts(raw);
        self
    }

    pub fn value(mut self, value: f64) -> Self {
        self.value = value;
        self
    }

    pub fn build(self) -> Record {
        Record::new(self.timestamp, self.value)
    }
}

impl Default for RecordBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// In-memory store from `(timestamp, value)` pairs
pub fn store_of(records: &[(&str, f64)]) -> MemoryStore {
    MemoryStore::new(
        records
            .iter()
            .map(|(at, value)| RecordBuilder::new().at(at).value(*value).build())
            .collect::<Vec<_>>(),
    )
}

/// How a [`CountingStore`] misbehaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    None,
    Open,
    Query,
    Close,
    Stall(Duration),
}

/// Memory store that counts sessions and injects failures
#[derive(Clone)]
pub struct CountingStore {
    inner: MemoryStore,
    fault: Fault,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl CountingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            fault: Fault::None,
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(inner: MemoryStore, fault: Fault) -> Self {
        Self {
            fault,
            ..Self::new(inner)
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

pub struct CountingSession {
    inner: MemorySession,
    fault: Fault,
    closed: Arc<AtomicUsize>,
}

fn refused() -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused")
}

#[async_trait]
impl RecordStore for CountingStore {
    type Session = CountingSession;

    async fn open(&self) -> Result<CountingSession> {
        if self.fault == Fault::Open {
            return Err(BucketsumError::data_source("open", refused()));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(CountingSession {
            inner: self.inner.open().await?,
            fault: self.fault,
            closed: Arc::clone(&self.closed),
        })
    }
}

#[async_trait]
impl StoreSession for CountingSession {
    async fn sum_by_bucket(&mut self, query: &BucketQuery) -> Result<Vec<AggregatedRow>> {
        match self.fault {
            Fault::Query => Err(BucketsumError::data_source("query", refused())),
            Fault::Stall(delay) => {
                tokio::time::sleep(delay).await;
                self.inner.sum_by_bucket(query).await
            }
            _ => self.inner.sum_by_bucket(query).await,
        }
    }

    async fn close(self) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        if self.fault == Fault::Close {
            return Err(BucketsumError::data_source("close", refused()));
        }
        self.inner.close().await
    }
}

/// Temporary directory holding JSONL files
pub struct JsonlFixture {
    pub dir: TempDir,
}

impl JsonlFixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    /// Write `lines` to `name`, creating parent directories
    pub fn write(&self, name: &str, lines: &[&str]) -> PathBuf {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, lines.join("\n")).unwrap();
        path
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }
}
