//! Datastore selection
//!
//! The binary picks exactly one backend at startup from its configuration and
//! then treats it like any other [`RecordStore`].

use async_trait::async_trait;
use bucketsum_core::error::{BucketsumError, Result};
use bucketsum_core::store::{BucketQuery, RecordStore, StoreSession};
use bucketsum_core::types::AggregatedRow;
use bucketsum_store_jsonl::{JsonlSession, JsonlStore};
use bucketsum_store_postgres::{PgSession, PgStore, TableSchema};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Everything needed to pick a backend
#[derive(Debug, Clone, Default)]
pub struct BackendConfig {
    pub db_uri: Option<String>,
    pub data_path: Option<PathBuf>,
    pub table: String,
    pub timestamp_column: String,
    pub value_column: String,
    /// Bounds connecting as well as querying
    pub timeout: Option<Duration>,
}

/// Configured datastore
#[derive(Debug, Clone)]
pub enum Backend {
    Jsonl(JsonlStore),
    Postgres(PgStore),
}

impl Backend {
    /// A database URI wins over a data path; having neither is an error
    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        if let Some(uri) = &config.db_uri {
            let schema = TableSchema::new(
                config.table.as_str(),
                config.timestamp_column.as_str(),
                config.value_column.as_str(),
            )?;
            let mut store = PgStore::new(uri, schema)?;
            if let Some(timeout) = config.timeout {
                store = store.with_connect_timeout(timeout);
            }
            info!("Using PostgreSQL datastore");
            return Ok(Backend::Postgres(store));
        }

        if let Some(path) = &config.data_path {
            info!("Using JSONL datastore at {}", path.display());
            return Ok(Backend::Jsonl(JsonlStore::new(path.clone())));
        }

        Err(BucketsumError::Config(
            "no datastore configured: set --db-uri (BUCKETSUM_DB_URI) or --data-path (BUCKETSUM_DATA_PATH)"
                .to_string(),
        ))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Backend::Jsonl(_) => "jsonl",
            Backend::Postgres(_) => "postgres",
        }
    }
}

/// Session of whichever backend is configured
#[derive(Debug)]
pub enum BackendSession {
    Jsonl(JsonlSession),
    Postgres(PgSession),
}

#[async_trait]
impl RecordStore for Backend {
    type Session = BackendSession;

    async fn open(&self) -> Result<BackendSession> {
        Ok(match self {
            Backend::Jsonl(store) => BackendSession::Jsonl(store.open().await?),
            Backend::Postgres(store) => BackendSession::Postgres(store.open().await?),
        })
    }
}

#[async_trait]
impl StoreSession for BackendSession {
    async fn sum_by_bucket(&mut self, query: &BucketQuery) -> Result<Vec<AggregatedRow>> {
        match self {
            BackendSession::Jsonl(session) => session.sum_by_bucket(query).await,
            BackendSession::Postgres(session) => session.sum_by_bucket(query).await,
        }
    }

    async fn close(self) -> Result<()> {
        match self {
            BackendSession::Jsonl(session) => session.close().await,
            BackendSession::Postgres(session) => session.close().await,
        }
    }
}
