//! Connection handling and the grouped-sum query
//!
//! The records table needs a `timestamp without time zone` column and a
//! numeric value column. Column and table names are configurable and are
//! validated as plain SQL identifiers before being spliced into the query.

use async_trait::async_trait;
use bucketsum_core::error::{BucketsumError, QueryTimeout, Result};
use bucketsum_core::store::{BucketQuery, RecordStore, StoreSession};
use bucketsum_core::types::{AggregatedRow, BucketLabel};
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{Connection, FromRow};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(8);

/// Where the records live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    table: String,
    timestamp_column: String,
    value_column: String,
}

impl Default for TableSchema {
    fn default() -> Self {
        Self {
            table: "records".to_string(),
            timestamp_column: "dt".to_string(),
            value_column: "value".to_string(),
        }
    }
}

impl TableSchema {
    /// Build a schema mapping, rejecting anything that is not a plain identifier
    pub fn new(
        table: impl Into<String>,
        timestamp_column: impl Into<String>,
        value_column: impl Into<String>,
    ) -> Result<Self> {
        let schema = Self {
            table: table.into(),
            timestamp_column: timestamp_column.into(),
            value_column: value_column.into(),
        };
        validate_identifier(&schema.table, true)?;
        validate_identifier(&schema.timestamp_column, false)?;
        validate_identifier(&schema.value_column, false)?;
        Ok(schema)
    }

    /// Grouped-sum statement; binds `$1` unit, `$2` lower bound, `$3` upper bound
    pub fn sum_by_bucket_sql(&self) -> String {
        let ts = &self.timestamp_column;
        format!(
            r#"SELECT to_char(date_trunc($1, {ts}), 'YYYY-MM-DD"T"HH24:MI:SS') AS label,
       sum({value})::float8 AS total,
       count(*) AS records
FROM {table}
WHERE {ts} >= $2 AND {ts} <= $3
GROUP BY 1"#,
            value = self.value_column,
            table = self.table,
        )
    }
}

/// Accept `name` or, when `qualified`, `schema.name`; letters, digits and underscores only
fn validate_identifier(name: &str, qualified: bool) -> Result<()> {
    let parts: Vec<&str> = name.split('.').collect();
    let shape_ok = parts.len() == 1 || (qualified && parts.len() == 2);
    let parts_ok = parts.iter().all(|part| {
        let mut chars = part.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    });

    if shape_ok && parts_ok {
        Ok(())
    } else {
        Err(BucketsumError::Config(format!(
            "'{name}' is not a valid SQL identifier"
        )))
    }
}

/// Datastore backed by a PostgreSQL table
#[derive(Debug, Clone)]
pub struct PgStore {
    options: PgConnectOptions,
    schema: TableSchema,
    connect_timeout: Duration,
}

impl PgStore {
    /// Create a store from a `postgres://` connection string
    ///
    /// Nothing is connected until a session is opened.
    pub fn new(database_url: &str, schema: TableSchema) -> Result<Self> {
        let options = PgConnectOptions::from_str(database_url).map_err(|e| {
            BucketsumError::Config(format!("invalid database URL: {e}"))
        })?;
        Ok(Self {
            options,
            schema,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        })
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }
}

#[async_trait]
impl RecordStore for PgStore {
    type Session = PgSession;

    async fn open(&self) -> Result<PgSession> {
        let conn = tokio::time::timeout(self.connect_timeout, PgConnection::connect_with(&self.options))
            .await
            .map_err(|_| BucketsumError::data_source("connect", QueryTimeout(self.connect_timeout)))?
            .map_err(|e| BucketsumError::data_source("connect", e))?;

        info!("Datastore connection established");
        Ok(PgSession {
            conn,
            sql: self.schema.sum_by_bucket_sql(),
        })
    }
}

/// One open connection
#[derive(Debug)]
pub struct PgSession {
    conn: PgConnection,
    sql: String,
}

#[derive(FromRow)]
struct BucketRow {
    label: String,
    total: f64,
    records: i64,
}

#[async_trait]
impl StoreSession for PgSession {
    async fn sum_by_bucket(&mut self, query: &BucketQuery) -> Result<Vec<AggregatedRow>> {
        if let Some(timeout) = query.timeout {
            sqlx::query("SELECT set_config('statement_timeout', $1, false)")
                .bind(format!("{}ms", timeout.as_millis()))
                .execute(&mut self.conn)
                .await
                .map_err(|e| BucketsumError::data_source("query", e))?;
        }

        let rows: Vec<BucketRow> = sqlx::query_as(&self.sql)
            .bind(query.granularity.trunc_unit())
            .bind(query.range.from())
            .bind(query.range.upto())
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| BucketsumError::data_source("query", e))?;

        debug!("Grouped-sum query returned {} rows", rows.len());
        Ok(rows
            .into_iter()
            .map(|row| AggregatedRow {
                label: BucketLabel::new(row.label),
                total: row.total,
                records: u64::try_from(row.records).unwrap_or_default(),
            })
            .collect())
    }

    async fn close(self) -> Result<()> {
        self.conn
            .close()
            .await
            .map_err(|e| BucketsumError::data_source("close", e))
    }
}
