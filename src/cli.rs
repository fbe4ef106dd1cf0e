//! CLI interface for bucketsum
//!
//! This module defines the command-line interface using clap. Datastore and
//! query settings are global flags, each with an environment variable
//! fallback, so a `.env` file can carry the connection details.
//!
//! # Example
//!
//! ```bash
//! # Monthly sums from a directory of JSONL files
//! bucketsum --data-path ./records query --from 2022-09-01T00:00:00 --upto 2022-12-31T23:59:00
//!
//! # Daily sums from PostgreSQL as JSON
//! BUCKETSUM_DB_URI=postgres://localhost/metrics bucketsum query \
//!     --from 2022-09-01T00:00:00 --upto 2022-09-30T00:00:00 --group day --json
//!
//! # Answer JSON requests line by line on stdin
//! bucketsum --data-path ./records serve
//! ```

use crate::aggregation::Aggregator;
use crate::backend::BackendConfig;
use bucketsum_core::buckets::BucketAlignment;
use bucketsum_core::types::GranularityPolicy;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Dense hour/day/month bucketed sums over timestamped records
#[derive(Parser, Debug, Clone)]
#[command(name = "bucketsum")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Only show warnings and errors
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub query: QueryArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Datastore settings, with the request timeout also bounding the connect
    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig {
            timeout: self.query.timeout(),
            ..self.store.backend_config()
        }
    }
}

// ---------------------------------------------------------------------------
// Shared argument structs
// ---------------------------------------------------------------------------

/// Where the records come from
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// JSONL file or directory of *.jsonl files
    #[arg(long, env = "BUCKETSUM_DATA_PATH", global = true)]
    pub data_path: Option<PathBuf>,

    /// PostgreSQL connection string (takes precedence over --data-path)
    #[arg(long, env = "BUCKETSUM_DB_URI", hide_env_values = true, global = true)]
    pub db_uri: Option<String>,

    /// Table holding the records, optionally schema-qualified
    #[arg(long, default_value = "records", global = true)]
    pub table: String,

    /// Timestamp column of the records table
    #[arg(long, default_value = "dt", global = true)]
    pub timestamp_column: String,

    /// Value column of the records table
    #[arg(long, default_value = "value", global = true)]
    pub value_column: String,
}

impl StoreArgs {
    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig {
            db_uri: self.db_uri.clone(),
            data_path: self.data_path.clone(),
            table: self.table.clone(),
            timestamp_column: self.timestamp_column.clone(),
            value_column: self.value_column.clone(),
            timeout: None,
        }
    }
}

/// How requests are evaluated
#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// Per-request datastore timeout in seconds
    #[arg(long, value_name = "SECS", global = true)]
    pub timeout: Option<u64>,

    /// Reject group types other than hour, day and month instead of using month
    #[arg(long, global = true)]
    pub strict_granularity: bool,

    /// Start buckets at the lower bound itself rather than at its bucket boundary
    #[arg(long, global = true)]
    pub verbatim_start: bool,
}

impl QueryArgs {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }

    /// Build the aggregator these flags describe
    pub fn aggregator(&self) -> Aggregator {
        let policy = if self.strict_granularity {
            GranularityPolicy::Strict
        } else {
            GranularityPolicy::FallbackToMonth
        };
        let alignment = if self.verbatim_start {
            BucketAlignment::Verbatim
        } else {
            BucketAlignment::Truncate
        };

        Aggregator::new()
            .with_policy(policy)
            .with_alignment(alignment)
            .with_timeout(self.timeout())
    }
}

/// The range and granularity of one request
#[derive(Args, Debug, Clone)]
pub struct RangeArgs {
    /// Inclusive lower bound, YYYY-MM-DDTHH:MM:SS
    #[arg(long)]
    pub from: String,

    /// Inclusive upper bound, YYYY-MM-DDTHH:MM:SS
    #[arg(long)]
    pub upto: String,

    /// Bucket size: hour, day or month
    #[arg(long, short = 'g', default_value = "month")]
    pub group: String,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Sum records per bucket over a range
    Query {
        #[command(flatten)]
        range: RangeArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the bucket labels a range produces, without reading any data
    Labels {
        #[command(flatten)]
        range: RangeArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Answer JSON requests read line by line from stdin
    Serve,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_query_parsing() {
        let cli = Cli::parse_from([
            "bucketsum",
            "--data-path",
            "/tmp/records",
            "query",
            "--from",
            "2022-01-01T00:00:00",
            "--upto",
            "2022-03-01T00:00:00",
            "--group",
            "day",
            "--json",
        ]);
        match &cli.command {
            Command::Query { range, json } => {
                assert_eq!(range.from, "2022-01-01T00:00:00");
                assert_eq!(range.group, "day");
                assert!(json);
            }
            _ => panic!("Expected Query command"),
        }
        assert_eq!(cli.store.data_path, Some(PathBuf::from("/tmp/records")));
    }

    #[test]
    fn test_group_defaults_to_month() {
        let cli = Cli::parse_from([
            "bucketsum",
            "labels",
            "--from",
            "2022-01-01T00:00:00",
            "--upto",
            "2022-03-01T00:00:00",
        ]);
        match &cli.command {
            Command::Labels { range, json } => {
                assert_eq!(range.group, "month");
                assert!(!json);
            }
            _ => panic!("Expected Labels command"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "bucketsum",
            "serve",
            "--timeout",
            "5",
            "--strict-granularity",
            "--table",
            "metrics.samples",
            "-q",
        ]);
        assert!(matches!(cli.command, Command::Serve));
        assert_eq!(cli.query.timeout, Some(5));
        assert!(cli.query.strict_granularity);
        assert_eq!(cli.store.table, "metrics.samples");
        assert!(cli.quiet);
    }

    #[test]
    fn test_timeout_reaches_backend_config() {
        let cli = Cli::parse_from(["bucketsum", "serve", "--timeout", "7"]);
        assert_eq!(cli.backend_config().timeout, Some(Duration::from_secs(7)));
        assert_eq!(cli.store.backend_config().timeout, None);

        let cli = Cli::parse_from(["bucketsum", "serve"]);
        assert_eq!(cli.backend_config().timeout, None);
    }

    #[test]
    fn test_aggregator_from_flags() {
        let cli = Cli::parse_from(["bucketsum", "serve", "--strict-granularity"]);
        let err = cli
            .query
            .aggregator()
            .labels("2022-01-01T00:00:00", "2022-01-02T00:00:00", "week")
            .unwrap_err();
        assert!(err.is_malformed_range());

        let cli = Cli::parse_from(["bucketsum", "serve"]);
        let labels = cli
            .query
            .aggregator()
            .labels("2022-01-01T00:00:00", "2022-01-02T00:00:00", "week")
            .unwrap();
        assert_eq!(labels.len(), 1);
    }

    #[test]
    fn test_missing_range_is_rejected() {
        assert!(Cli::try_parse_from(["bucketsum", "query", "--from", "2022-01-01T00:00:00"]).is_err());
    }
}
