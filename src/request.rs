//! Text request handling
//!
//! Each inbound message is either the `/start` greeting command or a JSON
//! object of the form
//!
//! ```json
//! {"dt_from": "2022-09-01T00:00:00", "dt_upto": "2022-12-31T23:59:00", "group_type": "month"}
//! ```
//!
//! A well-formed request is answered with the aggregated series as compact
//! JSON. Anything else, including requests that fail while aggregating, is
//! answered with [`FALLBACK_REPLY`]; the failure is only logged.

use crate::aggregation::Aggregator;
use crate::error::{BucketsumError, Result};
use bucketsum_core::store::RecordStore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

/// Command that triggers the greeting
pub const START_COMMAND: &str = "/start";

/// Reply to [`START_COMMAND`]
pub const GREETING: &str = "Hi! Send a JSON object with dt_from, dt_upto and group_type to get bucketed sums.";

/// Reply to anything that does not produce a series
pub const FALLBACK_REPLY: &str = r#"Invalid request. Example: {"dt_from": "2022-09-01T00:00:00", "dt_upto": "2022-12-31T23:59:00", "group_type": "month"}"#;

/// Aggregation request as sent by a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateRequest {
    pub dt_from: String,
    pub dt_upto: String,
    pub group_type: String,
}

impl AggregateRequest {
    pub fn parse(text: &str) -> std::result::Result<Self, RequestError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Why a message did not produce a series
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Request is not a valid aggregation request: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Aggregate(#[from] BucketsumError),
}

/// Turns text messages into replies against one datastore
pub struct RequestHandler<S> {
    store: S,
    aggregator: Aggregator,
}

impl<S: RecordStore> RequestHandler<S> {
    pub fn new(store: S, aggregator: Aggregator) -> Self {
        Self { store, aggregator }
    }

    /// Reply to one message; never fails
    pub async fn handle(&self, text: &str) -> String {
        let text = text.trim();
        if text == START_COMMAND {
            return GREETING.to_string();
        }

        match self.try_handle(text).await {
            Ok(reply) => reply,
            Err(e) => {
                info!("Rejected request {:?}: {}", text, e);
                FALLBACK_REPLY.to_string()
            }
        }
    }

    /// Parse and aggregate one request, surfacing the failure
    pub async fn try_handle(&self, text: &str) -> std::result::Result<String, RequestError> {
        let request = AggregateRequest::parse(text)?;
        debug!("Handling request: {:?}", request);
        Ok(self
            .aggregator
            .aggregate(&self.store, &request.dt_from, &request.dt_upto, &request.group_type)
            .await?)
    }

    /// Answer newline-delimited messages until the reader is exhausted
    ///
    /// Blank lines are skipped. Every other line gets exactly one reply line,
    /// including lines that are not valid UTF-8.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.split(b'\n');
        let mut handled = 0usize;

        while let Some(bytes) = lines.next_segment().await? {
            let reply = match std::str::from_utf8(&bytes) {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => self.handle(line).await,
                Err(e) => {
                    info!("Rejected undecodable request: {}", e);
                    FALLBACK_REPLY.to_string()
                }
            };
            writer.write_all(reply.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
            handled += 1;
        }

        info!("Input closed after {} requests", handled);
        Ok(())
    }
}
