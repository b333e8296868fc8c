//! Transport-level errors surfaced by sessions and connectors.

use std::time::Duration;

use thiserror::Error;

/// Failure while talking to an OVSDB server.
///
/// Variants describe where the exchange broke down; none of them say anything
/// about per-operation outcomes, which travel inside the result list.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid ovsdb address {0:?} (expected tcp:HOST:PORT, unix:PATH or HOST:PORT)")]
    InvalidAddress(String),
    #[error("connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("ovsdb io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ovsdb json error: {0}")]
    Json(#[from] serde_json::Error),
    /// Non-null JSON-RPC `error` member.
    #[error("ovsdb rpc error: {error} {details}")]
    Rpc { error: String, details: String },
    #[error("ovsdb connection closed")]
    Closed,
    #[error("ovsdb {method} timed out after {after:?}")]
    Timeout { method: String, after: Duration },
    #[error("unexpected ovsdb response: {0}")]
    UnexpectedResponse(String),
    #[error("ovsdb message exceeds size limit ({size} > {limit})")]
    FrameTooLarge { size: usize, limit: usize },
}
