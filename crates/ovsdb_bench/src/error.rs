//! Error taxonomy for the benchmark client.

use std::fmt;

use ovsdb_client::{ClientError, Operation};
use thiserror::Error;

/// Every way a `dial` or `request` call can fail.
///
/// All variants are per-call: a client that returned one of these may be
/// called again.
#[derive(Debug, Error)]
pub enum BenchError {
    /// The transport could not establish a session.
    #[error("dial error: {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: ClientError,
    },
    /// The transaction failed in transport; passed through verbatim.
    #[error(transparent)]
    Transport(#[from] ClientError),
    /// The server answered, but the reply does not line up with the request.
    #[error("{0}")]
    Protocol(TransactFailure),
    #[error("unknown op {0:?} (expected one of insert, select, update, mutate, delete)")]
    UnknownOperation(String),
    #[error("client is not connected; dial must succeed before requests")]
    NotConnected,
    /// A row returned by the initial scan lacks a usable identity.
    #[error("row column {column:?} is not a row identity: {reason}")]
    MalformedRow { column: String, reason: String },
}

/// Aggregated validator failure for one transaction reply.
#[derive(Clone, Debug, PartialEq)]
pub struct TransactFailure {
    lines: Vec<FailureLine>,
}

impl TransactFailure {
    pub fn new(lines: Vec<FailureLine>) -> Self {
        Self { lines }
    }

    /// Recorded defects, in the order they were found.
    pub fn lines(&self) -> &[FailureLine] {
        &self.lines
    }
}

impl fmt::Display for TransactFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{line}")?;
        }
        Ok(())
    }
}

/// One defect found while reconciling results against operations.
#[derive(Clone, Debug, PartialEq)]
pub enum FailureLine {
    InsufficientReplies {
        replies: usize,
        operations: usize,
    },
    /// A result carried an error and lines up with a request.
    OperationFailed {
        index: usize,
        error: String,
        details: String,
        operation: Operation,
    },
    /// A result carried an error beyond the end of the request list.
    UnmatchedError {
        index: usize,
        error: String,
        details: String,
    },
    EmptyReply,
}

impl fmt::Display for FailureLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureLine::InsufficientReplies {
                replies,
                operations,
            } => write!(
                f,
                "insufficient replies: got {replies} results for {operations} operations"
            ),
            FailureLine::OperationFailed {
                index,
                error,
                details,
                operation,
            } => write!(
                f,
                "transaction failed due to an error: {error} details: {details} in operation {index}: {operation}"
            ),
            FailureLine::UnmatchedError {
                index,
                error,
                details,
            } => write!(
                f,
                "transaction failed due to an error: {error} details: {details} (result {index} has no matching operation)"
            ),
            FailureLine::EmptyReply => f.write_str("transaction returned an empty result list"),
        }
    }
}
