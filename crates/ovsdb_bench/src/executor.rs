//! Sends built transactions to a session.

use std::time::Instant;

use ovsdb_client::{ClientError, OperationResult, Session};

use crate::builder::TransactionRequest;
use crate::harness::saturating_micros;

/// Runs each [`TransactionRequest`] as one atomic `transact` against a fixed
/// database. Transport errors are returned untouched; retries and deadlines
/// belong to the session.
#[derive(Clone, Debug)]
pub struct TransactionExecutor {
    database: String,
}

impl TransactionExecutor {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub async fn execute<S: Session + ?Sized>(
        &self,
        session: &S,
        request: &TransactionRequest,
    ) -> Result<Vec<OperationResult>, ClientError> {
        let started = Instant::now();
        let reply = session
            .transact(&self.database, request.operations())
            .await;
        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!(
                database = %self.database,
                operations = request.len(),
                results = reply.as_ref().map_or(0, Vec::len),
                ok = reply.is_ok(),
                elapsed_us = saturating_micros(started.elapsed()),
                "transact"
            );
        }
        reply
    }
}
