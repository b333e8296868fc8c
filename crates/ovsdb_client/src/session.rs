//! Capability traits for reaching an OVSDB server.
//!
//! Higher layers only depend on these two traits, so the benchmark core can
//! run against the JSON-RPC transport or an in-process fake.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ClientError;
use crate::types::{Operation, OperationResult};

/// An established connection able to run transactions.
#[async_trait]
pub trait Session: Send + Sync {
    /// Run `operations` as one `transact` against `database`.
    ///
    /// On success the result list is returned as received; interpreting
    /// per-operation errors is the caller's job.
    async fn transact(
        &self,
        database: &str,
        operations: &[Operation],
    ) -> Result<Vec<OperationResult>, ClientError>;
}

#[async_trait]
impl<S: Session + ?Sized> Session for Arc<S> {
    async fn transact(
        &self,
        database: &str,
        operations: &[Operation],
    ) -> Result<Vec<OperationResult>, ClientError> {
        (**self).transact(database, operations).await
    }
}

/// Opens sessions. No retry is attempted by implementations.
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: Session + 'static;

    async fn connect(&self, address: &str) -> Result<Self::Session, ClientError>;
}
