//! Transactional CRUD load generator for OVSDB servers.
//!
//! A [`BenchmarkClient`] dials a server, snapshots the row identities of one
//! table, then issues one single-operation transaction per
//! [`BenchmarkClient::request`] call and validates the reply. The
//! [`harness`] module drives many clients concurrently and reports throughput
//! and latency.

mod builder;
mod cache;
mod client;
pub mod config;
mod error;
mod executor;
pub mod harness;
mod validate;

pub use builder::{OperationBuilder, TransactionRequest};
pub use cache::RowHandleCache;
pub use client::BenchmarkClient;
pub use config::{BenchTarget, ClientConfig, OpKind};
pub use error::{BenchError, FailureLine, TransactFailure};
pub use executor::TransactionExecutor;
pub use harness::{HarnessConfig, HarnessReport, LatencyHistogram};
pub use validate::{check_reply, validate};
