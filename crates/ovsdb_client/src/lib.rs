//! OVSDB client plumbing.
//!
//! `types` defines the RFC 7047 wire model, `session` the capability traits
//! the benchmark core is written against, and `jsonrpc` the TCP/unix-socket
//! implementation of those traits.

mod codec;
mod error;
pub mod jsonrpc;
mod session;
pub mod types;

pub use codec::{JsonCodec, DEFAULT_MAX_FRAME_BYTES};
pub use error::ClientError;
pub use jsonrpc::{Endpoint, JsonRpcConnector, JsonRpcSession};
pub use session::{Connector, Session};
pub use types::{
    decode_results, Condition, Function, Mutation, Mutator, Operation, OperationResult, Row,
    RowUuid, Value,
};
