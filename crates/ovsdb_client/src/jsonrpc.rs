//! JSON-RPC (RFC 7047 §4) session over TCP or a unix socket.
//!
//! A session keeps one request outstanding at a time. While it waits for the
//! matching response it answers the server's `echo` keepalives and drops
//! unsolicited notifications, so a long-idle benchmark client is not
//! disconnected by the server's inactivity probe.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value as Json};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time;
use tokio_util::codec::Framed;

use crate::codec::{JsonCodec, DEFAULT_MAX_FRAME_BYTES};
use crate::error::ClientError;
use crate::session::{Connector, Session};
use crate::types::{decode_results, Operation, OperationResult};

/// Default per-call deadline.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(10);

/// Parsed server address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Endpoint {
    /// `host:port`, as accepted by `TcpStream::connect`.
    Tcp(String),
    Unix(PathBuf),
}

impl FromStr for Endpoint {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(path) = s.strip_prefix("unix:") {
            if path.is_empty() {
                return Err(ClientError::InvalidAddress(s.to_string()));
            }
            return Ok(Endpoint::Unix(PathBuf::from(path)));
        }
        let host_port = s.strip_prefix("tcp:").unwrap_or(s);
        match host_port.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                // Reject other OVSDB schemes (ssl:, ptcp:) that would otherwise
                // look like a host name.
                if host.contains(':') && !host.starts_with('[') {
                    return Err(ClientError::InvalidAddress(s.to_string()));
                }
                Ok(Endpoint::Tcp(host_port.to_string()))
            }
            _ => Err(ClientError::InvalidAddress(s.to_string())),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(addr) => write!(f, "tcp:{addr}"),
            Endpoint::Unix(path) => write!(f, "unix:{}", path.display()),
        }
    }
}

trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

type Transport = Framed<Box<dyn AsyncStream>, JsonCodec>;

/// Connector producing [`JsonRpcSession`]s.
#[derive(Clone, Debug)]
pub struct JsonRpcConnector {
    /// Deadline applied to connect and to every call.
    pub op_timeout: Duration,
    pub max_frame_bytes: usize,
}

impl Default for JsonRpcConnector {
    fn default() -> Self {
        Self {
            op_timeout: DEFAULT_OP_TIMEOUT,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

impl JsonRpcConnector {
    pub fn with_timeout(op_timeout: Duration) -> Self {
        Self {
            op_timeout,
            ..Self::default()
        }
    }
}

#[async_trait]
impl Connector for JsonRpcConnector {
    type Session = JsonRpcSession;

    async fn connect(&self, address: &str) -> Result<JsonRpcSession, ClientError> {
        JsonRpcSession::connect(address, self.op_timeout, self.max_frame_bytes).await
    }
}

/// One JSON-RPC connection to an OVSDB server.
pub struct JsonRpcSession {
    endpoint: Endpoint,
    op_timeout: Duration,
    inner: Mutex<SessionInner>,
}

struct SessionInner {
    framed: Transport,
    next_id: u64,
}

impl JsonRpcSession {
    pub async fn connect(
        address: &str,
        op_timeout: Duration,
        max_frame_bytes: usize,
    ) -> Result<Self, ClientError> {
        let endpoint: Endpoint = address.parse()?;
        let op_timeout = op_timeout.max(Duration::from_millis(1));
        let stream = time::timeout(op_timeout, open_stream(&endpoint))
            .await
            .map_err(|_| ClientError::Timeout {
                method: "connect".to_string(),
                after: op_timeout,
            })??;
        tracing::debug!(endpoint = %endpoint, "ovsdb session established");
        Ok(Self {
            endpoint,
            op_timeout,
            inner: Mutex::new(SessionInner {
                framed: Framed::new(stream, JsonCodec::new(max_frame_bytes)),
                next_id: 0,
            }),
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn op_timeout(&self) -> Duration {
        self.op_timeout
    }

    /// Names of the databases the server hosts.
    pub async fn list_dbs(&self) -> Result<Vec<String>, ClientError> {
        let result = self.call("list_dbs", json!([])).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Issue one JSON-RPC request and wait for its response.
    async fn call(&self, method: &str, params: Json) -> Result<Json, ClientError> {
        let mut inner = self.inner.lock().await;
        let id = inner.next_id;
        inner.next_id += 1;
        let request = json!({"method": method, "params": params, "id": id});
        match time::timeout(self.op_timeout, inner.exchange(id, request)).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Timeout {
                method: method.to_string(),
                after: self.op_timeout,
            }),
        }
    }
}

impl fmt::Debug for JsonRpcSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonRpcSession")
            .field("endpoint", &self.endpoint)
            .field("op_timeout", &self.op_timeout)
            .finish()
    }
}

#[async_trait]
impl Session for JsonRpcSession {
    async fn transact(
        &self,
        database: &str,
        operations: &[Operation],
    ) -> Result<Vec<OperationResult>, ClientError> {
        let mut params = Vec::with_capacity(operations.len() + 1);
        params.push(Json::String(database.to_string()));
        for op in operations {
            params.push(serde_json::to_value(op)?);
        }
        let result = self.call("transact", Json::Array(params)).await?;
        Ok(decode_results(result)?)
    }
}

impl SessionInner {
    async fn exchange(&mut self, id: u64, request: Json) -> Result<Json, ClientError> {
        self.framed.send(request).await?;
        loop {
            let mut message = match self.framed.next().await {
                Some(message) => message?,
                None => return Err(ClientError::Closed),
            };

            // Server-initiated requests and notifications carry a method.
            if let Some(method) = message.get("method").and_then(Json::as_str) {
                if method == "echo" {
                    let reply = json!({
                        "id": message.get("id").cloned().unwrap_or(Json::Null),
                        "result": message.get("params").cloned().unwrap_or_else(|| json!([])),
                        "error": null,
                    });
                    self.framed.send(reply).await?;
                } else {
                    tracing::debug!(method, "ignoring ovsdb notification");
                }
                continue;
            }

            // A response to a request that timed out earlier on this session.
            if message.get("id").and_then(Json::as_u64) != Some(id) {
                let got = message.get("id").cloned().unwrap_or(Json::Null);
                tracing::debug!(expected = id, got = %got, "discarding stale response");
                continue;
            }

            let error = message.get_mut("error").map(Json::take).unwrap_or(Json::Null);
            if !error.is_null() {
                return Err(rpc_error(error));
            }
            return match message.get_mut("result").map(Json::take) {
                Some(result) => Ok(result),
                None => Err(ClientError::UnexpectedResponse(format!(
                    "response {id} has neither result nor error"
                ))),
            };
        }
    }
}

fn rpc_error(error: Json) -> ClientError {
    match error {
        Json::String(error) => ClientError::Rpc {
            error,
            details: String::new(),
        },
        Json::Object(map) => {
            let text = |key: &str| {
                map.get(key)
                    .and_then(Json::as_str)
                    .unwrap_or_default()
                    .to_string()
            };
            ClientError::Rpc {
                error: text("error"),
                details: text("details"),
            }
        }
        other => ClientError::Rpc {
            error: other.to_string(),
            details: String::new(),
        },
    }
}

async fn open_stream(endpoint: &Endpoint) -> Result<Box<dyn AsyncStream>, ClientError> {
    match endpoint {
        Endpoint::Tcp(addr) => {
            let socket = TcpStream::connect(addr.as_str())
                .await
                .map_err(|source| ClientError::Connect {
                    address: endpoint.to_string(),
                    source,
                })?;
            socket.set_nodelay(true).ok();
            Ok(Box::new(socket))
        }
        #[cfg(unix)]
        Endpoint::Unix(path) => {
            let socket = tokio::net::UnixStream::connect(path)
                .await
                .map_err(|source| ClientError::Connect {
                    address: endpoint.to_string(),
                    source,
                })?;
            Ok(Box::new(socket))
        }
        #[cfg(not(unix))]
        Endpoint::Unix(_) => Err(ClientError::InvalidAddress(endpoint.to_string())),
    }
}
