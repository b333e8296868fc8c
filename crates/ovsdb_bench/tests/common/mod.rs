//! Shared helpers for integration tests: an in-memory OVSDB table reachable
//! either in-process or over a real JSON-RPC listener.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use ovsdb_client::{
    ClientError, Condition, Connector, Function, JsonCodec, Mutator, Operation, OperationResult,
    Row, RowUuid, Session, Value,
};
use serde_json::{json, Value as Json};
use tokio::net::TcpListener;
use tokio_util::codec::Framed;

pub const DATABASE: &str = "OVN_Southbound";
pub const TABLE: &str = "DHCP_Options";

/// Minimal single-database OVSDB model applying operations to in-memory rows.
#[derive(Default)]
pub struct MemoryDb {
    tables: Mutex<BTreeMap<String, Vec<Row>>>,
    injected: Mutex<Option<Vec<OperationResult>>>,
    transacts: AtomicUsize,
}

impl MemoryDb {
    /// Database with an empty `DHCP_Options` table.
    pub fn new() -> Arc<Self> {
        let db = Self::default();
        db.tables
            .lock()
            .unwrap()
            .insert(TABLE.to_string(), Vec::new());
        Arc::new(db)
    }

    /// Database pre-populated with `rows` DHCP options.
    pub fn with_rows(rows: usize) -> Arc<Self> {
        let db = Self::new();
        for i in 0..rows {
            db.seed_row(Row::from([
                ("name".to_string(), Value::from(format!("opt{i}"))),
                ("code".to_string(), Value::from(i as i64)),
                ("type".to_string(), Value::from("str")),
            ]));
        }
        db
    }

    /// Insert a row directly, returning its identity.
    pub fn seed_row(&self, mut row: Row) -> RowUuid {
        let id = RowUuid::random();
        row.insert("_uuid".to_string(), Value::Uuid(id));
        self.tables
            .lock()
            .unwrap()
            .entry(TABLE.to_string())
            .or_default()
            .push(row);
        id
    }

    pub fn row_ids(&self) -> Vec<RowUuid> {
        self.tables.lock().unwrap()[TABLE]
            .iter()
            .filter_map(|row| row["_uuid"].as_uuid())
            .collect()
    }

    pub fn row(&self, id: RowUuid) -> Option<Row> {
        self.tables.lock().unwrap()[TABLE]
            .iter()
            .find(|row| row["_uuid"].as_uuid() == Some(id))
            .cloned()
    }

    pub fn row_count(&self) -> usize {
        self.tables.lock().unwrap()[TABLE].len()
    }

    pub fn transact_count(&self) -> usize {
        self.transacts.load(Ordering::SeqCst)
    }

    /// Make the next transaction return `results` verbatim.
    pub fn inject_results(&self, results: Vec<OperationResult>) {
        *self.injected.lock().unwrap() = Some(results);
    }

    pub fn apply(
        &self,
        database: &str,
        operations: &[Operation],
    ) -> Result<Vec<OperationResult>, ClientError> {
        self.transacts.fetch_add(1, Ordering::SeqCst);
        if database != DATABASE {
            return Err(ClientError::Rpc {
                error: "unknown database".to_string(),
                details: database.to_string(),
            });
        }
        if let Some(results) = self.injected.lock().unwrap().take() {
            return Ok(results);
        }

        let mut tables = self.tables.lock().unwrap();
        let mut results = Vec::with_capacity(operations.len());
        for op in operations {
            let Some(rows) = tables.get_mut(op.table()) else {
                results.push(OperationResult::error(
                    "unknown table",
                    format!("no table named {}", op.table()),
                ));
                break;
            };
            let result = match op {
                Operation::Insert { row, .. } => {
                    let id = RowUuid::random();
                    let mut row = row.clone();
                    row.insert("_uuid".to_string(), Value::Uuid(id));
                    rows.push(row);
                    OperationResult {
                        uuid: Some(id),
                        ..OperationResult::default()
                    }
                }
                Operation::Select {
                    conditions,
                    columns,
                    ..
                } => {
                    let selected = rows
                        .iter()
                        .filter(|row| matches_all(row, conditions))
                        .map(|row| project(row, columns.as_deref()))
                        .collect();
                    OperationResult::with_rows(selected)
                }
                Operation::Update {
                    conditions, row, ..
                } => {
                    let mut count = 0;
                    for existing in rows.iter_mut().filter(|r| matches_all(r, conditions)) {
                        for (column, value) in row {
                            existing.insert(column.clone(), value.clone());
                        }
                        count += 1;
                    }
                    OperationResult::with_count(count)
                }
                Operation::Mutate {
                    conditions,
                    mutations,
                    ..
                } => {
                    let mut count = 0;
                    for existing in rows.iter_mut().filter(|r| matches_all(r, conditions)) {
                        for mutation in mutations {
                            let current = existing
                                .get(&mutation.column)
                                .and_then(Value::as_i64)
                                .unwrap_or_default();
                            let operand = mutation.value.as_i64().unwrap_or_default();
                            let next = match mutation.mutator {
                                Mutator::Add => current + operand,
                                Mutator::Sub => current - operand,
                                Mutator::Mul => current * operand,
                                _ => current,
                            };
                            existing.insert(mutation.column.clone(), Value::Integer(next));
                        }
                        count += 1;
                    }
                    OperationResult::with_count(count)
                }
                Operation::Delete { conditions, .. } => {
                    let before = rows.len();
                    rows.retain(|row| !matches_all(row, conditions));
                    OperationResult::with_count((before - rows.len()) as u64)
                }
            };
            results.push(result);
        }
        Ok(results)
    }
}

fn matches_all(row: &Row, conditions: &[Condition]) -> bool {
    conditions.iter().all(|cond| {
        let actual = row.get(&cond.column);
        match cond.function {
            Function::Eq => actual == Some(&cond.value),
            Function::Ne => actual != Some(&cond.value),
            _ => false,
        }
    })
}

fn project(row: &Row, columns: Option<&[String]>) -> Row {
    match columns {
        Some(columns) => row
            .iter()
            .filter(|(column, _)| columns.contains(column))
            .map(|(column, value)| (column.clone(), value.clone()))
            .collect(),
        None => row.clone(),
    }
}

/// In-process session over a shared [`MemoryDb`].
#[derive(Clone)]
pub struct MemorySession {
    db: Arc<MemoryDb>,
}

#[async_trait]
impl Session for MemorySession {
    async fn transact(
        &self,
        database: &str,
        operations: &[Operation],
    ) -> Result<Vec<OperationResult>, ClientError> {
        self.db.apply(database, operations)
    }
}

/// Connector handing out [`MemorySession`]s, or refusing every dial.
#[derive(Clone)]
pub struct MemoryConnector {
    db: Arc<MemoryDb>,
    refuse: bool,
}

impl MemoryConnector {
    pub fn new(db: Arc<MemoryDb>) -> Self {
        Self { db, refuse: false }
    }

    pub fn refusing(db: Arc<MemoryDb>) -> Self {
        Self { db, refuse: true }
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    type Session = MemorySession;

    async fn connect(&self, address: &str) -> Result<MemorySession, ClientError> {
        if self.refuse {
            return Err(ClientError::Connect {
                address: address.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
            });
        }
        Ok(MemorySession {
            db: Arc::clone(&self.db),
        })
    }
}

/// Serve `db` over JSON-RPC on an ephemeral localhost port.
///
/// Each connection is greeted with an `echo` probe so clients exercise their
/// keepalive handling.
pub async fn serve_json_rpc(db: Arc<MemoryDb>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind json-rpc listener");
    let addr = listener.local_addr().expect("listener addr");
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let db = Arc::clone(&db);
            tokio::spawn(async move {
                let mut framed = Framed::new(socket, JsonCodec::default());
                let _ = framed
                    .send(json!({"method": "echo", "params": [], "id": "echo"}))
                    .await;
                while let Some(Ok(message)) = framed.next().await {
                    let Some(reply) = handle_message(&db, message) else {
                        continue;
                    };
                    if framed.send(reply).await.is_err() {
                        break;
                    }
                }
            });
        }
    });
    addr
}

fn handle_message(db: &MemoryDb, message: Json) -> Option<Json> {
    let method = message.get("method")?.as_str()?.to_string();
    let id = message.get("id").cloned().unwrap_or(Json::Null);
    let params = message
        .get("params")
        .and_then(Json::as_array)
        .cloned()
        .unwrap_or_default();
    let reply = match method.as_str() {
        "echo" => json!({"id": id, "result": params, "error": null}),
        "list_dbs" => json!({"id": id, "result": [DATABASE], "error": null}),
        "transact" => {
            let database = params.first().and_then(Json::as_str).unwrap_or_default();
            let operations: Result<Vec<Operation>, _> = params
                .iter()
                .skip(1)
                .cloned()
                .map(serde_json::from_value)
                .collect();
            match operations {
                Err(err) => json!({
                    "id": id,
                    "result": null,
                    "error": {"error": "syntax error", "details": err.to_string()},
                }),
                Ok(operations) => match db.apply(database, &operations) {
                    Ok(results) => json!({"id": id, "result": results, "error": null}),
                    Err(ClientError::Rpc { error, details }) => json!({
                        "id": id,
                        "result": null,
                        "error": {"error": error, "details": details},
                    }),
                    Err(other) => json!({"id": id, "result": null, "error": other.to_string()}),
                },
            }
        }
        other => json!({"id": id, "result": null, "error": format!("unknown method {other}")}),
    };
    Some(reply)
}
