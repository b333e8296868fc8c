//! Translates a logical operation into a protocol-correct transaction.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use ovsdb_client::{Condition, Mutation, Mutator, Operation, Row, RowUuid, Value};

use crate::config::{BenchTarget, OpKind};

/// Ordered operations submitted together in one `transact`.
#[derive(Clone, Debug, PartialEq)]
pub struct TransactionRequest {
    operations: Vec<Operation>,
}

impl TransactionRequest {
    pub fn new(operations: Vec<Operation>) -> Self {
        Self { operations }
    }

    pub fn single(operation: Operation) -> Self {
        Self::new(vec![operation])
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Builds single-operation transactions against one [`BenchTarget`].
///
/// Building never fails and never performs I/O. The only state is the update
/// sequence, which keeps successive `update` payloads distinct so repeated
/// writes are never no-ops.
#[derive(Debug)]
pub struct OperationBuilder {
    target: BenchTarget,
    update_seq: AtomicU64,
}

impl OperationBuilder {
    pub fn new(target: BenchTarget) -> Self {
        Self {
            target,
            update_seq: AtomicU64::new(0),
        }
    }

    pub fn target(&self) -> &BenchTarget {
        &self.target
    }

    /// Build the transaction for `op`.
    ///
    /// `identity` scopes every kind except insert, which ignores it. A nil
    /// identity is still sent as an equality filter and simply matches nothing.
    pub fn build(&self, op: OpKind, identity: RowUuid) -> TransactionRequest {
        let table = self.target.table.clone();
        let operation = match op {
            OpKind::Insert => Operation::Insert {
                table,
                row: self.target.insert_row.clone(),
                uuid_name: None,
            },
            OpKind::Select => Operation::Select {
                table,
                conditions: self.identity_filter(identity),
                columns: None,
            },
            OpKind::Update => Operation::Update {
                table,
                conditions: self.identity_filter(identity),
                row: Row::from([(
                    self.target.update_column.clone(),
                    Value::String(self.next_update_value()),
                )]),
            },
            OpKind::Mutate => Operation::Mutate {
                table,
                conditions: self.identity_filter(identity),
                mutations: vec![Mutation::new(
                    self.target.mutate_column.clone(),
                    Mutator::Add,
                    1i64,
                )],
            },
            OpKind::Delete => Operation::Delete {
                table,
                conditions: self.identity_filter(identity),
            },
        };
        TransactionRequest::single(operation)
    }

    /// Unfiltered select that returns only the identity column of every row.
    pub fn select_all(&self) -> TransactionRequest {
        TransactionRequest::single(Operation::Select {
            table: self.target.table.clone(),
            conditions: Vec::new(),
            columns: Some(vec![self.target.id_column.clone()]),
        })
    }

    fn identity_filter(&self, identity: RowUuid) -> Vec<Condition> {
        vec![Condition::uuid_eq(self.target.id_column.clone(), identity)]
    }

    fn next_update_value(&self) -> String {
        let seq = self.update_seq.fetch_add(1, Ordering::Relaxed);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        format!("{nanos}-{seq}")
    }
}
