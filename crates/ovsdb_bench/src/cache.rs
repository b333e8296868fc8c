//! Snapshot of existing row identities used to target scoped operations.
//!
//! The cache is filled once from a full-table select when a client dials and
//! is read-only afterwards. Rows inserted or deleted during a run are not
//! reflected; a stale identity just makes its operation match nothing.

use ovsdb_client::{RowUuid, Session};
use rand::Rng;

use crate::builder::OperationBuilder;
use crate::error::BenchError;
use crate::executor::TransactionExecutor;
use crate::validate::check_reply;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RowHandleCache {
    handles: Vec<RowUuid>,
}

impl RowHandleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_handles(handles: Vec<RowUuid>) -> Self {
        Self { handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn handles(&self) -> &[RowUuid] {
        &self.handles
    }

    /// Replace the contents with the identities of every row in the target
    /// table. On error the previous contents are kept.
    pub async fn refresh<S: Session + ?Sized>(
        &mut self,
        session: &S,
        executor: &TransactionExecutor,
        builder: &OperationBuilder,
    ) -> Result<usize, BenchError> {
        let request = builder.select_all();
        let reply = executor.execute(session, &request).await;
        let results = check_reply(reply, request.operations())?;

        let column = builder.target().id_column.as_str();
        let mut handles = Vec::new();
        for row in results.iter().flat_map(|result| result.rows()) {
            let value = row.get(column).ok_or_else(|| BenchError::MalformedRow {
                column: column.to_string(),
                reason: "column missing from row".to_string(),
            })?;
            let id = value.as_uuid().ok_or_else(|| BenchError::MalformedRow {
                column: column.to_string(),
                reason: format!("expected uuid, found {value}"),
            })?;
            handles.push(id);
        }

        self.handles = handles;
        Ok(self.handles.len())
    }

    /// Uniformly random cached identity, or the nil identity when empty.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> RowUuid {
        if self.handles.is_empty() {
            return RowUuid::nil();
        }
        self.handles[rng.gen_range(0..self.handles.len())]
    }
}
