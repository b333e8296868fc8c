//! Reconciles a transaction reply against the operations that produced it.
//!
//! Defects are aggregated rather than reported fail-fast, so one failed round
//! trip surfaces every broken operation at once.

use ovsdb_client::{ClientError, Operation, OperationResult};

use crate::error::{BenchError, FailureLine, TransactFailure};

/// Check `results` against `operations`.
///
/// Fails when there are fewer results than operations, when any result
/// carries an error marker, or when the result list is empty. A result that
/// matched no rows is not an error.
pub fn validate(
    results: &[OperationResult],
    operations: &[Operation],
) -> Result<(), TransactFailure> {
    let mut lines = Vec::new();

    if results.len() < operations.len() {
        lines.push(FailureLine::InsufficientReplies {
            replies: results.len(),
            operations: operations.len(),
        });
    }

    for (index, result) in results.iter().enumerate() {
        if !result.is_error() {
            continue;
        }
        let error = result.error_text().to_string();
        let details = result.details_text().to_string();
        match operations.get(index) {
            Some(operation) => lines.push(FailureLine::OperationFailed {
                index,
                error,
                details,
                operation: operation.clone(),
            }),
            None => lines.push(FailureLine::UnmatchedError {
                index,
                error,
                details,
            }),
        }
    }

    if results.is_empty() {
        lines.push(FailureLine::EmptyReply);
    }

    if lines.is_empty() {
        Ok(())
    } else {
        Err(TransactFailure::new(lines))
    }
}

/// Validate a raw executor reply.
///
/// A transport error short-circuits every other check and is returned as-is;
/// otherwise the results are handed back once they validate.
pub fn check_reply(
    reply: Result<Vec<OperationResult>, ClientError>,
    operations: &[Operation],
) -> Result<Vec<OperationResult>, BenchError> {
    let results = reply?;
    validate(&results, operations).map_err(BenchError::Protocol)?;
    Ok(results)
}
