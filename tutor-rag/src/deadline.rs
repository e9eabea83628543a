//! Timeout and cancellation bounds for collaborator calls.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{RagError, Result};

/// Run `call`, failing with [`RagError::Timeout`] once `limit` elapses or
/// [`RagError::Cancelled`] as soon as `cancel` fires.
pub(crate) async fn bounded<T, F>(
    operation: &str,
    limit: Duration,
    cancel: &CancellationToken,
    call: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RagError::Cancelled(operation.to_string())),
        outcome = tokio::time::timeout(limit, call) => match outcome {
            Ok(result) => result,
            Err(_) => Err(RagError::Timeout {
                operation: operation.to_string(),
                timeout_ms: limit.as_millis() as u64,
            }),
        },
    }
}
