//! Deadlines and cancellation for external calls.

use comply_core::{AppError, AppResult};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Run `fut` with a deadline; an elapsed deadline becomes `AppError::Timeout`.
pub(crate) async fn with_timeout<T>(
    limit: Duration,
    operation: &str,
    fut: impl Future<Output = AppResult<T>>,
) -> AppResult<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout {
            operation: operation.to_string(),
            secs: limit.as_secs(),
        }),
    }
}

/// Run `fut` until it completes or `cancel` fires, whichever is first.
///
/// On cancellation `fut` is dropped, which aborts whatever request it had in
/// flight.
pub(crate) async fn guard<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = T>,
) -> AppResult<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AppError::Cancelled),
        value = fut => Ok(value),
    }
}
