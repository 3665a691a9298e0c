//! API Routes
//!
//! Route handlers organized by functionality.

pub mod export;
pub mod health;
pub mod levels;
pub mod upload;

use crate::api::error::{ApiError, ApiResult};

/// Run a synchronous store call on the blocking pool
pub(crate) async fn blocking<T, E, F>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("Blocking task failed: {}", e)))?
        .map_err(Into::into)
}
