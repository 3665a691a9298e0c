//! Upload Routes
//!
//! - POST /api/v1/upload/ - One reading or an array of readings

use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use std::sync::Arc;

use super::blocking;
use crate::api::dto::{UploadRequest, UploadResponse};
use crate::api::error::ApiResult;
use crate::api::state::AppState;

/// POST /api/v1/upload/
///
/// Validates the whole payload before touching the store, then inserts it
/// in one transaction. Responds with the created record (object request) or
/// records (array request).
pub async fn upload_levels(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    let request = UploadRequest::from_json(&body)?;

    let store = Arc::clone(&state.store);
    let levels = request.levels().to_vec();
    let created = blocking(move || store.insert_batch(&levels)).await?;

    tracing::info!(records = created.len(), "Uploaded readings");

    Ok((StatusCode::CREATED, Json(request.respond(created)?)))
}
