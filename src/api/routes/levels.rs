//! Level Routes
//!
//! Read endpoints for stored readings.
//!
//! - GET /api/v1/levels/ - Filtered, ordered list
//! - GET /api/v1/levels/:id/ - Lookup by identifier

use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;

use super::blocking;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::query::ListParams;
use crate::storage::GlucoseLevel;

/// GET /api/v1/levels/
///
/// Readings ordered by timestamp ascending. `user_id`, `start`, `stop` and
/// `limit` are optional; malformed values are ignored.
pub async fn list_levels(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<Vec<GlucoseLevel>>> {
    let filter = ListParams::from_pairs(pairs).to_filter();
    let engine = Arc::clone(&state.engine);

    let levels = blocking(move || engine.list(&filter)).await?;
    Ok(Json(levels))
}

/// GET /api/v1/levels/:id/
///
/// Always a JSON array on success.
pub async fn get_level(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<GlucoseLevel>>> {
    let engine = Arc::clone(&state.engine);

    blocking(move || engine.find_by_id(&id))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("ID not found".to_string()))
}
