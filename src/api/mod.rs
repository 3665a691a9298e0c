//! Glucose REST API
//!
//! HTTP API layer for the glucose record store, built with Axum.
//!
//! # Endpoints
//!
//! ## Levels
//! - `GET /api/v1/levels/` - List readings (`user_id`, `start`, `stop`, `limit`)
//! - `GET /api/v1/levels/:id/` - Readings with the given id
//!
//! ## Upload
//! - `POST /api/v1/upload/` - One reading or an array of readings
//!
//! ## Export
//! - `GET /api/v1/export/` - CSV download of every matching reading
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health` - Full health status
//!
//! Collection paths also answer without the trailing slash.
//!
//! # Example
//!
//! ```rust,ignore
//! use glucose::api::{serve, ApiConfig, AppState};
//! use glucose::storage::{LevelStore, StorageConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(LevelStore::open(&StorageConfig::default())?);
//!     let config = ApiConfig::default();
//!
//!     let state = AppState::new(store, config.clone());
//!     serve(state, &config).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult, ValidationErrors};
pub use state::{ApiConfig, AppState};

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Level routes
        .route("/levels/", get(routes::levels::list_levels))
        .route("/levels", get(routes::levels::list_levels))
        .route("/levels/:id/", get(routes::levels::get_level))
        .route("/levels/:id", get(routes::levels::get_level))
        // Upload routes
        .route("/upload/", post(routes::upload::upload_levels))
        .route("/upload", post(routes::upload::upload_levels))
        // Export routes
        .route("/export/", get(routes::export::export_levels))
        .route("/export", get(routes::export::export_levels))
        .layer(DefaultBodyLimit::max(state.config.max_body_size));

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    let cors = cors_layer(&state.config.cors_origins);

    // Create shared state
    let shared_state = Arc::new(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .nest("/health", health_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(shared_state)
}

/// CORS policy: any origin when none are configured
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}

/// Start the API server
pub async fn serve(state: AppState, config: &ApiConfig) -> Result<(), ApiError> {
    let router = build_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Glucose API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Glucose API shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LevelStore;
    use axum::{
        body::{Body, Bytes},
        http::{header, HeaderMap, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    fn create_test_app() -> Router {
        let store = Arc::new(LevelStore::open_in_memory().unwrap());
        let state = AppState::new(store, ApiConfig::default());
        build_router(state)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, body)
    }

    async fn get(app: &Router, uri: &str) -> (StatusCode, HeaderMap, Bytes) {
        send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
    }

    async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
        let (status, _, body) = get(app, uri).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn upload(app: &Router, payload: &str) -> (StatusCode, Value) {
        let (status, _, body) = send(
            app,
            Request::builder()
                .method("POST")
                .uri("/api/v1/upload/")
                .header("Content-Type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn seeded_app() -> Router {
        let app = create_test_app();
        let (status, _) = upload(
            &app,
            r#"[
                {"user_id": "bob", "timestamp": "2024-01-15T08:30:00Z", "value": 130},
                {"user_id": "alice", "timestamp": "2024-01-15T08:00:00Z", "value": 95.5},
                {"user_id": "alice", "timestamp": "2024-01-15T08:15:00Z", "value": 101},
                {"user_id": "alice", "timestamp": "2024-01-15T08:45:00Z", "value": 99}
            ]"#,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        app
    }

    fn timestamps(levels: &Value) -> Vec<String> {
        levels
            .as_array()
            .unwrap()
            .iter()
            .map(|l| l["timestamp"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_health_live() {
        let app = create_test_app();
        let (status, _, _) = get(&app, "/health/live").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_ready() {
        let app = create_test_app();
        let (status, _, _) = get(&app, "/health/ready").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_full() {
        let app = seeded_app().await;
        let (status, body) = get_json(&app, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["records"], 4);
    }

    #[tokio::test]
    async fn test_upload_single_returns_object() {
        let app = create_test_app();
        let (status, body) = upload(
            &app,
            r#"{"user_id": "alice", "timestamp": "2024-01-15T08:30:00Z", "value": "120"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert!(body["id"].is_i64());
        assert_eq!(body["user_id"], "alice");
        assert_eq!(body["timestamp"], "2024-01-15T08:30:00Z");
        assert_eq!(body["value"], 120.0);
    }

    #[tokio::test]
    async fn test_upload_array_returns_array() {
        let app = create_test_app();
        let (status, body) = upload(
            &app,
            r#"[
                {"user_id": "a", "timestamp": "2024-01-15T08:30:00Z", "value": 1},
                {"user_id": "b", "timestamp": "2024-01-15T08:31:00Z", "value": 2}
            ]"#,
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_upload_validation_errors() {
        let app = create_test_app();
        let (status, body) = upload(&app, r#"{"user_id": "alice", "value": "high"}"#).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Validation failed");
        assert!(body["fields"]["timestamp"].is_array());
        assert!(body["fields"]["value"].is_array());
    }

    #[tokio::test]
    async fn test_upload_batch_is_all_or_nothing() {
        let app = create_test_app();
        let (status, body) = upload(
            &app,
            r#"[
                {"user_id": "a", "timestamp": "2024-01-15T08:30:00Z", "value": 1},
                {"user_id": "", "timestamp": "2024-01-15T08:31:00Z", "value": 2}
            ]"#,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["fields"]["[1].user_id"].is_array());

        let (_, levels) = get_json(&app, "/api/v1/levels/").await;
        assert_eq!(levels, json!([]));
    }

    #[tokio::test]
    async fn test_upload_invalid_json() {
        let app = create_test_app();
        let (status, body) = upload(&app, "not json").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_list_sorted_by_timestamp() {
        let app = seeded_app().await;
        let (status, body) = get_json(&app, "/api/v1/levels/").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            timestamps(&body),
            vec![
                "2024-01-15T08:00:00Z",
                "2024-01-15T08:15:00Z",
                "2024-01-15T08:30:00Z",
                "2024-01-15T08:45:00Z",
            ]
        );
    }

    #[tokio::test]
    async fn test_list_filters_and_limit() {
        let app = seeded_app().await;

        let (_, body) = get_json(&app, "/api/v1/levels/?user_id=alice").await;
        assert_eq!(body.as_array().unwrap().len(), 3);

        let (_, body) = get_json(
            &app,
            "/api/v1/levels/?start=2024-01-15T08:15:00Z&stop=2024-01-15T08:30:00Z",
        )
        .await;
        assert_eq!(
            timestamps(&body),
            vec!["2024-01-15T08:15:00Z", "2024-01-15T08:30:00Z"]
        );

        let (_, body) = get_json(&app, "/api/v1/levels/?user_id=alice&limit=2").await;
        assert_eq!(
            timestamps(&body),
            vec!["2024-01-15T08:00:00Z", "2024-01-15T08:15:00Z"]
        );

        let (_, body) = get_json(&app, "/api/v1/levels/?limit=0").await;
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_list_ignores_malformed_bounds() {
        let app = seeded_app().await;
        let (status, body) =
            get_json(&app, "/api/v1/levels/?start=yesterday&stop=soon&limit=many").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_list_repeated_parameters_take_last_value() {
        let app = seeded_app().await;

        let (status, body) = get_json(&app, "/api/v1/levels/?limit=1&limit=2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);

        let (status, body) = get_json(
            &app,
            "/api/v1/levels/?start=a&start=2024-01-15T08:30:00Z",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            timestamps(&body),
            vec!["2024-01-15T08:30:00Z", "2024-01-15T08:45:00Z"]
        );

        let (status, body) = get_json(&app, "/api/v1/levels/?start=a&start=b").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_export_repeated_parameters_take_last_value() {
        let app = seeded_app().await;
        let (status, _, body) = get(&app, "/api/v1/export/?user_id=alice&user_id=bob").await;
        let text = String::from_utf8(body.to_vec()).unwrap();

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            text,
            "user_id,timestamp,value\nbob,2024-01-15T08:30:00Z,130.0\n"
        );
    }

    #[tokio::test]
    async fn test_get_level_by_id() {
        let app = seeded_app().await;
        let (_, all) = get_json(&app, "/api/v1/levels/").await;
        let first = all[0].clone();

        let uri = format!("/api/v1/levels/{}/", first["id"]);
        let (status, body) = get_json(&app, &uri).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([first]));
    }

    #[tokio::test]
    async fn test_get_level_not_found() {
        let app = seeded_app().await;

        for uri in ["/api/v1/levels/9999/", "/api/v1/levels/abc/"] {
            let (status, body) = get_json(&app, uri).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(body, json!({"error": "ID not found"}));
        }
    }

    #[tokio::test]
    async fn test_export_empty_is_header_only() {
        let app = create_test_app();
        let (status, headers, body) = get(&app, "/api/v1/export/").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "text/csv");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"glucose_levels.csv\""
        );
        assert_eq!(&body[..], b"user_id,timestamp,value\n");
    }

    #[tokio::test]
    async fn test_export_rows_in_timestamp_order() {
        let app = seeded_app().await;
        let (_, _, body) = get(&app, "/api/v1/export/").await;
        let text = String::from_utf8(body.to_vec()).unwrap();

        assert_eq!(
            text,
            "user_id,timestamp,value\n\
             alice,2024-01-15T08:00:00Z,95.5\n\
             alice,2024-01-15T08:15:00Z,101.0\n\
             bob,2024-01-15T08:30:00Z,130.0\n\
             alice,2024-01-15T08:45:00Z,99.0\n"
        );
    }

    #[tokio::test]
    async fn test_export_honours_filters() {
        let app = seeded_app().await;
        let (_, _, body) = get(&app, "/api/v1/export/?user_id=bob").await;
        let text = String::from_utf8(body.to_vec()).unwrap();

        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("bob,2024-01-15T08:30:00Z,130.0"));
    }

    #[tokio::test]
    async fn test_paths_without_trailing_slash() {
        let app = seeded_app().await;
        let (status, body) = get_json(&app, "/api/v1/levels?user_id=bob").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
    }
}
