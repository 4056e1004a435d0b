use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/catalog", get(get_catalog))
        .route("/catalog/{city}", get(get_city))
}

// GET /api/catalog
async fn get_catalog(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.catalog.clone())
}

// GET /api/catalog/{city}
async fn get_city(State(state): State<Arc<AppState>>, Path(city): Path<String>) -> Response {
    match state.catalog.city(&city) {
        Some(found) => Json(found.clone()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "status": "error",
                "code": "not_found",
                "message": format!("No theatres listed for {}", city),
            })),
        )
            .into_response(),
    }
}
