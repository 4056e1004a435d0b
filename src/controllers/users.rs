use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::error::LedgerError;
use crate::middleware::AuthUser;
use crate::models::Registration;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
}

// POST /api/register
async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<Registration>,
) -> Result<impl IntoResponse, LedgerError> {
    let identity = state
        .ledger
        .register_user(&req.email, &req.name, &req.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "status": "success", "user": identity })),
    ))
}

// POST /api/login
#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, LedgerError> {
    let identity = state.ledger.login(&req.email, &req.password).await?;
    Ok(Json(json!({ "status": "success", "name": identity.name })))
}

// GET /api/me
async fn me(user: AuthUser) -> impl IntoResponse {
    Json(json!({ "status": "success", "user": user.0 }))
}
