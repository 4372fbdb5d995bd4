//! Admin login and password reset endpoints.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetComplete {
    pub token: String,
    pub new_password: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let user = state
        .accounts
        .verify_login(&request.email, &request.password)
        .await?;
    info!(user_id = %user.id, "admin login");
    Ok(Json(LoginResponse {
        user_id: user.id,
        email: user.email,
        display_name: user.display_name,
    }))
}

/// Always answers success so the endpoint cannot be used to probe for
/// registered addresses. Token delivery is handled by the mailer
/// integration, not this handler.
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(request): Json<ResetRequest>,
) -> Result<Json<JsonValue>, AppError> {
    state.accounts.request_password_reset(&request.email).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn complete_password_reset(
    State(state): State<AppState>,
    Json(request): Json<ResetComplete>,
) -> Result<Json<JsonValue>, AppError> {
    state
        .accounts
        .complete_password_reset(&request.token, &request.new_password)
        .await?;
    Ok(Json(json!({ "success": true })))
}
