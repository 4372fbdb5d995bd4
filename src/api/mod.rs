//! HTTP surface: payment flow, provider webhook, admin reports and auth.

pub mod auth;
pub mod payments;
pub mod reports;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use sqlx::PgPool;

use crate::crypto::DecryptionResolver;
use crate::database::CheckoutSessionRepository;
use crate::services::accounts::AccountService;
use crate::services::checkout::CheckoutService;
use crate::services::webhook_processor::WebhookProcessor;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub schema: String,
    pub resolver: Arc<DecryptionResolver>,
    pub sessions: Arc<CheckoutSessionRepository>,
    pub checkout: Arc<CheckoutService>,
    pub webhooks: Arc<WebhookProcessor>,
    pub accounts: Arc<AccountService>,
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/callback", get(payments::callback))
        .route(
            "/payment/checkout/{id}",
            get(payments::checkout_page).post(payments::submit_checkout),
        )
        .route("/payment/success/{id}", get(payments::payment_success))
        .route("/payment/failed/{id}", get(payments::payment_failed))
        .route("/payment/xendit/webhook", post(payments::xendit_webhook))
        .route("/reports", get(reports::list_reports))
        .route("/auth/login", post(auth::login))
        .route(
            "/auth/password-reset/request",
            post(auth::request_password_reset),
        )
        .route(
            "/auth/password-reset/complete",
            post(auth::complete_password_reset),
        )
        .route("/health", get(health))
        .with_state(state)
}

async fn health(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> impl axum::response::IntoResponse {
    let report = crate::health::run_checks(&state.pool).await;
    let code = if report.status == crate::health::HealthState::Healthy {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    };
    (code, axum::Json(report))
}
