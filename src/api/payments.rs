//! Payment flow handlers: encrypted callback intake, checkout, result
//! pages and the provider webhook.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Form, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::session_repository::{CallbackPayload, CheckoutSession, SessionStatus};
use crate::database::PaymentChannel;
use crate::error::AppError;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    /// URL-safe base64 of nonce || ciphertext || tag.
    pub data: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutForm {
    pub channel_code: String,
}

#[derive(Debug, Serialize)]
pub struct CheckoutView {
    pub session: CheckoutSession,
    pub channels: Vec<PaymentChannel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResultView {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub billed_entity_name: Option<String>,
    pub amount: rust_decimal::Decimal,
    pub selected_channel_code: Option<String>,
}

impl From<CheckoutSession> for ResultView {
    fn from(session: CheckoutSession) -> Self {
        Self {
            session_id: session.id,
            status: session.status,
            billed_entity_name: session.billed_entity_name,
            amount: session.amount,
            selected_channel_code: session.selected_channel_code,
        }
    }
}

/// Entry point from the upstream system. Decrypts the payload, persists a
/// pending session and redirects the browser to the checkout page.
pub async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Result<Redirect, AppError> {
    crate::database::ensure_ready(&state.pool, &state.schema).await?;

    let trace_id = headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty());

    let plaintext = state.resolver.resolve(&query.data)?;
    let payload = CallbackPayload::from_json(&plaintext)
        .map_err(|e| AppError::MalformedPayload(format!("invalid callback descriptor: {}", e)))?;

    let session = state.sessions.create(&payload, &plaintext, trace_id).await?;
    info!(session_id = %session.id, "checkout session created from callback");

    Ok(Redirect::to(&format!("/payment/checkout/{}", session.id)))
}

/// Checkout page data: the session plus the channels its amount qualifies for.
pub async fn checkout_page(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CheckoutView>, AppError> {
    let (session, channels) = state.checkout.checkout_view(id).await?;
    Ok(Json(CheckoutView {
        session,
        channels,
        error: None,
    }))
}

/// Channel selection submit. On success the browser is sent to the provider
/// invoice; on a recoverable error the checkout page is returned again with
/// the failure message inlined.
pub async fn submit_checkout(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Form(form): Form<CheckoutForm>,
) -> Result<Response, AppError> {
    match state.checkout.submit_channel(id, &form.channel_code).await {
        Ok(payment_url) => Ok(Redirect::to(&payment_url).into_response()),
        Err(err @ AppError::SessionNotFound(_)) => Err(err),
        Err(err) => {
            warn!(session_id = %id, error = %err, "checkout submit failed");
            let (session, channels) = state.checkout.checkout_view(id).await?;
            let status = err.status_code();
            let view = CheckoutView {
                session,
                channels,
                error: Some(err.user_message()),
            };
            Ok((status, Json(view)).into_response())
        }
    }
}

/// Provider success redirect. The status write still goes through the
/// transition table, so a session already failed stays failed.
pub async fn payment_success(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ResultView>, AppError> {
    let session = state
        .webhooks
        .record_return(id, SessionStatus::Success)
        .await?;
    Ok(Json(session.into()))
}

/// Provider failure redirect.
pub async fn payment_failed(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ResultView>, AppError> {
    let session = state
        .webhooks
        .record_return(id, SessionStatus::Failed)
        .await?;
    Ok(Json(session.into()))
}

/// Asynchronous provider webhook. Only the status code matters to the
/// caller; a non-2xx response makes the provider retry.
pub async fn xendit_webhook(
    State(state): State<AppState>,
    body: String,
) -> Result<(StatusCode, Json<JsonValue>), AppError> {
    let payload: JsonValue = serde_json::from_str(&body)
        .map_err(|e| AppError::InvalidWebhookPayload(format!("not valid JSON: {}", e)))?;

    let outcome = state.webhooks.process(&payload).await?;
    info!(
        session_id = %outcome.session_id,
        provider_status = %outcome.provider_status,
        "webhook processed"
    );

    Ok((StatusCode::OK, Json(json!({ "success": true }))))
}
