//! Status reconciliation
//!
//! Applies provider webhooks and return-URL redirects to the session store.
//! Both paths funnel through `set_status`, whose transition table resolves
//! races between the two; duplicate and out-of-order deliveries reduce to
//! idempotent or rejected writes.

use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::session_repository::{
    CheckoutSession, CheckoutSessionRepository, SessionStatus, StatusWrite,
};
use crate::error::{AppError, AppResult};
use crate::gateway::webhook::{self, NormalizedWebhook};

pub struct WebhookProcessor {
    sessions: Arc<CheckoutSessionRepository>,
}

impl WebhookProcessor {
    pub fn new(sessions: Arc<CheckoutSessionRepository>) -> Self {
        Self { sessions }
    }

    /// Process an asynchronous provider webhook.
    ///
    /// An unknown session id is accepted (the webhook may have outrun
    /// session creation, or the id may be junk); an unparseable payload is
    /// rejected so the provider retries.
    pub async fn process(&self, payload: &JsonValue) -> AppResult<NormalizedWebhook> {
        let normalized = webhook::normalize(payload)?;

        match self
            .sessions
            .set_status(normalized.session_id, normalized.status)
            .await?
        {
            StatusWrite::Applied => {
                info!(
                    session_id = %normalized.session_id,
                    status = %normalized.status,
                    provider_status = %normalized.provider_status,
                    "webhook applied"
                );
            }
            StatusWrite::Rejected { current } => {
                info!(
                    session_id = %normalized.session_id,
                    current = %current,
                    requested = %normalized.status,
                    "webhook ignored by transition rules"
                );
            }
            StatusWrite::Missing => {
                warn!(
                    session_id = %normalized.session_id,
                    "webhook for unknown session"
                );
            }
        }

        Ok(normalized)
    }

    /// Handle the customer's synchronous return from the provider.
    ///
    /// The redirect carries no signature; it can only move the session
    /// through the same transition table as the webhook, so a forged GET
    /// cannot resurrect a failed payment.
    pub async fn record_return(
        &self,
        session_id: Uuid,
        status: SessionStatus,
    ) -> AppResult<CheckoutSession> {
        match self.sessions.set_status(session_id, status).await? {
            StatusWrite::Missing => {
                return Err(AppError::SessionNotFound(session_id.to_string()));
            }
            StatusWrite::Applied => {
                info!(session_id = %session_id, status = %status, "return redirect recorded");
            }
            StatusWrite::Rejected { current } => {
                info!(
                    session_id = %session_id,
                    current = %current,
                    requested = %status,
                    "return redirect ignored by transition rules"
                );
            }
        }

        self.sessions
            .get(session_id)
            .await?
            .ok_or_else(|| AppError::SessionNotFound(session_id.to_string()))
    }
}
