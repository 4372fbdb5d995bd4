//! Payment request orchestration
//!
//! Turns a validated channel selection into a provider invoice and persists
//! the resulting redirect URL on the session. The channel is re-validated
//! against the eligible set at submission time, not just at render time, so
//! a tampered or stale form cannot reach the provider.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::Arc;
use tracing::{error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::config::{ServerConfig, XenditConfig};
use crate::database::channel_repository::{PaymentChannel, PaymentChannelRepository};
use crate::database::session_repository::{
    CheckoutSession, CheckoutSessionRepository, SessionStatus,
};
use crate::error::{AppError, AppResult};
use crate::gateway::types::{InvoiceItem, InvoiceMetadata, InvoiceRequest};
use crate::gateway::{GatewayError, XenditClient};

pub struct CheckoutService {
    sessions: Arc<CheckoutSessionRepository>,
    channels: Arc<PaymentChannelRepository>,
    gateway: Arc<XenditClient>,
    public_base_url: String,
    fallback_success_url: String,
    fallback_failed_url: String,
    statement_descriptor: String,
}

impl CheckoutService {
    pub fn new(
        sessions: Arc<CheckoutSessionRepository>,
        channels: Arc<PaymentChannelRepository>,
        gateway: Arc<XenditClient>,
        server: &ServerConfig,
        xendit: &XenditConfig,
    ) -> Self {
        Self {
            sessions,
            channels,
            gateway,
            public_base_url: server.public_base_url.clone(),
            fallback_success_url: xendit.success_url.clone(),
            fallback_failed_url: xendit.failed_url.clone(),
            statement_descriptor: xendit.statement_descriptor.clone(),
        }
    }

    /// Session plus its eligible channels, for the checkout view.
    pub async fn checkout_view(
        &self,
        session_id: Uuid,
    ) -> AppResult<(CheckoutSession, Vec<PaymentChannel>)> {
        let session = self
            .sessions
            .get(session_id)
            .await?
            .ok_or_else(|| AppError::SessionNotFound(session_id.to_string()))?;

        let channels = self.channels.eligible_channels(session.amount).await?;
        Ok((session, channels))
    }

    /// Validate the chosen channel, create the provider invoice and return
    /// the hosted-checkout URL to redirect the customer to.
    pub async fn submit_channel(
        &self,
        session_id: Uuid,
        channel_code: &str,
    ) -> AppResult<String> {
        let channel_code = channel_code.trim();
        if channel_code.is_empty() {
            return Err(AppError::InvalidSelection("no channel chosen".to_string()));
        }

        let session = self
            .sessions
            .get(session_id)
            .await?
            .ok_or_else(|| AppError::SessionNotFound(session_id.to_string()))?;

        let eligible = self.channels.eligible_channels(session.amount).await?;
        if eligible.is_empty() {
            return Err(AppError::NoChannelsAvailable);
        }

        let channel = eligible
            .iter()
            .find(|c| c.code == channel_code)
            .ok_or_else(|| {
                AppError::InvalidSelection(format!(
                    "channel '{}' not eligible for amount {}",
                    channel_code, session.amount
                ))
            })?;

        let amount = round_to_whole_units(session.amount)?;

        let request = InvoiceRequest {
            external_id: external_reference(&session),
            amount,
            currency: channel.currency.clone(),
            description: line_item_name(&session),
            success_redirect_url: self.return_url("success", session_id),
            failure_redirect_url: self.return_url("failed", session_id),
            payment_methods: vec![channel.code.clone()],
            statement_descriptor: Some(self.statement_descriptor.clone()),
            metadata: InvoiceMetadata {
                index_guid: session_id,
            },
            items: vec![InvoiceItem {
                name: line_item_name(&session),
                quantity: 1,
                price: amount,
            }],
        };

        match self.gateway.create_invoice(&request).await {
            Ok((redirect_url, _)) => {
                self.sessions
                    .record_channel_selection(session_id, &channel.code, &redirect_url)
                    .await?;
                info!(
                    session_id = %session_id,
                    channel = %channel.code,
                    "checkout submitted, redirecting to provider"
                );
                Ok(redirect_url)
            }
            // A response with no redirect URL is a provider-contract problem,
            // not a failed payment attempt; leave the session untouched.
            Err(GatewayError::MissingRedirectUrl) => Err(AppError::MissingRedirectUrl),
            Err(err) => {
                error!(session_id = %session_id, error = %err, "invoice creation failed");
                if let Err(status_err) = self
                    .sessions
                    .set_status(session_id, SessionStatus::Failed)
                    .await
                {
                    warn!(
                        session_id = %session_id,
                        error = %status_err,
                        "failed to mark session failed after provider error"
                    );
                }
                Err(err.into())
            }
        }
    }

    /// Build a return URL pointing back at this service, falling back to
    /// the statically configured URL when joining fails.
    fn return_url(&self, leg: &str, session_id: Uuid) -> String {
        let joined = Url::parse(&self.public_base_url)
            .and_then(|base| base.join(&format!("/payment/{}/{}", leg, session_id)));

        match joined {
            Ok(url) => url.to_string(),
            Err(_) => {
                if leg == "success" {
                    self.fallback_success_url.clone()
                } else {
                    self.fallback_failed_url.clone()
                }
            }
        }
    }
}

/// Provider external reference: invoice reference, else invoice id, else
/// the session id itself.
pub fn external_reference(session: &CheckoutSession) -> String {
    session
        .invoice_reference
        .clone()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| {
            session
                .invoice_id
                .clone()
                .filter(|v| !v.trim().is_empty())
        })
        .unwrap_or_else(|| session.id.to_string())
}

fn line_item_name(session: &CheckoutSession) -> String {
    session
        .space_name
        .clone()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| format!("Payment {}", session.id))
}

/// Round half-away-from-zero to whole currency units; the rounded amount
/// must be strictly positive.
pub fn round_to_whole_units(amount: Decimal) -> AppResult<i64> {
    let rounded = amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let units = rounded
        .to_i64()
        .ok_or_else(|| AppError::InvalidAmount(format!("amount {} out of range", amount)))?;

    if units <= 0 {
        return Err(AppError::InvalidAmount(format!(
            "amount must be positive, got {}",
            amount
        )));
    }
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::str::FromStr;

    fn session(reference: Option<&str>, invoice_id: Option<&str>) -> CheckoutSession {
        CheckoutSession {
            id: Uuid::new_v4(),
            trace_id: None,
            invoice_reference: reference.map(str::to_string),
            invoice_id: invoice_id.map(str::to_string),
            billed_entity_name: None,
            space_id: None,
            space_name: Some("Meeting Room A".to_string()),
            amount: Decimal::from_str("500.00").unwrap(),
            raw_payload: String::new(),
            status: SessionStatus::Pending,
            selected_channel_code: None,
            payment_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        let cases = [
            ("500.00", 500),
            ("499.50", 500),
            ("499.49", 499),
            ("0.51", 1),
            ("1.00", 1),
        ];
        for (input, expected) in cases {
            let amount = Decimal::from_str(input).unwrap();
            assert_eq!(round_to_whole_units(amount).unwrap(), expected, "{}", input);
        }
    }

    #[test]
    fn nonpositive_amounts_are_rejected_before_any_call() {
        for input in ["0.00", "0.40", "-10.00"] {
            let amount = Decimal::from_str(input).unwrap();
            assert!(matches!(
                round_to_whole_units(amount),
                Err(AppError::InvalidAmount(_))
            ));
        }
    }

    #[test]
    fn external_reference_fallback_chain() {
        let s = session(Some("INV-042"), Some("9912"));
        assert_eq!(external_reference(&s), "INV-042");

        let s = session(None, Some("9912"));
        assert_eq!(external_reference(&s), "9912");

        let s = session(Some("  "), None);
        assert_eq!(external_reference(&s), s.id.to_string());
    }

    #[test]
    fn line_item_uses_space_name() {
        let s = session(None, None);
        assert_eq!(line_item_name(&s), "Meeting Room A");

        let mut s = session(None, None);
        s.space_name = None;
        assert_eq!(line_item_name(&s), format!("Payment {}", s.id));
    }
}
