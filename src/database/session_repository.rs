//! Checkout session persistence
//!
//! The repository exclusively owns session mutation: the checkout
//! orchestrator and the reconciliation endpoint both write through
//! `set_status`, which applies the status transition rules inside the UPDATE
//! itself so racing writers cannot produce a forbidden transition.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::error::DatabaseError;

/// Canonical session status.
///
/// Transitions are monotonic toward `Failed`: a session may leave `Pending`
/// for either terminal-ish state, a late failure may override an unconfirmed
/// success, but a failed session never becomes successful again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionStatus {
    Pending,
    Success,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "PENDING",
            SessionStatus::Success => "SUCCESS",
            SessionStatus::Failed => "FAILED",
        }
    }

    /// Parse a status name, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "PENDING" => Some(SessionStatus::Pending),
            "SUCCESS" => Some(SessionStatus::Success),
            "FAILED" => Some(SessionStatus::Failed),
            _ => None,
        }
    }

    /// The declared transition table. Mirrored by the conditional UPDATE in
    /// [`CheckoutSessionRepository::set_status`].
    pub fn can_transition(self, to: SessionStatus) -> bool {
        match (self, to) {
            (SessionStatus::Pending, _) => true,
            (_, SessionStatus::Failed) => true,
            (a, b) => a == b,
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One payment attempt, tracked from callback receipt to final status.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CheckoutSession {
    pub id: Uuid,
    pub trace_id: Option<String>,
    pub invoice_reference: Option<String>,
    pub invoice_id: Option<String>,
    pub billed_entity_name: Option<String>,
    pub space_id: Option<String>,
    pub space_name: Option<String>,
    pub amount: Decimal,
    #[serde(skip_serializing)]
    pub raw_payload: String,
    pub status: SessionStatus,
    pub selected_channel_code: Option<String>,
    pub payment_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Decrypted transaction descriptor from the provider callback.
///
/// The upstream system emits PascalCase field names; newer payloads use
/// snake_case, so both are accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackPayload {
    #[serde(default, alias = "InvoiceReference")]
    pub invoice_reference: Option<String>,
    #[serde(default, alias = "InvoiceId")]
    pub invoice_id: Option<String>,
    #[serde(default, alias = "BilledEntityName")]
    pub billed_entity_name: Option<String>,
    #[serde(default, alias = "SpaceId")]
    pub space_id: Option<String>,
    #[serde(default, alias = "SpaceName")]
    pub space_name: Option<String>,
    #[serde(alias = "Amount")]
    pub amount: Decimal,
}

impl CallbackPayload {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Outcome of a status write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusWrite {
    Applied,
    /// The transition table forbade the write; the row keeps `current`.
    Rejected { current: SessionStatus },
    /// No row with that id. Not fatal: the id may be attacker-supplied or
    /// the webhook may have outrun session creation.
    Missing,
}

/// Search filters for the report listing.
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub status: Option<SessionStatus>,
    /// Case-insensitive substring match on invoice reference / invoice id.
    pub reference: Option<String>,
}

pub struct CheckoutSessionRepository {
    pool: PgPool,
}

impl CheckoutSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist a new session with a fresh id and `Pending` status.
    pub async fn create(
        &self,
        payload: &CallbackPayload,
        raw_payload: &str,
        trace_id: Option<&str>,
    ) -> Result<CheckoutSession, DatabaseError> {
        let id = Uuid::new_v4();
        sqlx::query_as::<_, CheckoutSession>(
            "INSERT INTO checkout_sessions
                 (id, trace_id, invoice_reference, invoice_id, billed_entity_name,
                  space_id, space_name, amount, raw_payload, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'PENDING')
             RETURNING id, trace_id, invoice_reference, invoice_id, billed_entity_name,
                       space_id, space_name, amount, raw_payload, status,
                       selected_channel_code, payment_url, created_at, updated_at",
        )
        .bind(id)
        .bind(trace_id)
        .bind(&payload.invoice_reference)
        .bind(&payload.invoice_id)
        .bind(&payload.billed_entity_name)
        .bind(&payload.space_id)
        .bind(&payload.space_name)
        .bind(payload.amount)
        .bind(raw_payload)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<CheckoutSession>, DatabaseError> {
        sqlx::query_as::<_, CheckoutSession>(
            "SELECT id, trace_id, invoice_reference, invoice_id, billed_entity_name,
                    space_id, space_name, amount, raw_payload, status,
                    selected_channel_code, payment_url, created_at, updated_at
             FROM checkout_sessions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Record the chosen channel and provider redirect URL. Idempotent
    /// overwrite; a retry before completion replaces the previous choice.
    pub async fn record_channel_selection(
        &self,
        id: Uuid,
        channel_code: &str,
        payment_url: &str,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE checkout_sessions
             SET selected_channel_code = $2, payment_url = $3, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(channel_code)
        .bind(payment_url)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    /// Apply a status transition.
    ///
    /// The WHERE clause encodes the transition table, so the check and the
    /// write are a single statement and concurrent callers (webhook vs.
    /// redirect handler) cannot interleave a forbidden transition.
    pub async fn set_status(
        &self,
        id: Uuid,
        status: SessionStatus,
    ) -> Result<StatusWrite, DatabaseError> {
        let updated = sqlx::query_scalar::<_, Uuid>(
            "UPDATE checkout_sessions
             SET status = $2, updated_at = NOW()
             WHERE id = $1
               AND (status = 'PENDING' OR $2 = 'FAILED' OR status = $2)
             RETURNING id",
        )
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if updated.is_some() {
            return Ok(StatusWrite::Applied);
        }

        let current = sqlx::query_scalar::<_, SessionStatus>(
            "SELECT status FROM checkout_sessions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        match current {
            Some(current) => {
                info!(session_id = %id, from = %current, to = %status, "status transition rejected");
                Ok(StatusWrite::Rejected { current })
            }
            None => {
                warn!(session_id = %id, to = %status, "status write for unknown session");
                Ok(StatusWrite::Missing)
            }
        }
    }

    /// Filtered, paginated listing, newest first.
    ///
    /// `page_size <= 0` returns every matching row in one page.
    pub async fn search(
        &self,
        filter: &SessionFilter,
        page: i64,
        page_size: i64,
    ) -> Result<(Vec<CheckoutSession>, i64), DatabaseError> {
        let mut count_query: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM checkout_sessions WHERE 1=1");
        Self::push_filters(&mut count_query, filter);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT id, trace_id, invoice_reference, invoice_id, billed_entity_name,
                    space_id, space_name, amount, raw_payload, status,
                    selected_channel_code, payment_url, created_at, updated_at
             FROM checkout_sessions WHERE 1=1",
        );
        Self::push_filters(&mut query, filter);
        query.push(" ORDER BY created_at DESC");

        if page_size > 0 {
            let offset = (page.max(1) - 1) * page_size;
            query.push(" LIMIT ");
            query.push_bind(page_size);
            query.push(" OFFSET ");
            query.push_bind(offset);
        }

        let rows = query
            .build_query_as::<CheckoutSession>()
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        Ok((rows, total))
    }

    fn push_filters(query: &mut QueryBuilder<Postgres>, filter: &SessionFilter) {
        if let Some(from) = filter.from {
            query.push(" AND created_at >= ");
            query.push_bind(from);
        }
        if let Some(to) = filter.to {
            query.push(" AND created_at <= ");
            query.push_bind(to);
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ");
            query.push_bind(status);
        }
        if let Some(reference) = &filter.reference {
            let pattern = format!("%{}%", reference.trim());
            query.push(" AND (invoice_reference ILIKE ");
            query.push_bind(pattern.clone());
            query.push(" OR invoice_id ILIKE ");
            query.push_bind(pattern);
            query.push(")");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[test]
    fn transition_table() {
        use SessionStatus::*;

        assert!(Pending.can_transition(Success));
        assert!(Pending.can_transition(Failed));
        assert!(Pending.can_transition(Pending));
        // a late failure may override an unconfirmed success
        assert!(Success.can_transition(Failed));
        assert!(Success.can_transition(Success));
        assert!(Failed.can_transition(Failed));
        // failure is terminal
        assert!(!Failed.can_transition(Success));
        assert!(!Failed.can_transition(Pending));
        assert!(!Success.can_transition(Pending));
    }

    #[test]
    fn status_parse_is_case_insensitive() {
        assert_eq!(SessionStatus::parse(" pending "), Some(SessionStatus::Pending));
        assert_eq!(SessionStatus::parse("Success"), Some(SessionStatus::Success));
        assert_eq!(SessionStatus::parse("FAILED"), Some(SessionStatus::Failed));
        assert_eq!(SessionStatus::parse("processing"), None);
    }

    #[test]
    fn callback_payload_accepts_both_casings() {
        let pascal = r#"{
            "InvoiceReference": "INV-042",
            "InvoiceId": "9912",
            "BilledEntityName": "Acme Ltd",
            "SpaceId": "sp_7",
            "SpaceName": "Meeting Room A",
            "Amount": 500.00
        }"#;
        let payload = CallbackPayload::from_json(pascal).unwrap();
        assert_eq!(payload.invoice_reference.as_deref(), Some("INV-042"));
        assert_eq!(payload.amount, Decimal::from_str("500.00").unwrap());

        let snake = r#"{"invoice_reference":"INV-042","amount":"120.50"}"#;
        let payload = CallbackPayload::from_json(snake).unwrap();
        assert_eq!(payload.amount, Decimal::from_str("120.50").unwrap());
        assert!(payload.space_name.is_none());
    }

    #[test]
    fn callback_payload_requires_amount() {
        assert!(CallbackPayload::from_json(r#"{"InvoiceId":"1"}"#).is_err());
    }
}
