//! Tolerant webhook payload decoding
//!
//! Xendit webhook shapes vary: fields arrive top-level or nested under
//! `data`, and the status vocabulary differs between invoice and payment
//! events. Decoding normalizes everything into one canonical struct so the
//! reconciliation logic never touches raw JSON.

use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::database::session_repository::SessionStatus;
use crate::error::{AppError, AppResult};

/// Canonical view of an inbound status webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedWebhook {
    pub session_id: Uuid,
    pub status: SessionStatus,
    /// Provider's original status word, kept for logging.
    pub provider_status: String,
}

/// Map the provider's status vocabulary onto the canonical session status.
/// Unrecognized words map to `None`; the caller rejects rather than guesses.
pub fn map_provider_status(raw: &str) -> Option<SessionStatus> {
    match raw.trim().to_uppercase().as_str() {
        "SUCCEEDED" | "SUCCESS" | "PAID" | "COMPLETED" | "SETTLED" => Some(SessionStatus::Success),
        "FAILED" | "EXPIRED" | "CANCELED" | "CANCELLED" => Some(SessionStatus::Failed),
        _ => None,
    }
}

/// Decode a webhook body into its canonical form.
///
/// The session id is taken from `metadata.index_guid`, falling back to
/// `reference_id`, looking first at the top level and then under `data`.
pub fn normalize(payload: &JsonValue) -> AppResult<NormalizedWebhook> {
    let scopes = [Some(payload), payload.get("data")];

    let session_id = scopes
        .iter()
        .flatten()
        .find_map(|scope| extract_session_id(scope))
        .ok_or_else(|| AppError::InvalidWebhookPayload("no parseable session id".to_string()))?;

    let provider_status = scopes
        .iter()
        .flatten()
        .find_map(|scope| extract_status(scope))
        .ok_or_else(|| AppError::InvalidWebhookPayload("no status field".to_string()))?;

    let status = map_provider_status(&provider_status).ok_or_else(|| {
        AppError::InvalidWebhookPayload(format!("unrecognized status '{}'", provider_status))
    })?;

    Ok(NormalizedWebhook {
        session_id,
        status,
        provider_status,
    })
}

fn extract_session_id(scope: &JsonValue) -> Option<Uuid> {
    let from_metadata = scope
        .get("metadata")
        .and_then(|m| m.get("index_guid"))
        .and_then(JsonValue::as_str)
        .and_then(|s| Uuid::parse_str(s.trim()).ok());

    from_metadata.or_else(|| {
        scope
            .get("reference_id")
            .and_then(JsonValue::as_str)
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
    })
}

fn extract_status(scope: &JsonValue) -> Option<String> {
    ["status", "payment_status"]
        .iter()
        .find_map(|key| scope.get(*key).and_then(JsonValue::as_str))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_vocabulary_mapping() {
        for word in ["SUCCEEDED", "success", "Paid", "COMPLETED", "settled"] {
            assert_eq!(map_provider_status(word), Some(SessionStatus::Success));
        }
        for word in ["FAILED", "expired", "CANCELED", "cancelled", " EXPIRED "] {
            assert_eq!(map_provider_status(word), Some(SessionStatus::Failed));
        }
        assert_eq!(map_provider_status("processing"), None);
        assert_eq!(map_provider_status(""), None);
    }

    #[test]
    fn normalizes_top_level_metadata_shape() {
        let id = Uuid::new_v4();
        let payload = json!({
            "metadata": { "index_guid": id.to_string() },
            "status": "PAID"
        });

        let webhook = normalize(&payload).unwrap();
        assert_eq!(webhook.session_id, id);
        assert_eq!(webhook.status, SessionStatus::Success);
        assert_eq!(webhook.provider_status, "PAID");
    }

    #[test]
    fn normalizes_nested_data_shape() {
        let id = Uuid::new_v4();
        let payload = json!({
            "event": "payment.succeeded",
            "data": {
                "reference_id": id.to_string(),
                "payment_status": "SETTLED"
            }
        });

        let webhook = normalize(&payload).unwrap();
        assert_eq!(webhook.session_id, id);
        assert_eq!(webhook.status, SessionStatus::Success);
    }

    #[test]
    fn metadata_wins_over_reference_id() {
        let meta_id = Uuid::new_v4();
        let payload = json!({
            "metadata": { "index_guid": meta_id.to_string() },
            "reference_id": Uuid::new_v4().to_string(),
            "status": "EXPIRED"
        });

        let webhook = normalize(&payload).unwrap();
        assert_eq!(webhook.session_id, meta_id);
        assert_eq!(webhook.status, SessionStatus::Failed);
    }

    #[test]
    fn rejects_unparseable_session_id() {
        let payload = json!({ "reference_id": "not-a-guid", "status": "PAID" });
        assert!(matches!(
            normalize(&payload),
            Err(AppError::InvalidWebhookPayload(_))
        ));
    }

    #[test]
    fn rejects_unrecognized_status() {
        let payload = json!({
            "reference_id": Uuid::new_v4().to_string(),
            "status": "processing"
        });
        assert!(matches!(
            normalize(&payload),
            Err(AppError::InvalidWebhookPayload(_))
        ));
    }

    #[test]
    fn rejects_missing_status() {
        let payload = json!({ "reference_id": Uuid::new_v4().to_string() });
        assert!(matches!(
            normalize(&payload),
            Err(AppError::InvalidWebhookPayload(_))
        ));
    }
}
