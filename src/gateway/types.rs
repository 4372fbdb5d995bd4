//! Xendit invoice API request/response shapes

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Outbound invoice-creation request.
///
/// Amounts are whole currency units; the orchestrator rounds before
/// constructing this.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceRequest {
    pub external_id: String,
    pub amount: i64,
    pub currency: String,
    pub description: String,
    pub success_redirect_url: String,
    pub failure_redirect_url: String,
    /// The single channel the customer is allowed to pay with.
    pub payment_methods: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statement_descriptor: Option<String>,
    pub metadata: InvoiceMetadata,
    pub items: Vec<InvoiceItem>,
}

/// Carried back verbatim in webhooks; `index_guid` is how a webhook is
/// correlated to its checkout session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceMetadata {
    pub index_guid: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceItem {
    pub name: String,
    pub quantity: u32,
    pub price: i64,
}

/// Find the hosted-checkout URL in an invoice response.
///
/// The field has moved across API versions, so the lookup is a fallback
/// chain over every location seen in the wild.
pub fn extract_redirect_url(response: &JsonValue) -> Option<String> {
    // An empty string counts as absent, so the chain keeps falling through.
    let non_empty = |scope: &JsonValue, key: &str| {
        scope
            .get(key)
            .and_then(JsonValue::as_str)
            .filter(|url| !url.trim().is_empty())
            .map(str::to_string)
    };

    let top_level = ["invoice_url", "payment_url"]
        .iter()
        .find_map(|key| non_empty(response, key));

    top_level.or_else(|| {
        let actions = response.get("actions")?;
        ["desktop_web_checkout_url", "mobile_web_checkout_url"]
            .iter()
            .find_map(|key| non_empty(actions, key))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prefers_top_level_invoice_url() {
        let response = json!({
            "invoice_url": "https://checkout.example/a",
            "payment_url": "https://checkout.example/b",
            "actions": { "desktop_web_checkout_url": "https://checkout.example/c" }
        });
        assert_eq!(
            extract_redirect_url(&response).as_deref(),
            Some("https://checkout.example/a")
        );
    }

    #[test]
    fn falls_back_through_the_chain() {
        let response = json!({ "payment_url": "https://checkout.example/b" });
        assert_eq!(
            extract_redirect_url(&response).as_deref(),
            Some("https://checkout.example/b")
        );

        let response = json!({
            "actions": { "mobile_web_checkout_url": "https://checkout.example/m" }
        });
        assert_eq!(
            extract_redirect_url(&response).as_deref(),
            Some("https://checkout.example/m")
        );
    }

    #[test]
    fn empty_fields_fall_through_the_chain() {
        let response = json!({
            "invoice_url": "",
            "payment_url": "https://checkout.example/b"
        });
        assert_eq!(
            extract_redirect_url(&response).as_deref(),
            Some("https://checkout.example/b")
        );

        let response = json!({
            "invoice_url": "",
            "payment_url": "  ",
            "actions": { "desktop_web_checkout_url": "https://checkout.example/c" }
        });
        assert_eq!(
            extract_redirect_url(&response).as_deref(),
            Some("https://checkout.example/c")
        );
    }

    #[test]
    fn missing_url_yields_none() {
        assert_eq!(extract_redirect_url(&json!({"id": "inv_1"})), None);
        assert_eq!(extract_redirect_url(&json!({"invoice_url": "  "})), None);
        assert_eq!(extract_redirect_url(&json!({"actions": {}})), None);
    }

    #[test]
    fn invoice_request_serializes_single_method() {
        let request = InvoiceRequest {
            external_id: "INV-042".to_string(),
            amount: 500,
            currency: "THB".to_string(),
            description: "Meeting Room A".to_string(),
            success_redirect_url: "https://kasirka.example/payment/success/x".to_string(),
            failure_redirect_url: "https://kasirka.example/payment/failed/x".to_string(),
            payment_methods: vec!["THAI_QR".to_string()],
            statement_descriptor: None,
            metadata: InvoiceMetadata {
                index_guid: Uuid::nil(),
            },
            items: vec![InvoiceItem {
                name: "Meeting Room A".to_string(),
                quantity: 1,
                price: 500,
            }],
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["amount"], 500);
        assert_eq!(value["payment_methods"], json!(["THAI_QR"]));
        assert!(value.get("statement_descriptor").is_none());
    }
}
