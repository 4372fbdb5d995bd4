//! Payment channel catalog
//!
//! Reference data seeded at provisioning time and read-only afterwards.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use tracing::info;

use crate::database::error::DatabaseError;

/// A payment method / provider combination with eligibility constraints.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PaymentChannel {
    pub id: i64,
    pub code: String,
    pub display_name: String,
    pub country: String,
    pub currency: String,
    pub min_amount: Decimal,
    pub max_amount: Option<Decimal>,
    pub is_refundable: bool,
    pub supports_save: bool,
    pub supports_reusable_code: bool,
    pub supports_mit: bool,
    pub channel_type: String,
}

struct ChannelSeed {
    code: &'static str,
    display_name: &'static str,
    country: &'static str,
    currency: &'static str,
    min_amount: &'static str,
    max_amount: Option<&'static str>,
    is_refundable: bool,
    supports_save: bool,
    supports_reusable_code: bool,
    supports_mit: bool,
    channel_type: &'static str,
}

/// The Xendit Thailand catalog.
const SEED_CATALOG: &[ChannelSeed] = &[
    ChannelSeed {
        code: "CARDS",
        display_name: "Credit / Debit Card",
        country: "TH",
        currency: "THB",
        min_amount: "20.00",
        max_amount: None,
        is_refundable: true,
        supports_save: true,
        supports_reusable_code: false,
        supports_mit: true,
        channel_type: "CARD",
    },
    ChannelSeed {
        code: "CARD_INSTALLMENT_KBANK",
        display_name: "KBank Installment",
        country: "TH",
        currency: "THB",
        min_amount: "3000.00",
        max_amount: None,
        is_refundable: true,
        supports_save: false,
        supports_reusable_code: false,
        supports_mit: false,
        channel_type: "CARD_INSTALLMENT",
    },
    ChannelSeed {
        code: "PROMPTPAY",
        display_name: "PromptPay",
        country: "TH",
        currency: "THB",
        min_amount: "1.00",
        max_amount: None,
        is_refundable: false,
        supports_save: false,
        supports_reusable_code: true,
        supports_mit: false,
        channel_type: "QR",
    },
    ChannelSeed {
        code: "THAI_QR",
        display_name: "Thai QR",
        country: "TH",
        currency: "THB",
        min_amount: "1.00",
        max_amount: None,
        is_refundable: false,
        supports_save: false,
        supports_reusable_code: true,
        supports_mit: false,
        channel_type: "QR",
    },
    ChannelSeed {
        code: "TRUEMONEY",
        display_name: "TrueMoney Wallet",
        country: "TH",
        currency: "THB",
        min_amount: "1.00",
        max_amount: Some("150000.00"),
        is_refundable: true,
        supports_save: false,
        supports_reusable_code: false,
        supports_mit: false,
        channel_type: "EWALLET",
    },
    ChannelSeed {
        code: "SHOPEEPAY",
        display_name: "ShopeePay",
        country: "TH",
        currency: "THB",
        min_amount: "1.00",
        max_amount: Some("100000.00"),
        is_refundable: true,
        supports_save: false,
        supports_reusable_code: false,
        supports_mit: false,
        channel_type: "EWALLET",
    },
    ChannelSeed {
        code: "LINEPAY",
        display_name: "Rabbit LINE Pay",
        country: "TH",
        currency: "THB",
        min_amount: "1.00",
        max_amount: Some("49999.00"),
        is_refundable: true,
        supports_save: false,
        supports_reusable_code: false,
        supports_mit: false,
        channel_type: "EWALLET",
    },
];

pub struct PaymentChannelRepository {
    pool: PgPool,
}

impl PaymentChannelRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Channels whose eligibility range covers `amount`, ordered by type
    /// then display name. An empty result is not an error.
    pub async fn eligible_channels(
        &self,
        amount: Decimal,
    ) -> Result<Vec<PaymentChannel>, DatabaseError> {
        sqlx::query_as::<_, PaymentChannel>(
            "SELECT id, code, display_name, country, currency, min_amount, max_amount,
                    is_refundable, supports_save, supports_reusable_code, supports_mit,
                    channel_type
             FROM payment_channels
             WHERE min_amount <= $1 AND (max_amount IS NULL OR max_amount >= $1)
             ORDER BY channel_type ASC, display_name ASC",
        )
        .bind(amount)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Idempotent seed, keyed by (code, country, currency).
    pub async fn seed_catalog(&self) -> Result<(), DatabaseError> {
        for seed in SEED_CATALOG {
            let min = Decimal::from_str(seed.min_amount).map_err(|e| DatabaseError::Query {
                message: format!("bad seed amount for {}: {}", seed.code, e),
            })?;
            let max = match seed.max_amount {
                Some(v) => Some(Decimal::from_str(v).map_err(|e| DatabaseError::Query {
                    message: format!("bad seed amount for {}: {}", seed.code, e),
                })?),
                None => None,
            };

            sqlx::query(
                "INSERT INTO payment_channels
                     (code, display_name, country, currency, min_amount, max_amount,
                      is_refundable, supports_save, supports_reusable_code, supports_mit,
                      channel_type)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                 ON CONFLICT (code, country, currency) DO UPDATE
                 SET display_name = EXCLUDED.display_name,
                     min_amount = EXCLUDED.min_amount,
                     max_amount = EXCLUDED.max_amount,
                     is_refundable = EXCLUDED.is_refundable,
                     supports_save = EXCLUDED.supports_save,
                     supports_reusable_code = EXCLUDED.supports_reusable_code,
                     supports_mit = EXCLUDED.supports_mit,
                     channel_type = EXCLUDED.channel_type",
            )
            .bind(seed.code)
            .bind(seed.display_name)
            .bind(seed.country)
            .bind(seed.currency)
            .bind(min)
            .bind(max)
            .bind(seed.is_refundable)
            .bind(seed.supports_save)
            .bind(seed.supports_reusable_code)
            .bind(seed.supports_mit)
            .bind(seed.channel_type)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;
        }

        info!(channels = SEED_CATALOG.len(), "payment channel catalog seeded");
        Ok(())
    }
}

/// Pure eligibility predicate, shared with submission-time re-validation.
pub fn is_eligible(channel: &PaymentChannel, amount: Decimal) -> bool {
    amount >= channel.min_amount
        && channel
            .max_amount
            .map(|max| amount <= max)
            .unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(min: &str, max: Option<&str>) -> PaymentChannel {
        PaymentChannel {
            id: 1,
            code: "PROMPTPAY".to_string(),
            display_name: "PromptPay".to_string(),
            country: "TH".to_string(),
            currency: "THB".to_string(),
            min_amount: Decimal::from_str(min).unwrap(),
            max_amount: max.map(|v| Decimal::from_str(v).unwrap()),
            is_refundable: false,
            supports_save: false,
            supports_reusable_code: true,
            supports_mit: false,
            channel_type: "QR".to_string(),
        }
    }

    #[test]
    fn eligibility_is_inclusive_at_min() {
        let ch = channel("1.00", None);
        assert!(is_eligible(&ch, Decimal::from_str("1.00").unwrap()));
        assert!(!is_eligible(&ch, Decimal::from_str("0.99").unwrap()));
        assert!(!is_eligible(&ch, Decimal::from_str("0.50").unwrap()));
    }

    #[test]
    fn unbounded_max_accepts_large_amounts() {
        let ch = channel("1.00", None);
        assert!(is_eligible(&ch, Decimal::from_str("9999999.00").unwrap()));
    }

    #[test]
    fn bounded_max_is_inclusive() {
        let ch = channel("1.00", Some("150000.00"));
        assert!(is_eligible(&ch, Decimal::from_str("150000.00").unwrap()));
        assert!(!is_eligible(&ch, Decimal::from_str("150000.01").unwrap()));
    }

    #[test]
    fn seed_catalog_amounts_parse() {
        for seed in SEED_CATALOG {
            assert!(Decimal::from_str(seed.min_amount).is_ok(), "{}", seed.code);
            if let Some(max) = seed.max_amount {
                assert!(Decimal::from_str(max).is_ok(), "{}", seed.code);
            }
        }
    }

    #[test]
    fn seed_catalog_includes_promptpay_floor() {
        let promptpay = SEED_CATALOG
            .iter()
            .find(|s| s.code == "PROMPTPAY")
            .unwrap();
        assert_eq!(promptpay.min_amount, "1.00");
        assert!(promptpay.max_amount.is_none());
    }
}
