//! Admin report search over checkout sessions.

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::database::session_repository::{CheckoutSession, SessionFilter, SessionStatus};
use crate::error::AppError;

use super::AppState;

const DEFAULT_PAGE_SIZE: i64 = 25;
const PAGE_SIZE_CHOICES: [i64; 5] = [0, 10, 25, 50, 100];

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub reference: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ReportPage {
    pub rows: Vec<CheckoutSession>,
    pub total_count: i64,
    pub page: i64,
    pub page_size: i64,
}

/// Clamp a requested page size to the supported choices. Zero means all
/// rows; anything unrecognized falls back to the default.
fn normalize_page_size(requested: Option<i64>) -> i64 {
    match requested {
        Some(size) if PAGE_SIZE_CHOICES.contains(&size) => size,
        Some(size) => {
            warn!(page_size = size, "unsupported page size, using default");
            DEFAULT_PAGE_SIZE
        }
        None => DEFAULT_PAGE_SIZE,
    }
}

pub async fn list_reports(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<ReportPage>, AppError> {
    let status = match query.status.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(raw) => match SessionStatus::parse(raw) {
            Some(status) => Some(status),
            None => {
                return Err(AppError::MalformedPayload(format!(
                    "unknown status filter: {}",
                    raw
                )))
            }
        },
        None => None,
    };

    let filter = SessionFilter {
        from: query.from,
        to: query.to,
        status,
        reference: query
            .reference
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty()),
    };

    let page = query.page.unwrap_or(1).max(1);
    let page_size = normalize_page_size(query.page_size);

    let (rows, total_count) = state.sessions.search(&filter, page, page_size).await?;

    Ok(Json(ReportPage {
        rows,
        total_count,
        page,
        page_size,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_accepts_supported_choices() {
        assert_eq!(normalize_page_size(Some(10)), 10);
        assert_eq!(normalize_page_size(Some(100)), 100);
        assert_eq!(normalize_page_size(Some(0)), 0);
    }

    #[test]
    fn page_size_falls_back_to_default() {
        assert_eq!(normalize_page_size(None), 25);
        assert_eq!(normalize_page_size(Some(7)), 25);
        assert_eq!(normalize_page_size(Some(-1)), 25);
    }
}
