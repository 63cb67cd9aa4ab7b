use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::application::{parse_account_id, AppError};
use crate::storage::LedgerStore;

use super::types::{AccountResponse, BalanceSeriesResponse, TransactionResponse};
use super::AppState;

/// Extract the month count from a balance endpoint name.
///
/// Accepts `GetLast{N}MonthBalances` and `Last{N}MonthBalances`. A count too
/// large for `i64` saturates so that it is rejected as out of range later.
pub fn parse_month_balances_endpoint(segment: &str) -> Option<i64> {
    let rest = segment.strip_prefix("Get").unwrap_or(segment);
    let digits = rest.strip_prefix("Last")?.strip_suffix("MonthBalances")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(digits.parse().unwrap_or(i64::MAX))
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// `GET /api/Transaction/GetLast{N}MonthBalances/{accountId}`
pub async fn month_balances<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Path((endpoint, account_id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let Some(months) = parse_month_balances_endpoint(&endpoint) else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };
    let account_id = parse_account_id(&account_id)?;

    let series = state.service.get_balance_series(account_id, months).await?;
    Ok(Json(BalanceSeriesResponse::from(series)).into_response())
}

/// `GET /api/Account/{accountId}`
pub async fn get_account<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Path(account_id): Path<String>,
) -> Result<Json<AccountResponse>, AppError> {
    let account_id = parse_account_id(&account_id)?;
    let account = state.service.get_account(account_id).await?;
    Ok(Json(account.into()))
}

/// `GET /api/Account/{accountId}/transactions`
pub async fn list_transactions<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Path(account_id): Path<String>,
) -> Result<Json<Vec<TransactionResponse>>, AppError> {
    let account_id = parse_account_id(&account_id)?;
    let transactions = state.service.list_transactions(account_id).await?;
    Ok(Json(transactions.into_iter().map(Into::into).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_month_balances_endpoint() {
        assert_eq!(parse_month_balances_endpoint("GetLast12MonthBalances"), Some(12));
        assert_eq!(parse_month_balances_endpoint("GetLast3MonthBalances"), Some(3));
        assert_eq!(parse_month_balances_endpoint("Last12MonthBalances"), Some(12));
        assert_eq!(parse_month_balances_endpoint("GetLast0MonthBalances"), Some(0));
        assert_eq!(
            parse_month_balances_endpoint("GetLast99999999999999999999MonthBalances"),
            Some(i64::MAX)
        );
    }

    #[test]
    fn test_parse_month_balances_endpoint_rejects_other_names() {
        for segment in [
            "GetLastMonthBalances",
            "GetLast-3MonthBalances",
            "GetLast3YearBalances",
            "GetGetLast3MonthBalances",
            "getlast3monthbalances",
            "Balances",
        ] {
            assert_eq!(parse_month_balances_endpoint(segment), None, "{}", segment);
        }
    }
}
