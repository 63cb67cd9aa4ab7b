//! HTTP client for the balance API and the chart component built on it.
//!
//! The client issues plain requests with the transport defaults: no retry,
//! no custom timeout, no cancellation.

mod chart;

use reqwest::{Client, Url};
use thiserror::Error;
use tracing::debug;

use crate::api::types::BalanceSeriesResponse;
use crate::domain::AccountId;

pub use chart::*;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid API base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Client for the bank's HTTP API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a client for the API rooted at `api_url` (e.g. `http://localhost:5070/api/`).
    pub fn new(api_url: &str) -> Result<Self, ClientError> {
        let mut base_url = Url::parse(api_url)
            .map_err(|e| ClientError::InvalidBaseUrl(format!("{}: {}", api_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidBaseUrl(api_url.to_string()));
        }
        // Url::join replaces the last segment unless the path ends with a slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            http: Client::new(),
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn balances_url(&self, account_id: AccountId, months: u32) -> Result<Url, ClientError> {
        let path = format!("Transaction/GetLast{}MonthBalances/{}", months, account_id);
        self.base_url
            .join(&path)
            .map_err(|e| ClientError::InvalidBaseUrl(format!("{}: {}", self.base_url, e)))
    }

    /// Fetch the trailing monthly balance series of an account.
    pub async fn get_month_balances(
        &self,
        account_id: AccountId,
        months: u32,
    ) -> Result<BalanceSeriesResponse, ClientError> {
        let url = self.balances_url(account_id, months)?;
        debug!(%url, "requesting balance series");

        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balances_url_keeps_base_path() {
        let account = AccountId::parse_str("37846734-172e-4149-8cec-6f43d1eb3f60").unwrap();

        for base in ["http://localhost:5070/api/", "http://localhost:5070/api"] {
            let client = ApiClient::new(base).unwrap();
            assert_eq!(
                client.balances_url(account, 12).unwrap().as_str(),
                "http://localhost:5070/api/Transaction/GetLast12MonthBalances/37846734-172e-4149-8cec-6f43d1eb3f60"
            );
        }
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            ApiClient::new("not a url"),
            Err(ClientError::InvalidBaseUrl(_))
        ));
        assert!(matches!(
            ApiClient::new("mailto:bank@example.com"),
            Err(ClientError::InvalidBaseUrl(_))
        ));
    }
}
