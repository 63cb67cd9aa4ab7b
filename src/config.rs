use std::net::SocketAddr;

use crate::domain::AccountId;

/// Account the balance chart shows when none is given.
pub const DEFAULT_CHART_ACCOUNT: &str = "37846734-172e-4149-8cec-6f43d1eb3f60";

/// Months of history the balance chart requests by default.
pub const DEFAULT_CHART_MONTHS: u32 = 12;

pub const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:4200";

/// Startup configuration of the HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Origins allowed by the CORS policy
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 5070)),
            allowed_origins: vec![DEFAULT_ALLOWED_ORIGIN.to_string()],
        }
    }
}

/// Configuration of the balance chart client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the API, e.g. `http://localhost:5070/api/`
    pub api_url: String,
    pub account_id: AccountId,
    pub months: u32,
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            account_id: AccountId::parse_str(DEFAULT_CHART_ACCOUNT).unwrap_or_default(),
            months: DEFAULT_CHART_MONTHS,
        }
    }

    pub fn with_account(mut self, account_id: AccountId) -> Self {
        self.account_id = account_id;
        self
    }

    pub fn with_months(mut self, months: u32) -> Self {
        self.months = months;
        self
    }
}
