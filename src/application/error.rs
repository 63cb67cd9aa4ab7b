use thiserror::Error;

use crate::domain::SeriesError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Account already exists: {0}")]
    AccountAlreadyExists(String),

    #[error("Account is closed: {0}")]
    AccountClosed(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Store unavailable: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl AppError {
    /// Stable name of the error kind, as exposed to API clients.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::AccountNotFound(_) => "not_found",
            AppError::AccountAlreadyExists(_) => "already_exists",
            AppError::AccountClosed(_) => "account_closed",
            AppError::InvalidArgument(_) => "invalid_argument",
            AppError::Store(_) => "transient_store_failure",
        }
    }
}

impl From<SeriesError> for AppError {
    fn from(err: SeriesError) -> Self {
        AppError::InvalidArgument(err.to_string())
    }
}
