use axum::http::StatusCode;
use thiserror::Error;

/// Errors raised while fetching, caching or serving price history.
#[derive(Debug, Error)]
pub enum PriceError {
    /// Upstream API unreachable, non-2xx, or returned an unparseable body
    #[error("Remote fetch error: {0}")]
    RemoteFetch(String),

    /// Missing credential or bad setting; retrying will not help
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed request parameter
    #[error("Invalid input: {0}")]
    ClientInput(String),

    /// Year the calendar cannot represent
    #[error("Invalid year: {0}")]
    InvalidYear(i32),

    #[error("Cache error: {0}")]
    Cache(String),
}

impl PriceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PriceError::RemoteFetch(_) => StatusCode::BAD_GATEWAY,
            PriceError::ClientInput(_) | PriceError::InvalidYear(_) => StatusCode::BAD_REQUEST,
            PriceError::Configuration(_) | PriceError::Cache(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<reqwest::Error> for PriceError {
    fn from(err: reqwest::Error) -> Self {
        PriceError::RemoteFetch(err.to_string())
    }
}

impl From<sqlx::Error> for PriceError {
    fn from(err: sqlx::Error) -> Self {
        PriceError::Cache(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PriceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(
            PriceError::RemoteFetch("timeout".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            PriceError::ClientInput("year".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(PriceError::InvalidYear(999_999).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            PriceError::Configuration("no key".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
