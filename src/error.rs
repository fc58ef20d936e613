use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid search request: {0}")]
    InvalidRequest(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Query service returned {status}: {message}")]
    ApiError { status: u16, message: String },
}

// Helper functions for creating specific errors
impl SearchError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        SearchError::ConfigError(msg.into())
    }

    pub fn invalid_request<S: Into<String>>(msg: S) -> Self {
        SearchError::InvalidRequest(msg.into())
    }

    pub fn api(status: u16, message: impl Into<String>) -> Self {
        SearchError::ApiError {
            status,
            message: message.into(),
        }
    }

    /// True when the failure came from the transport or the query service
    /// rather than from local input handling.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            SearchError::HttpError(_) | SearchError::ApiError { .. }
        )
    }
}
