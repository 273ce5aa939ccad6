use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Write failed: {0}")]
    Write(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Parse failed: {0}")]
    Parse(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Remote file changed, reload and try again: {0}")]
    Conflict(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Only transient transport failures are worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Network(_))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::Network(format!("request timed out: {}", err))
        } else if err.is_decode() {
            AppError::Parse(format!("unexpected response body: {}", err))
        } else {
            AppError::Network(err.to_string())
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
