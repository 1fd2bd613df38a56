use thiserror::Error;

/// Error kinds surfaced by the cache and classifier layers.
///
/// A provider query that matches zero schools is not an error; those paths
/// return `Ok(None)` instead.
#[derive(Error, Debug)]
pub enum AdvisorError {
    /// Missing or malformed caller input. Maps to a 400 at the HTTP boundary.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Transport or HTTP failure talking to the Scorecard API. Not retried.
    #[error("provider request failed: {0}")]
    Provider(String),

    /// No candidate school carried a usable GPA statistic.
    #[error("no GPA data available among candidate schools")]
    InsufficientData,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<reqwest::Error> for AdvisorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AdvisorError::Provider(format!("request timed out: {err}"))
        } else {
            AdvisorError::Provider(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, AdvisorError>;
