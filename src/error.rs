//! Error types for the scheme finder

use std::time::Duration;
use thiserror::Error;

/// Result type alias for scheme finder operations
pub type Result<T> = std::result::Result<T, SchemeError>;

#[derive(Error, Debug)]
pub enum SchemeError {

    // =============================
    // Core Pipeline Errors
    // =============================

    #[error("Missing required profile fields: {}", missing.join(", "))]
    Validation { missing: Vec<String> },

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("{what} timed out after {}s", after.as_secs())]
    Timeout { what: &'static str, after: Duration },

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Import error: {0}")]
    Import(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl SchemeError {
    pub fn validation<I, S>(missing: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SchemeError::Validation {
            missing: missing.into_iter().map(Into::into).collect(),
        }
    }

    /// True for failures of a remote collaborator (network, provider, timeout)
    pub fn is_external(&self) -> bool {
        matches!(
            self,
            SchemeError::ExternalService(_)
                | SchemeError::Timeout { .. }
                | SchemeError::Llm(_)
                | SchemeError::Http(_)
        )
    }
}

impl From<sqlx::Error> for SchemeError {
    fn from(e: sqlx::Error) -> Self {
        SchemeError::Database(e.to_string())
    }
}

/// Bound an external call by `limit`; elapsed deadline becomes `SchemeError::Timeout`.
pub async fn within<T, F>(what: &'static str, limit: Duration, fut: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(SchemeError::Timeout { what, after: limit }),
    }
}
