//! Crate-wide error types.

use thiserror::Error;

pub type HotpathResult<T> = Result<T, HotpathError>;

#[derive(Debug, Error)]
pub enum HotpathError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("time format error: {0}")]
    Time(#[from] time::error::Format),

    #[error("render error: {0}")]
    Render(String),

    #[error("report error: {0}")]
    Report(String),
}

impl From<std::fmt::Error> for HotpathError {
    fn from(value: std::fmt::Error) -> Self {
        Self::Report(value.to_string())
    }
}
