use thiserror::Error;

use crate::core::utils::truncate_chars;

/// Maximum number of characters of an error body kept for display.
pub const ERROR_BODY_LIMIT: usize = 100;

/// Failure of a scan job. Timeouts and cancellation are outcomes, not errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// Network fault talking to the scan service
    #[error("scan service unreachable: {0}")]
    Transport(String),

    /// Non-2xx response; body truncated to 100 characters
    #[error("scan service returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("scan service response has no analysis id")]
    MissingAnalysisId,

    #[error("scan service reported unknown analysis status: {0}")]
    UnknownStatus(String),

    #[error("unexpected scan service response: {0}")]
    Decode(String),

    #[error("file scanning is not configured")]
    NotConfigured,

    #[error("file is {size} bytes, limit is {limit}")]
    FileTooLarge { size: u64, limit: u64 },
}

impl ScanError {
    pub fn http_status(status: u16, body: &str) -> Self {
        ScanError::HttpStatus {
            status,
            body: truncate_chars(body, ERROR_BODY_LIMIT),
        }
    }
}

impl From<reqwest::Error> for ScanError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ScanError::Decode(err.to_string())
        } else {
            ScanError::Transport(err.to_string())
        }
    }
}
