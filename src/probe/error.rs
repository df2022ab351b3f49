use std::time::Duration;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ProbeError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Failed to parse response: {0}")]
    JsonParseFailed(#[from] serde_json::Error),

    #[error("Registration site returned status {status}.")]
    BadStatus { status: u16 },

    #[error("No section found for code {code}.")]
    NotFound { code: String },

    #[error("Invalid code `{code}`.")]
    InvalidCode { code: String },

    #[error("Invalid data from registration site: missing field `{field}`.")]
    MissingField { field: String },

    #[error("Probe for {code} timed out after {timeout:?}.")]
    Timeout { code: String, timeout: Duration },
}

impl From<wreq::Error> for ProbeError {
    fn from(e: wreq::Error) -> Self {
        ProbeError::RequestFailed(Box::new(e))
    }
}
