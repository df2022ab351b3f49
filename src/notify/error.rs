#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Failed to parse API response: {0}")]
    JsonParseFailed(#[from] serde_json::Error),

    #[error("Messaging API error: {message}")]
    ApiError { message: String },

    #[error("Invalid recipient `{external_id}`.")]
    InvalidRecipient { external_id: String },
}

impl From<wreq::Error> for NotifyError {
    fn from(e: wreq::Error) -> Self {
        NotifyError::RequestFailed(Box::new(e))
    }
}
