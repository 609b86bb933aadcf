use thiserror::Error;

pub type Result<T, E = MemeError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum MemeError {
    #[error("network failure: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Upload failed ({0})")]
    UploadFailed(u16),
    #[error("Request failed ({0})")]
    RequestFailed(u16),
    #[error("API request failed ({0})")]
    ApiStatus(u16),
    #[error("Server returned an empty response")]
    EmptyResponse,
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("platform operation failed: {0}")]
    Platform(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("a generation is already in progress")]
    GenerationInProgress,
    #[error("unknown template '{0}'")]
    UnknownTemplate(String),
}

impl MemeError {
    /// Server errors and transport failures are worth another attempt on the
    /// idempotent metadata endpoints.
    pub fn is_retryable(&self) -> bool {
        match self {
            MemeError::ApiStatus(code) => *code >= 500,
            MemeError::Network(_) => true,
            _ => false,
        }
    }
}
