use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Server responded {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Upload of {file_name} failed, batch aborted: {source}")]
    BatchAborted {
        file_name: String,
        #[source]
        source: Box<UploadError>,
    },

    #[error("None of the {failed} selected files could be uploaded")]
    NothingUploaded { failed: usize },

    #[error("No channel to upload into")]
    MissingChannel,
}

pub type UploadResult<T> = Result<T, UploadError>;

impl UploadError {
    /// Whether a failed upload can be sent again without risking a second
    /// video on the channel: the connection was never made, or the server
    /// explicitly refused to handle the request for now.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_connect(),
            Self::Status { status, .. } => {
                *status == StatusCode::SERVICE_UNAVAILABLE
                    || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}
