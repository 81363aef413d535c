use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Invalid storage event: {0}")]
    InvalidEvent(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("BigQuery API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Load job {job_id} failed ({reason}): {message}")]
    JobFailed {
        job_id: String,
        reason: String,
        message: String,
        errors: Vec<String>,
    },

    #[error("Invalid BigQuery response: {0}")]
    InvalidResponse(String),
}

impl LoaderError {
    /// True for failures raised while submitting or waiting on a load job.
    pub fn is_load_failure(&self) -> bool {
        matches!(
            self,
            LoaderError::Auth(_)
                | LoaderError::Transport(_)
                | LoaderError::Api { .. }
                | LoaderError::JobFailed { .. }
                | LoaderError::InvalidResponse(_)
        )
    }
}
