use thiserror::Error;

pub type Result<T> = std::result::Result<T, ResendError>;

#[derive(Debug, Error)]
pub enum ResendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Resend API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid email: {0}")]
    InvalidEmail(String),
}

impl ResendError {
    /// Whether retrying the same send later can succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ResendError::Http(_) => true,
            ResendError::Api { status, .. } => *status == 429 || *status >= 500,
            ResendError::InvalidEmail(_) => false,
        }
    }
}
