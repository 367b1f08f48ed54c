use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Admin step is required")]
    MissingAdmin,

    #[error("Invalid admin step: {0}")]
    InvalidAdmin(&'static str),

    #[error("API base URL is not set")]
    Unconfigured,

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Save failed: {status} {body}")]
    Rejected { status: u16, body: String },

    #[error("Local storage failed: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Local storage encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}
