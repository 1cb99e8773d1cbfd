use audiofast_client::ClientError;
use audiofast_core::document::validate::ValidationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("store error: {0}")]
    Client(#[from] ClientError),

    #[error("download failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("record failed validation: {0}")]
    Validation(#[from] ValidationError),

    #[error("missing required input: {0}")]
    MissingInput(String),

    #[error("writes are disabled: {0}")]
    WritesDisabled(String),
}
