use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("failed to encode {path}: {reason}")]
    Encode { path: PathBuf, reason: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn stage(stage: &'static str, source: Error) -> Self {
        Self::Stage {
            stage,
            source: Box::new(source),
        }
    }
}
