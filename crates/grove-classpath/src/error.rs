use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClasspathError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error(transparent)]
    Cache(#[from] grove_cache::CacheError),
    #[error("failed to resolve classpath for {project}: {message}")]
    Resolve { project: PathBuf, message: String },
}

impl From<serde_json::Error> for ClasspathError {
    fn from(err: serde_json::Error) -> Self {
        ClasspathError::Cache(err.into())
    }
}
