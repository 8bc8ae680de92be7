// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Unsupported HTTP method: {0}")]
    InvalidMethod(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Malformed queue snapshot: {0}")]
    MalformedSnapshot(String),

    #[error("Unsupported queue snapshot version: {0}")]
    UnsupportedSnapshotVersion(u32),

    #[error("Malformed change event: {0}")]
    MalformedChangeEvent(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
