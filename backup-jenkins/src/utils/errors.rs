//! Error types for the archive lifecycle.

use crate::store::ObjectKind;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Backup directory already exists! ({})", .0.display())]
    StagingConflict(PathBuf),

    #[error("File '{}' does not exist", .0.display())]
    SourceMissing(PathBuf),

    #[error("Error creating tarball: {} was not produced", .0.display())]
    CompressionFailure(PathBuf),

    #[error("Couldn't create bucket: {0}")]
    BucketProvisioningFailure(String),

    #[error("Upload of {key} was not confirmed as an object (store reported {kind:?})")]
    UploadError { key: String, kind: ObjectKind },

    #[error("Malformed archive key: {0}")]
    MalformedKey(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Object store error: {0}")]
    Store(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// Raised at a cancellation checkpoint; `ArchiveBuilder::run` turns it into cleanup.
    #[error("Backup interrupted")]
    Cancelled,
}

impl From<tokio::task::JoinError> for BackupError {
    fn from(err: tokio::task::JoinError) -> Self {
        BackupError::Io(std::io::Error::other(err))
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;
