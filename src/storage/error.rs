use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Error uploading data to object storage: {0}")]
    UploadFailure(#[source] io::Error),

    #[error("Error downloading data from object storage: {0}")]
    DownloadFailure(#[source] io::Error),
}

impl StorageError {
    /// Underlying I/O error
    pub fn io_error(&self) -> &io::Error {
        match self {
            StorageError::UploadFailure(err) | StorageError::DownloadFailure(err) => err,
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
