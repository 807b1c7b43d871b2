use crate::metrics::MetricsError;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Connection hijacking not supported by the wrapped response writer")]
    HijackUnsupported,

    #[error("Metric recording failed after {transferred} bytes: {source}")]
    Instrument {
        transferred: usize,
        source: MetricsError,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl StreamError {
    /// Bytes moved by the call that failed with a metric error, if `err`
    /// carries one
    pub fn transferred(err: &io::Error) -> Option<usize> {
        match err.get_ref()?.downcast_ref::<StreamError>()? {
            StreamError::Instrument { transferred, .. } => Some(*transferred),
            _ => None,
        }
    }
}

impl From<StreamError> for io::Error {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::Io(err) => err,
            other => io::Error::new(io::ErrorKind::Other, other),
        }
    }
}

pub type StreamResult<T> = Result<T, StreamError>;
