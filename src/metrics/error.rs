use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetricsError {
    #[error("Failed to create instrument {name:?}: {reason}")]
    InstrumentCreation { name: String, reason: String },
}

pub type MetricsResult<T> = Result<T, MetricsError>;
