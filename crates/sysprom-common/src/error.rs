use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyspromError {
    #[error("host probe failed: {0}")]
    Probe(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("internal error: {0}")]
    InternalError(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SyspromError {
    /// Failures that only cost a single metric family for one scrape.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Probe(_) | Self::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, SyspromError>;
