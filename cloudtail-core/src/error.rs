use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Config Error - {0}")]
    Config(String),

    #[error("Query Error - {0}")]
    Query(String),

    #[error("Checkpoint Error - {0}")]
    Checkpoint(String),

    #[error("Processor Error - {0}")]
    Processor(String),

    /// Caller-initiated shutdown interrupted the operation. Expected during
    /// drain, logged at a lower severity and never counted as an API error.
    #[error("operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Error::Other(value)
    }
}
