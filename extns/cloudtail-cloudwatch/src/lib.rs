//! CloudWatch Logs implementation of the cloudtail query-client contract.
//!
//! This crate wraps the `FilterLogEvents` API behind
//! [cloudtail_core::QueryClient]:
//! - Error propagation and handling for AWS SDK errors
//! - Stream selection with the remote API's list-over-prefix precedence
//! - Cooperative cancellation so shutdown never hangs on an in-flight call

pub mod client;
pub mod query;

pub use client::create_cloudwatch_client;
pub use query::{CloudwatchQueryClient, CloudwatchQueryConfig};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Failed with CloudWatch Logs error - {0}")]
    CloudWatch(#[from] aws_sdk_cloudwatchlogs::Error),

    /// The request was interrupted by caller-initiated shutdown.
    #[error("request cancelled")]
    Cancelled,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = core::result::Result<T, Error>;

impl From<String> for Error {
    fn from(value: String) -> Self {
        Error::Other(value)
    }
}

impl From<Error> for cloudtail_core::Error {
    fn from(value: Error) -> Self {
        match value {
            Error::Cancelled => cloudtail_core::Error::Cancelled,
            Error::InvalidConfig(e) => cloudtail_core::Error::Config(e),
            e => cloudtail_core::Error::Query(e.to_string()),
        }
    }
}
