//! Error types for the status aggregation service.
//!
//! This module defines the central `Error` enum, which captures every
//! reportable failure of a service call. It implements `From<Error>` for
//! `tonic::Status` so handlers can propagate errors with `?` and clients see
//! an appropriate gRPC status code.
//!
//! ## Error Cases
//! - `Aggregation`: A fan-out aggregation could not deliver a complete result.
//! - `InvalidRequest`: The request was malformed or exceeded bounds.
//! - `ServiceShutdown`: A request arrived while the service was shutting down.

use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the status aggregation service.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The aggregation itself reported an error.
    #[error("Aggregation error: {0}")]
    Aggregation(#[from] fanout::Error),

    /// The client request was invalid or exceeded constraints.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,
}

impl Error {
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::Aggregation(e @ fanout::Error::PartialAggregation { .. }) => {
                Status::deadline_exceeded(e.to_string())
            }
            Error::Aggregation(e) => Status::internal(e.to_string()),
            Error::InvalidRequest { reason } => Status::invalid_argument(reason),
            Error::ServiceShutdown => Status::unavailable("Service is shutting down"),
        }
    }
}
