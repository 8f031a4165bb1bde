//! Errors surfaced by the query front end and their gRPC mapping.

use thiserror::Error;
use tonic::Status;

use crate::backend::QueryError;

/// Result type for front-end operations.
pub type Result<T> = std::result::Result<T, FrontEndError>;

/// Failures reported to Flight clients.
#[derive(Debug, Error)]
pub enum FrontEndError {
    /// Planning descriptor is neither a command nor a path.
    #[error("Unsupported descriptor type")]
    UnsupportedDescriptor,

    /// The engine rejected or failed the statement.
    #[error("Query execution failed: {0}")]
    QueryExecutionFailed(String),

    /// A schema could not be IPC-encoded for the response.
    #[error("Schema encoding failed: {0}")]
    Encoding(String),
}

impl From<QueryError> for FrontEndError {
    fn from(err: QueryError) -> Self {
        Self::QueryExecutionFailed(err.to_string())
    }
}

impl From<FrontEndError> for Status {
    fn from(err: FrontEndError) -> Self {
        match err {
            FrontEndError::UnsupportedDescriptor => Status::unavailable(err.to_string()),
            FrontEndError::QueryExecutionFailed(_) | FrontEndError::Encoding(_) => {
                Status::internal(err.to_string())
            }
        }
    }
}
