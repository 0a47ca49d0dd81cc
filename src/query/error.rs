//! Error types for query execution.

use thiserror::Error;

/// Errors a single query can raise.
///
/// `MissingParameter` and `ColumnNotFound` are request-scoped and map straight
/// to a client status. `Fetch` wraps whatever the upstream source reported; its
/// detail is for operators only.
#[derive(Debug, Error)]
pub enum QueryError {
    /// A required parameter was absent or blank after trimming.
    #[error("{0} parameter is required.")]
    MissingParameter(String),

    /// A required column is not in the header (after trimming).
    #[error("{0} column not found.")]
    ColumnNotFound(String),

    /// The upstream range could not be retrieved.
    #[error("failed to fetch sheet data")]
    Fetch(anyhow::Error),
}

impl QueryError {
    pub fn missing_parameter(name: impl Into<String>) -> Self {
        Self::MissingParameter(name.into())
    }

    pub fn column_not_found(name: impl Into<String>) -> Self {
        Self::ColumnNotFound(name.into())
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MissingParameter(_) => 400,
            Self::ColumnNotFound(_) => 404,
            Self::Fetch(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;
