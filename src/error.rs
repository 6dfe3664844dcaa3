use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed request shape, invalid SURL or incompatible flag combination.
    /// Rejected synchronously, nothing persisted.
    #[error("Invalid submission: {0}")]
    Validation(String),

    /// Hard ban on a storage or user. Rejected, nothing persisted.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Conflicting operator action, e.g. an admin banning their own DN.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The statistics repository or the persistence store failed a query.
    #[error("Dependency unavailable: {0}")]
    Dependency(String),

    /// A multi-row cascade failed; the whole cascade was rolled back.
    #[error("Transaction rolled back: {0}")]
    Transaction(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Error::Forbidden(msg.into())
    }

    pub fn dependency(msg: impl Into<String>) -> Self {
        Error::Dependency(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
