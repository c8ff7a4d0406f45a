use thiserror::Error;

/// Failure reported by the package service collaborator.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The connection to the package service went away mid-operation.
    #[error("package service connection closed")]
    ConnectionClosed,
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, Self::ConnectionClosed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("invalid package version '{0}'")]
    Invalid(String),
}
