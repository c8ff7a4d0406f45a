use shared::{domain::PackageId, error::ServiceError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("progress reporter failed: {0}")]
    Progress(anyhow::Error),
    /// A change notification named a package the store does not hold.
    #[error("package '{0}' is not installed")]
    UnknownPackage(PackageId),
    #[error("package export failed: {0}")]
    Export(anyhow::Error),
    #[error("controller worker stopped")]
    WorkerStopped,
}

impl ControllerError {
    /// Connection loss during a load ends the load quietly instead of failing it.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Service(err) if err.is_connection_closed())
    }
}
