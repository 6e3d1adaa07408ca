use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("audit log creation failed")]
    LogCreationError,

    #[error("audit entry validation failed")]
    ValidationError,

    #[error("synchronous audit commit failed: {0}")]
    SyncCommitFailed(String),

    #[error("Merkle tree integrity check failed")]
    IntegrityCheckError,

    #[error("internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AuditError>;
