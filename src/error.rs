use crate::policy::Capability;
use crate::types::ActorId;

pub type Result<T> = std::result::Result<T, WorkflowError>;

#[derive(thiserror::Error, Debug)]
pub enum WorkflowError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Actor {actor} lacks the '{capability}' capability")]
    PermissionDenied {
        actor: ActorId,
        capability: Capability,
    },
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Validation conflict: {0}")]
    ValidationConflict(String),
    #[error("Storage error: {0}")]
    Storage(#[from] sled::Error),
    #[error("Failed to encode record: {0}")]
    Encode(String),
    #[error("Failed to decode record: {0}")]
    Decode(#[from] minicbor::decode::Error),
    #[error("Blob store error: {0}")]
    BlobStore(String),
    #[error("Config error: {0}")]
    Config(String),
}

impl WorkflowError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, WorkflowError::NotFound(_))
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, WorkflowError::PermissionDenied { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, WorkflowError::ValidationConflict(_))
    }
}

impl<E: std::fmt::Display> From<minicbor::encode::Error<E>> for WorkflowError {
    fn from(value: minicbor::encode::Error<E>) -> Self {
        WorkflowError::Encode(value.to_string())
    }
}
