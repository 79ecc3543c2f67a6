use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse json at {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("type {0} not found")]
    TypeNotFound(String),
    #[error("document {0} not found")]
    DocumentNotFound(String),
    #[error("type {0} has {1} live instance(s) and cannot be deleted")]
    TypeHasLiveInstances(String, usize),
    #[error("upload rejected: {0}")]
    UploadRejected(String),
    #[error("invariant violated: {0}")]
    InvariantViolated(String),
    #[error("duplicate type id {0} already exists")]
    DuplicateTypeId(String),
    #[error("unsupported media type {0}, only application/pdf is accepted")]
    UnsupportedMediaType(String),
}

impl From<RepositoryError> for cae_protocol::CaeError {
    fn from(err: RepositoryError) -> Self {
        use cae_protocol::{CaeError, CaeErrorCode, Severity, Stage};
        match &err {
            RepositoryError::TypeNotFound(_) | RepositoryError::DocumentNotFound(_) => {
                CaeError::new(CaeErrorCode::ProposalInvalid, Stage::ProposalValidation, Severity::Error, err.to_string())
            }
            RepositoryError::DuplicateTypeId(_) => {
                CaeError::new(CaeErrorCode::ProposalRejected, Stage::ProposalValidation, Severity::Error, err.to_string())
            }
            RepositoryError::UnsupportedMediaType(_) => {
                CaeError::new(CaeErrorCode::ProposalInvalid, Stage::ProposalValidation, Severity::Error, err.to_string())
            }
            RepositoryError::TypeHasLiveInstances(_, _)
            | RepositoryError::UploadRejected(_)
            | RepositoryError::InvariantViolated(_) => {
                CaeError::new(CaeErrorCode::PreconditionFailed, Stage::Precondition, Severity::Error, err.to_string())
            }
            RepositoryError::Io { .. } | RepositoryError::Json { .. } => {
                CaeError::new(CaeErrorCode::PreconditionFailed, Stage::Precondition, Severity::Critical, err.to_string())
            }
        }
    }
}
