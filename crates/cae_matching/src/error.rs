use thiserror::Error;

/// Errors from the Learning Hint Store's file I/O. The `evaluate`
/// matching function itself never returns an error — it is a pure
/// function of its inputs (§4.2 closing line) and always produces a
/// `MatchingDebugReport`.
#[derive(Debug, Error)]
pub enum MatchingError {
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
}

impl From<MatchingError> for cae_protocol::CaeError {
    fn from(err: MatchingError) -> Self {
        use cae_protocol::{CaeError, CaeErrorCode, Severity, Stage};
        CaeError::new(CaeErrorCode::PreconditionFailed, Stage::Precondition, Severity::Critical, err.to_string())
    }
}
