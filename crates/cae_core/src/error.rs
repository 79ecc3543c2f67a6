//! `CoreError`: the single error type every `cae_core` operation
//! returns. Boundary errors from the crates Core orchestrates
//! (`RepositoryError`, `MatchingError`, `PortalError`) convert
//! immediately into the wire `CaeError` envelope at the point they are
//! caught, fixing stage/severity/retryable per the propagation policy
//! (§7); Core's own orchestration failures (missing plan/job/run,
//! gating rejections, id conflicts) get dedicated variants so `cae_api`
//! can pick the right HTTP status without re-parsing a message string.

use cae_ids::{DecisionPackId, JobId, PlanId, PlatformKey, RunId};
use cae_protocol::{CaeError, CaeErrorCode, Severity, Stage};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// A boundary error already folded into the stable error envelope,
    /// carrying the REST status it should surface as.
    #[error("{0}")]
    Domain(CaeError, u16),

    #[error("plan {0} not found")]
    PlanNotFound(PlanId),

    #[error("decision pack {0} not found for plan {1}")]
    DecisionPackNotFound(DecisionPackId, PlanId),

    #[error("job {0} not found")]
    JobNotFound(JobId),

    #[error("run {0} not found")]
    RunNotFound(RunId),

    #[error("no connector registered for platform {0}")]
    ConnectorNotRegistered(PlatformKey),

    #[error("a job is already active for plan {0}")]
    PlanJobConflict(PlanId),

    #[error("decision pack entry for item {0} is invalid: {1}")]
    InvalidDecisionEntry(String, String),

    #[error("apply request rejected: {0}")]
    ApplyGateRejected(String),

    #[error("malformed request: {0}")]
    InvalidRequest(String),

    #[error("core channel closed")]
    ChannelClosed,
}

impl CoreError {
    pub fn to_cae_error(&self) -> CaeError {
        match self {
            CoreError::Domain(e, _) => e.clone(),
            CoreError::PlanNotFound(id) => {
                CaeError::new(CaeErrorCode::PreconditionFailed, Stage::Precondition, Severity::Error, format!("plan {id} not found"))
            }
            CoreError::DecisionPackNotFound(pack_id, plan_id) => CaeError::new(
                CaeErrorCode::PreconditionFailed,
                Stage::Precondition,
                Severity::Error,
                format!("decision pack {pack_id} not found for plan {plan_id}"),
            ),
            CoreError::JobNotFound(id) => {
                CaeError::new(CaeErrorCode::PreconditionFailed, Stage::Precondition, Severity::Error, format!("job {id} not found"))
            }
            CoreError::RunNotFound(id) => {
                CaeError::new(CaeErrorCode::PreconditionFailed, Stage::Precondition, Severity::Error, format!("run {id} not found"))
            }
            CoreError::ConnectorNotRegistered(platform_key) => CaeError::new(
                CaeErrorCode::PreconditionFailed,
                Stage::Precondition,
                Severity::Critical,
                format!("no connector registered for platform {}", platform_key.as_str()),
            ),
            CoreError::PlanJobConflict(plan_id) => {
                CaeError::new(CaeErrorCode::ProposalRejected, Stage::ProposalValidation, Severity::Warning, format!("job already active for plan {plan_id}"))
            }
            CoreError::InvalidDecisionEntry(item_id, reason) => CaeError::new(
                CaeErrorCode::ProposalInvalid,
                Stage::ProposalValidation,
                Severity::Error,
                format!("decision entry for {item_id} invalid: {reason}"),
            ),
            CoreError::ApplyGateRejected(reason) => {
                CaeError::new(CaeErrorCode::PreApplyGateRejected, Stage::Precondition, Severity::Error, reason.clone())
            }
            CoreError::InvalidRequest(reason) => {
                CaeError::new(CaeErrorCode::ProposalInvalid, Stage::ProposalValidation, Severity::Error, reason.clone())
            }
            CoreError::ChannelClosed => {
                CaeError::new(CaeErrorCode::PreconditionFailed, Stage::Precondition, Severity::Critical, "core channel closed")
            }
        }
    }

    /// The REST status this error maps to (§6.1, §7): 404 for missing
    /// ids, 409 for conflicts, 400 for malformed requests, 422 for
    /// everything else recoverable/user-facing. `Domain` carries its
    /// own status, fixed at the point the boundary error was caught.
    pub fn http_status(&self) -> u16 {
        match self {
            CoreError::Domain(_, status) => *status,
            CoreError::PlanNotFound(_) | CoreError::DecisionPackNotFound(..) | CoreError::JobNotFound(_) | CoreError::RunNotFound(_) => 404,
            CoreError::PlanJobConflict(_) => 409,
            CoreError::InvalidRequest(_) | CoreError::InvalidDecisionEntry(..) => 400,
            CoreError::ConnectorNotRegistered(_) | CoreError::ApplyGateRejected(_) | CoreError::ChannelClosed => self.to_cae_error().http_status(),
        }
    }
}

impl From<cae_repository::RepositoryError> for CoreError {
    fn from(err: cae_repository::RepositoryError) -> Self {
        use cae_repository::RepositoryError as E;
        let status = match &err {
            E::TypeNotFound(_) | E::DocumentNotFound(_) => 404,
            E::DuplicateTypeId(_) => 409,
            E::UnsupportedMediaType(_) => 400,
            _ => 422,
        };
        CoreError::Domain(err.into(), status)
    }
}

impl From<cae_matching::MatchingError> for CoreError {
    fn from(err: cae_matching::MatchingError) -> Self {
        CoreError::Domain(err.into(), 422)
    }
}

impl From<cae_portal::PortalError> for CoreError {
    fn from(err: cae_portal::PortalError) -> Self {
        use cae_portal::PortalError as E;
        let status = match &err {
            E::RunNotReady(_) => 422,
            _ => 422,
        };
        CoreError::Domain(err.into(), status)
    }
}
