//! The closed error taxonomy (§7): every error the Core surfaces to a
//! caller, whether over REST or in a trace event, is one of these
//! codes carrying this exact field set. New codes are additive; none of
//! the existing ones may be renamed or removed once shipped.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed error code set. Grouped by the prefixes §7 mandates
/// (`PROPOSAL_*, PRE_*, EXEC_*, POST_*, POLICY_*, EVIDENCE_*,
/// SECURITY_*, EXTERNAL_*`) plus a handful of request-validation codes
/// that never reach a browser action at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaeErrorCode {
    // PROPOSAL_*
    ProposalRejected,
    ProposalInvalid,
    // PRE_*
    PreconditionFailed,
    PreApplyGateRejected,
    // EXEC_*
    ExecItemNotFoundAtExecution,
    ExecUploadFailed,
    // POST_*
    PostUploadPostVerificationFailed,
    // POLICY_*
    PolicyRejected,
    PolicyHaltSameStateRevisit,
    // EVIDENCE_*
    EvidenceCaptureFailed,
    EvidenceRedactionFailed,
    // SECURITY_*
    SecurityBlockedDomainEscape,
    SecurityCriticalActionUnconfirmed,
    // EXTERNAL_*
    ExternalCaptchaRequired,
    ExternalSsoInterstitial,
    ExternalTwoFactorRequired,
    ExternalPersistentModal,
    ExternalDhxBlockerNotDismissed,
}

impl CaeErrorCode {
    /// Whether this code's failure mode is ever retryable at all,
    /// independent of the `retryable` flag carried on a given
    /// instance — critical postcondition/security codes are never
    /// retryable (§7 propagation policy).
    pub fn retryable_by_default(self) -> bool {
        !matches!(
            self,
            CaeErrorCode::PostUploadPostVerificationFailed
                | CaeErrorCode::SecurityBlockedDomainEscape
                | CaeErrorCode::SecurityCriticalActionUnconfirmed
                | CaeErrorCode::EvidenceCaptureFailed
                | CaeErrorCode::EvidenceRedactionFailed
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ProposalValidation,
    Precondition,
    Execution,
    Postcondition,
    Policy,
    Evidence,
    Security,
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
    Critical,
}

pub const SCHEMA_VERSION: u32 = 1;

/// The stable wire shape for every error this system surfaces, per §7.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{error_code:?}: {message}")]
pub struct CaeError {
    pub schema_version: u32,
    pub error_code: CaeErrorCode,
    pub stage: Stage,
    pub severity: Severity,
    pub retryable: bool,
    pub message: String,
    pub details: serde_json::Value,
    #[serde(default)]
    pub failed_conditions: Vec<String>,
    #[serde(default)]
    pub evidence_refs: Vec<String>,
}

impl CaeError {
    pub fn new(code: CaeErrorCode, stage: Stage, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            error_code: code,
            stage,
            severity,
            retryable: false,
            message: message.into(),
            details: serde_json::Value::Null,
            failed_conditions: Vec::new(),
            evidence_refs: Vec::new(),
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn with_failed_conditions(mut self, conditions: Vec<String>) -> Self {
        self.failed_conditions = conditions;
        self
    }

    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable && self.error_code.retryable_by_default();
        self
    }

    /// The HTTP status this error maps to at the REST boundary (§6.1,
    /// §7): 422 for recoverable/user-facing conditions, 409 for id
    /// conflicts, 404 for missing ids, 400 for malformed requests, 5xx
    /// reserved for internal-consistency failures this type never
    /// represents.
    pub fn http_status(&self) -> u16 {
        match self.error_code {
            CaeErrorCode::ProposalInvalid => 400,
            CaeErrorCode::ProposalRejected
            | CaeErrorCode::PreconditionFailed
            | CaeErrorCode::PreApplyGateRejected
            | CaeErrorCode::ExecItemNotFoundAtExecution
            | CaeErrorCode::ExecUploadFailed
            | CaeErrorCode::PostUploadPostVerificationFailed
            | CaeErrorCode::PolicyRejected
            | CaeErrorCode::PolicyHaltSameStateRevisit
            | CaeErrorCode::EvidenceCaptureFailed
            | CaeErrorCode::EvidenceRedactionFailed
            | CaeErrorCode::SecurityBlockedDomainEscape
            | CaeErrorCode::SecurityCriticalActionUnconfirmed
            | CaeErrorCode::ExternalCaptchaRequired
            | CaeErrorCode::ExternalSsoInterstitial
            | CaeErrorCode::ExternalTwoFactorRequired
            | CaeErrorCode::ExternalPersistentModal
            | CaeErrorCode::ExternalDhxBlockerNotDismissed => 422,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_codes_never_retryable() {
        let err = CaeError::new(
            CaeErrorCode::SecurityBlockedDomainEscape,
            Stage::Security,
            Severity::Critical,
            "navigation left the allowlist",
        )
        .retryable(true);
        assert!(!err.retryable);
    }

    #[test]
    fn dhx_blocker_maps_to_422() {
        let err = CaeError::new(
            CaeErrorCode::ExternalDhxBlockerNotDismissed,
            Stage::External,
            Severity::Error,
            "could not dismiss the notices window",
        );
        assert_eq!(err.http_status(), 422);
    }
}
