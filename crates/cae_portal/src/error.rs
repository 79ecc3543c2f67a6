//! Errors the portal execution pipeline can raise. Mapped onto the
//! closed `CaeError` taxonomy (§7) at the boundary so `cae_core` never
//! has to know this crate's internal error shape.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PortalError {
    #[error("webdriver error: {0}")]
    WebDriver(String),

    #[error("navigation to {url} left the allowed domain(s) {allowed:?}")]
    DomainEscape { url: String, allowed: Vec<String> },

    #[error("could not dismiss the notices/blocker window after exhausting all strategies")]
    DhxBlockerNotDismissed,

    #[error("pending grid not found after exhausting navigation retries")]
    GridNotFound,

    #[error("item {0} not found at execution time")]
    ItemNotFoundAtExecution(String),

    #[error("upload was submitted but the item still appears in the pending grid")]
    UploadPostVerificationFailed,

    #[error("screen signature did not change across {0} successive observations while actions were attempted")]
    SameStateRevisit(u32),

    #[error("run {0} rejected execute_action: not in a state that admits one")]
    RunNotReady(String),

    #[error("a captcha challenge was presented; human handling required")]
    CaptchaRequired,

    #[error("an SSO interstitial was presented; human handling required")]
    SsoInterstitial,

    #[error("two-factor authentication was requested; human handling required")]
    TwoFactorRequired,

    #[error("a persistent modal could not be cleared; human handling required")]
    PersistentModal,
}

impl From<PortalError> for cae_protocol::CaeError {
    fn from(err: PortalError) -> Self {
        use cae_protocol::{CaeError, CaeErrorCode, Severity, Stage};
        match &err {
            PortalError::WebDriver(_) => CaeError::new(CaeErrorCode::ExecUploadFailed, Stage::Execution, Severity::Error, err.to_string()).retryable(true),
            PortalError::DomainEscape { .. } => CaeError::new(CaeErrorCode::SecurityBlockedDomainEscape, Stage::Security, Severity::Critical, err.to_string()),
            PortalError::DhxBlockerNotDismissed => {
                CaeError::new(CaeErrorCode::ExternalDhxBlockerNotDismissed, Stage::External, Severity::Error, err.to_string())
            }
            PortalError::GridNotFound => CaeError::new(CaeErrorCode::PreconditionFailed, Stage::Precondition, Severity::Error, err.to_string()),
            PortalError::ItemNotFoundAtExecution(_) => {
                CaeError::new(CaeErrorCode::ExecItemNotFoundAtExecution, Stage::Execution, Severity::Error, err.to_string())
            }
            PortalError::UploadPostVerificationFailed => {
                CaeError::new(CaeErrorCode::PostUploadPostVerificationFailed, Stage::Postcondition, Severity::Critical, err.to_string())
            }
            PortalError::SameStateRevisit(_) => {
                CaeError::new(CaeErrorCode::PolicyHaltSameStateRevisit, Stage::Policy, Severity::Error, err.to_string())
            }
            PortalError::RunNotReady(_) => CaeError::new(CaeErrorCode::PreApplyGateRejected, Stage::Precondition, Severity::Error, err.to_string()),
            PortalError::CaptchaRequired => CaeError::new(CaeErrorCode::ExternalCaptchaRequired, Stage::External, Severity::Error, err.to_string()),
            PortalError::SsoInterstitial => CaeError::new(CaeErrorCode::ExternalSsoInterstitial, Stage::External, Severity::Error, err.to_string()),
            PortalError::TwoFactorRequired => CaeError::new(CaeErrorCode::ExternalTwoFactorRequired, Stage::External, Severity::Error, err.to_string()),
            PortalError::PersistentModal => CaeError::new(CaeErrorCode::ExternalPersistentModal, Stage::External, Severity::Error, err.to_string()),
        }
    }
}

impl From<fantoccini::error::CmdError> for PortalError {
    fn from(err: fantoccini::error::CmdError) -> Self {
        PortalError::WebDriver(err.to_string())
    }
}

impl From<fantoccini::error::NewSessionError> for PortalError {
    fn from(err: fantoccini::error::NewSessionError) -> Self {
        PortalError::WebDriver(err.to_string())
    }
}
