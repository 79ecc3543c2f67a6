//! Single-item upload orchestration (§4.3.6): re-locate, delegate the
//! form-fill/attach/submit to the `Connector`, then post-verify.

use std::path::PathBuf;

use cae_protocol::rules::FormSpec;
use cae_protocol::PendingRequirement;
use chrono::NaiveDate;

use crate::connector::Connector;
use crate::error::PortalError;

/// Everything needed to drive the applicable rule's upload form for
/// one item (§4.3.6 step 3-4): the resolved validity dates a
/// `DateFieldSpec` may draw from, the form's selectors, and the file
/// to attach.
#[derive(Debug, Clone)]
pub struct UploadSpec {
    pub pending_item_key: String,
    pub file_path: PathBuf,
    pub form: FormSpec,
    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,
    pub issued_at: Option<NaiveDate>,
}

/// Per-item evidence (§4.3.6 closing line, §6.3): before/after
/// screenshots, a snapshot of what was submitted, and a free-form log.
#[derive(Debug, Clone, Default)]
pub struct UploadEvidence {
    pub screenshot_before: Vec<u8>,
    pub screenshot_after: Vec<u8>,
    pub form_snapshot: serde_json::Value,
    pub log_lines: Vec<String>,
}

/// Run the full single-item upload flow (§4.3.6). No automatic retry
/// on upload failure (§4.3.6 closing line) — the caller (`cae_core`'s
/// apply worker) decides whether to retry a failed item at all.
pub async fn upload_single_item(
    connector: &mut dyn Connector,
    item: &PendingRequirement,
    spec: &UploadSpec,
    max_pages: u32,
) -> Result<UploadEvidence, PortalError> {
    let before = connector.extract_pending(max_pages).await?;
    if !before.iter().any(|p| p.pending_item_key == spec.pending_item_key) {
        return Err(PortalError::ItemNotFoundAtExecution(spec.pending_item_key.clone()));
    }

    let evidence = connector.upload_one(item, spec).await?;

    let after = connector.extract_pending(max_pages).await?;
    if after.iter().any(|p| p.pending_item_key == spec.pending_item_key) {
        return Err(PortalError::UploadPostVerificationFailed);
    }

    Ok(evidence)
}
