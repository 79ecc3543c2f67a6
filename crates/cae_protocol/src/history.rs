//! `SubmissionRecord`: the append-only history used for dedupe.

use cae_ids::{DocId, PlatformKey, RecordId, RunId, TypeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::matching::Decision;

/// What ultimately happened to a planned/attempted item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Planned,
    Submitted,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub record_id: RecordId,
    pub platform_key: PlatformKey,
    pub coord_label: Option<String>,
    pub company_key: Option<String>,
    pub person_key: Option<String>,
    /// SHA-256 over normalized identifying fields (§3.1); the unit of
    /// history dedupe.
    pub pending_fingerprint: String,
    pub pending_snapshot: serde_json::Value,
    pub doc_id: Option<DocId>,
    pub type_id: Option<TypeId>,
    pub file_sha256: Option<String>,
    pub action: Action,
    pub decision: Decision,
    pub run_id: RunId,
    pub evidence_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    /// Monotonic per-run sequence number imposing a total order on
    /// history records written within the same run (§5).
    pub seq: u64,
}
