//! The append-only per-run trace JSONL schema (§6.4).

use cae_ids::RunId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of trace event types (§6.4). One line of `trace.jsonl`
/// per event, in strictly increasing `seq` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceEventType {
    RunStarted,
    RunFinished,
    ObservationCaptured,
    ProposalReceived,
    ProposalAccepted,
    ProposalRejected,
    ActionCompiled,
    PreconditionsChecked,
    ActionStarted,
    ActionExecuted,
    PostconditionsChecked,
    AssertChecked,
    RetryScheduled,
    BackoffApplied,
    RecoveryStarted,
    RecoveryFinished,
    PolicyHalt,
    EvidenceCaptured,
    ErrorRaised,
    InspectionStarted,
    InspectionFinished,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    pub run_id: RunId,
    /// Monotonic, no gaps, within a run.
    pub seq: u64,
    pub ts_utc: DateTime<Utc>,
    pub event_type: TraceEventType,
    pub step_id: Option<String>,
    pub state_signature_before: Option<String>,
    pub state_signature_after: Option<String>,
    pub action_spec: Option<serde_json::Value>,
    pub result: Option<serde_json::Value>,
    pub error: Option<crate::error::CaeError>,
    #[serde(default)]
    pub evidence_refs: Vec<String>,
    pub metadata: Option<serde_json::Value>,
}
