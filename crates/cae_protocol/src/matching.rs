//! Matching engine inputs/outputs: `PendingRequirement`, decisions,
//! reason codes, and the per-item debug report.

use cae_ids::{DocId, TypeId};
use serde::{Deserialize, Serialize};

/// A portal-side row indicating a missing document for a subject in a
/// period, produced by a portal scrape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRequirement {
    /// Stable composite of normalized `TIPO|ELEMENTO|EMPRESA`.
    pub pending_item_key: String,
    pub tipo_doc: String,
    pub elemento: String,
    pub empresa: String,
    pub detected_period_key: Option<String>,
    #[serde(default)]
    pub portal_metadata: serde_json::Value,
}

/// The closed decision set a matching/policy evaluation can produce
/// (§4.5.1). `Skip`'s subtype is carried in `reason_code`, not as a
/// nested payload, so the wire shape stays a plain tagged enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    AutoUpload,
    ReviewRequired,
    NoMatch,
    Skip,
}

/// Closed reason-code set (§4.2.1). Exhaustive: a new reason requires a
/// new variant, never a free-form string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    MatchOk,
    NoLocalMatch,
    MissingDocForPeriod,
    MissingLocalFile,
    AmbiguousMatch,
    ScopeMismatch,
    TypeInactive,
    PolicyRejected,
    SkipAlreadySubmitted,
    SkipAlreadyPlanned,
    FingerprintCollision,
    Unknown,
}

/// A type-alias candidate surfaced while scoring a pending item
/// (§4.2 step 2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateType {
    pub type_id: TypeId,
    pub confidence: f64,
    pub matched_alias: String,
}

/// A repository document candidate surfaced while scoring a pending
/// item (§4.2 step 4), with the filter outcome that ranked or excluded
/// it recorded for the debug report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateDoc {
    pub doc_id: DocId,
    pub confidence: f64,
    pub filtered_out_reason: Option<String>,
}

/// How a learning hint affected a match (§4.2.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HintEffect {
    Resolved,
    Boosted,
    Ignored,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedHint {
    pub hint_id: cae_ids::HintId,
    pub effect: HintEffect,
}

/// Normalized snapshot of the inputs a matching run observed, kept in
/// the debug report so a later review can see exactly what text the
/// engine scored against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputsSnapshot {
    pub normalized_text: String,
    pub detected_code: Option<String>,
    pub detected_period_key: Option<String>,
    pub detected_dni: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub decision: Decision,
    pub local_docs_considered: usize,
    pub primary_reason_code: ReasonCode,
    pub human_hint: Option<String>,
    pub applied_hints: Vec<AppliedHint>,
    /// The dedupe fingerprint (§3.1 property 4), computed from the
    /// engine-resolved scope once a type and rule are settled. `None`
    /// for the early-exit outcomes (no type candidate, inactive type,
    /// scope mismatch, no applicable rule) where no fingerprint was
    /// ever derived, since those paths never reach history or upload.
    pub fingerprint: Option<String>,
}

/// Per-item trace of a matching run, emitted unconditionally (§3.1,
/// §4.2 step 9) so every decision is reconstructible after the fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingDebugReport {
    pub inputs: InputsSnapshot,
    pub candidate_types: Vec<CandidateType>,
    pub candidate_docs: Vec<CandidateDoc>,
    pub applied_hints: Vec<AppliedHint>,
    pub outcome: MatchOutcome,
}
