//! `LearnedHint`: a durable, condition-bearing record generated from a
//! human `MARK_AS_MATCH` decision (§4.2.2).

use cae_ids::{DecisionPackId, DocId, HintId, TypeId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HintStrength {
    Exact,
    Soft,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnedMapping {
    pub type_id_expected: TypeId,
    pub local_doc_id: DocId,
    pub local_doc_fingerprint: Option<String>,
}

/// Conditions a hint must still satisfy on lookup, beyond its own
/// `item_fingerprint`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HintConditions {
    pub subject_key: Option<String>,
    pub person_key: Option<String>,
    pub period_key: Option<String>,
    pub portal_type_label_normalized: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnedHint {
    /// SHA-256 over canonicalized content; generation is idempotent on
    /// this id (§4.2.2).
    pub hint_id: HintId,
    pub item_fingerprint: String,
    pub learned_mapping: LearnedMapping,
    pub conditions: HintConditions,
    pub strength: HintStrength,
    pub disabled: bool,
    pub source_decision_pack_id: DecisionPackId,
}
