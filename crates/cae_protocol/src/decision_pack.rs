//! `DecisionPack`: a human-authored override sheet applied on top of a
//! plan (§4.5.2).

use cae_ids::{DecisionPackId, DocId, PlanId};
use serde::{Deserialize, Serialize};

/// One decision within a pack. `chosen_local_doc_id` and `preset_name`
/// are only meaningful for the matching variants, which is why they sit
/// on the entry rather than being threaded through a separate enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    MarkAsMatch,
    ForceSkip,
    RequestHuman,
    ApplyPreset,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionEntry {
    pub item_id: String,
    pub action: DecisionAction,
    pub chosen_local_doc_id: Option<DocId>,
    pub reason: String,
    pub preset_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionPack {
    pub decision_pack_id: DecisionPackId,
    pub plan_id: PlanId,
    pub decisions: Vec<DecisionEntry>,
}
