//! Read-only plan construction (§4.5.1) and Decision Pack application
//! (§4.5.2). Matching and policy evaluation are pure CPU (§5: "never
//! suspend") — this module gathers the repository snapshot once per
//! plan build, then calls `cae_matching::evaluate` per item.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use cae_ids::{DecisionPackId, DocId, PlanId, PlatformKey, RunId, TypeId};
use cae_matching::MatchingInputs;
use cae_protocol::config::PersonRecord;
use cae_protocol::decision_pack::{DecisionAction, DecisionPack};
use cae_protocol::learning::{HintConditions, HintStrength, LearnedHint};
use cae_protocol::matching::{Decision, MatchingDebugReport, PendingRequirement};
use cae_protocol::plan::{DecisionSource, Plan, PlanItemDecision, PlanSummary};
use cae_repository::Repository;
use chrono::{NaiveDate, Utc};

use crate::error::CoreError;
use crate::policy::evaluate_upload_policy;

/// A snapshot of everything `cae_matching::evaluate` needs, gathered
/// once per plan build (or per apply-time revalidation) rather than
/// per item (§4.1: every slice is a caller-gathered snapshot).
pub struct MatchingContext {
    repository: Arc<Repository>,
    hints: Vec<LearnedHint>,
    people: Vec<PersonRecord>,
    types: Vec<cae_protocol::catalog::DocumentType>,
    documents: Vec<cae_protocol::document::DocumentInstance>,
    rules: Vec<cae_protocol::rules::SubmissionRule>,
}

impl MatchingContext {
    pub fn load(repository: Arc<Repository>, hints: Vec<LearnedHint>, people: Vec<PersonRecord>, platform_key: &PlatformKey) -> Result<Self, CoreError> {
        let types = repository.types.list_types();
        let rules = repository.rules.list_for_platform(platform_key);
        let expiring_soon_days = repository.settings.get()?.expiring_soon_days;
        let documents = repository.documents.list(&Default::default(), Utc::now().date_naive(), expiring_soon_days)?;
        Ok(Self { repository, hints, people, types, documents, rules })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn evaluate_item(
        &self,
        item: &PendingRequirement,
        today: NaiveDate,
        platform_key: &PlatformKey,
        coord_label: Option<&str>,
        requested_company_key: Option<&str>,
        requested_person_key: Option<&str>,
        period_bounds: Option<(NaiveDate, NaiveDate)>,
    ) -> MatchingDebugReport {
        let history = &self.repository.history;
        let documents_store = &self.repository.documents;
        let file_exists = |doc: &cae_protocol::document::DocumentInstance| documents_store.file_exists(doc);
        let history_has_submitted = |fp: &str| history.has_submitted(fp).unwrap_or(false);
        let history_has_active_planned = |fp: &str| history.has_active_planned(fp).unwrap_or(false);
        let inputs = MatchingInputs {
            pending: item,
            today,
            platform_key,
            coord_label,
            requested_company_key,
            requested_person_key,
            types: &self.types,
            documents: &self.documents,
            rules: &self.rules,
            hints: &self.hints,
            people: &self.people,
            period_bounds,
            file_exists: &file_exists,
            history_has_submitted: &history_has_submitted,
            history_has_active_planned: &history_has_active_planned,
        };
        cae_matching::evaluate(&inputs)
    }
}

/// Request shape for building a plan (§4.5.1 input).
#[derive(Debug, Clone)]
pub struct PlanBuildRequest {
    pub run_id: RunId,
    pub platform_key: PlatformKey,
    pub coord: Option<String>,
    pub company_key: Option<String>,
    pub person_key: Option<String>,
    pub only_target: Option<String>,
    pub limit: Option<usize>,
    pub today: NaiveDate,
}

/// Builds a fresh `Plan` from already-scraped pending items and a
/// loaded `MatchingContext` (§4.5.1). Scraping itself happens on the
/// owning `HeadfulRun`'s worker thread (`crate::runs`); this function
/// is pure given its inputs and never mutates anything external.
pub fn build_plan(plan_id: PlanId, request: &PlanBuildRequest, items: Vec<PendingRequirement>, ctx: &MatchingContext) -> Plan {
    let mut items = items;
    if let Some(target) = &request.only_target {
        items.retain(|i| &i.pending_item_key == target);
    }
    if let Some(limit) = request.limit {
        items.truncate(limit);
    }

    let mut decisions = Vec::with_capacity(items.len());
    let mut diagnostics = Vec::new();
    for item in &items {
        let debug = ctx.evaluate_item(
            item,
            request.today,
            &request.platform_key,
            request.coord.as_deref(),
            request.company_key.as_deref(),
            request.person_key.as_deref(),
            None,
        );
        let policy = evaluate_upload_policy(&debug);
        if matches!(policy.decision, Decision::ReviewRequired) && debug.outcome.human_hint.is_none() {
            diagnostics.push(format!("{}: review required with no human hint attached", item.pending_item_key));
        }
        decisions.push(PlanItemDecision {
            item: item.clone(),
            decision: policy.decision,
            reason_code: policy.reason_code,
            reason: policy.reason,
            confidence: policy.confidence,
            local_doc_ref: policy.local_doc_ref,
            debug,
        });
    }

    let summary = PlanSummary::from_decisions(&decisions);
    Plan {
        plan_id,
        decision_pack_id: None,
        run_id: request.run_id.clone(),
        platform_key: request.platform_key.clone(),
        coord_label: request.coord.clone(),
        requested_company_key: request.company_key.clone(),
        requested_person_key: request.person_key.clone(),
        items,
        decisions,
        summary,
        diagnostics,
        created_at: Utc::now(),
    }
}

/// Resolved via `cae_core::plan::PresetStore`: applying `ApplyPreset`
/// requires `chosen_local_doc_id` on every entry (the preset mapping is
/// already resolved client-side); Core only records the mapping for
/// observability/reuse, it never reverse-resolves a bare preset name.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PresetMapping {
    pub type_id_expected: TypeId,
    pub local_doc_id: DocId,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct PresetsFile {
    presets: HashMap<String, PresetMapping>,
}

pub struct PresetStore {
    file: cae_repository::store::JsonFile<PresetsFile>,
}

impl PresetStore {
    pub fn open(path: PathBuf) -> Self {
        Self { file: cae_repository::store::JsonFile::new(path) }
    }

    pub fn record(&self, name: &str, mapping: PresetMapping) -> Result<(), CoreError> {
        let mut current = self.file.read().map_err(CoreError::from)?;
        current.presets.insert(name.to_string(), mapping);
        self.file.write(&current).map_err(CoreError::from)
    }
}

/// Applies a sealed Decision Pack over a base plan (§4.5.2), producing a
/// new plan sharing `plan_id` and carrying `decision_pack_id`. The base
/// plan is never mutated — its decisions are copied and overridden.
pub fn apply_decision_pack(base: &Plan, pack: &DecisionPack, ctx: &MatchingContext, hint_store: &cae_matching::HintStore, presets: &PresetStore) -> Result<Plan, CoreError> {
    let mut decisions: HashMap<String, PlanItemDecision> =
        base.decisions.iter().map(|d| (d.item.pending_item_key.clone(), d.clone())).collect();

    for entry in &pack.decisions {
        let existing = decisions
            .get(&entry.item_id)
            .ok_or_else(|| CoreError::InvalidDecisionEntry(entry.item_id.clone(), "not present in base plan".to_string()))?
            .clone();

        let updated = match &entry.action {
            DecisionAction::MarkAsMatch => {
                let local_doc_id = entry
                    .chosen_local_doc_id
                    .clone()
                    .ok_or_else(|| CoreError::InvalidDecisionEntry(entry.item_id.clone(), "MARK_AS_MATCH requires chosen_local_doc_id".to_string()))?;
                let type_id = existing
                    .debug
                    .candidate_types
                    .first()
                    .map(|c| c.type_id.clone())
                    .ok_or_else(|| CoreError::InvalidDecisionEntry(entry.item_id.clone(), "no candidate type to pin a learning hint to".to_string()))?;

                let item_fingerprint = cae_security::fingerprint::pending_fingerprint(
                    base.platform_key.as_str(),
                    type_id.as_str(),
                    base.requested_company_key.as_deref(),
                    base.requested_person_key.as_deref(),
                    existing.item.detected_period_key.as_deref(),
                );
                hint_store
                    .generate(
                        pack.decision_pack_id.clone(),
                        item_fingerprint,
                        type_id,
                        local_doc_id.clone(),
                        None,
                        HintConditions { subject_key: base.requested_company_key.clone(), person_key: base.requested_person_key.clone(), period_key: existing.item.detected_period_key.clone(), portal_type_label_normalized: None },
                        HintStrength::Exact,
                    )
                    .map_err(CoreError::from)?;

                PlanItemDecision {
                    decision: Decision::AutoUpload,
                    reason_code: cae_protocol::matching::ReasonCode::MatchOk,
                    reason: entry.reason.clone(),
                    confidence: 1.0,
                    local_doc_ref: Some(local_doc_id),
                    ..existing
                }
            }
            DecisionAction::ForceSkip => PlanItemDecision {
                decision: Decision::Skip,
                reason_code: cae_protocol::matching::ReasonCode::SkipAlreadySubmitted,
                reason: entry.reason.clone(),
                ..existing
            },
            DecisionAction::RequestHuman => PlanItemDecision {
                decision: Decision::ReviewRequired,
                reason_code: cae_protocol::matching::ReasonCode::AmbiguousMatch,
                reason: entry.reason.clone(),
                ..existing
            },
            DecisionAction::ApplyPreset => {
                let preset_name = entry
                    .preset_name
                    .clone()
                    .ok_or_else(|| CoreError::InvalidDecisionEntry(entry.item_id.clone(), "APPLY_PRESET requires preset_name".to_string()))?;
                let local_doc_id = entry
                    .chosen_local_doc_id
                    .clone()
                    .ok_or_else(|| CoreError::InvalidDecisionEntry(entry.item_id.clone(), "APPLY_PRESET requires chosen_local_doc_id".to_string()))?;
                let type_id = existing
                    .debug
                    .candidate_types
                    .first()
                    .map(|c| c.type_id.clone())
                    .ok_or_else(|| CoreError::InvalidDecisionEntry(entry.item_id.clone(), "no candidate type for preset".to_string()))?;
                presets.record(&preset_name, PresetMapping { type_id_expected: type_id, local_doc_id: local_doc_id.clone() })?;
                PlanItemDecision {
                    decision: Decision::AutoUpload,
                    reason_code: cae_protocol::matching::ReasonCode::MatchOk,
                    reason: if entry.reason.is_empty() { format!("preset_applied:{preset_name}") } else { entry.reason.clone() },
                    confidence: 1.0,
                    local_doc_ref: Some(local_doc_id),
                    ..existing
                }
            }
        };
        decisions.insert(entry.item_id.clone(), updated);
    }

    let decisions: Vec<PlanItemDecision> = base.items.iter().filter_map(|item| decisions.remove(&item.pending_item_key)).collect();
    let summary = PlanSummary::from_decisions(&decisions);
    Ok(Plan {
        plan_id: base.plan_id.clone(),
        decision_pack_id: Some(pack.decision_pack_id.clone()),
        run_id: base.run_id.clone(),
        platform_key: base.platform_key.clone(),
        coord_label: base.coord_label.clone(),
        requested_company_key: base.requested_company_key.clone(),
        requested_person_key: base.requested_person_key.clone(),
        items: base.items.clone(),
        decisions,
        summary,
        diagnostics: base.diagnostics.clone(),
        created_at: Utc::now(),
    })
}

/// Plan/Decision-Pack persistence (§6.2 adds `plans/<plan_id>/`, not
/// named in the distilled layout — see DESIGN.md). A sealed plan file
/// is immutable (§5); applying a pack writes a sibling artifact under
/// the same `plan_id` directory rather than overwriting `plan.json`.
pub struct PlanStore {
    root: PathBuf,
}

impl PlanStore {
    pub fn open(root: PathBuf) -> Self {
        Self { root }
    }

    fn plan_dir(&self, plan_id: &PlanId) -> PathBuf {
        self.root.join(plan_id.as_str())
    }

    pub fn seal(&self, plan: &Plan) -> Result<(), CoreError> {
        let dir = self.plan_dir(&plan.plan_id);
        std::fs::create_dir_all(&dir).map_err(|e| cae_repository::RepositoryError::Io { path: dir.display().to_string(), source: e })?;
        cae_repository::store::atomic_write_json(&dir.join("plan.json"), plan).map_err(CoreError::from)
    }

    pub fn load(&self, plan_id: &PlanId) -> Result<Plan, CoreError> {
        let path = self.plan_dir(plan_id).join("plan.json");
        let raw = std::fs::read_to_string(&path).map_err(|_| CoreError::PlanNotFound(plan_id.clone()))?;
        serde_json::from_str(&raw).map_err(|e| cae_repository::RepositoryError::Json { path: path.display().to_string(), source: e }.into())
    }

    pub fn seal_decision_pack(&self, derived: &Plan, pack: &DecisionPack) -> Result<(), CoreError> {
        let dir = self.plan_dir(&derived.plan_id);
        std::fs::create_dir_all(&dir).map_err(|e| cae_repository::RepositoryError::Io { path: dir.display().to_string(), source: e })?;
        let pack_path = dir.join(format!("decision_pack_{}.json", pack.decision_pack_id.as_str()));
        cae_repository::store::atomic_write_json(&pack_path, pack).map_err(CoreError::from)?;
        let derived_path = dir.join(format!("plan_{}.json", pack.decision_pack_id.as_str()));
        cae_repository::store::atomic_write_json(&derived_path, derived).map_err(CoreError::from)
    }

    pub fn load_decision_pack_plan(&self, plan_id: &PlanId, decision_pack_id: &DecisionPackId) -> Result<Plan, CoreError> {
        let path = self.plan_dir(plan_id).join(format!("plan_{}.json", decision_pack_id.as_str()));
        let raw = std::fs::read_to_string(&path).map_err(|_| CoreError::DecisionPackNotFound(decision_pack_id.clone(), plan_id.clone()))?;
        serde_json::from_str(&raw).map_err(|e| cae_repository::RepositoryError::Json { path: path.display().to_string(), source: e }.into())
    }
}
