//! Apply (§4.5.3): the gated, per-item write path. Every precondition
//! is checked before a single upload is attempted; every item is then
//! server-side revalidated, deduped against history, and recorded
//! `planned` before the upload itself runs, so a crash mid-run leaves
//! an honest trail rather than a silent gap.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use cae_ids::{DecisionPackId, PlanId, RunId};
use cae_protocol::history::Action;
use cae_protocol::matching::Decision;
use cae_protocol::plan::{ExecutionResult, ExecutionSummary, ItemExecutionOutcome, ItemOutcome, Plan};
use cae_protocol::rules::SubmissionRule;
use cae_repository::Repository;

use crate::error::CoreError;
use crate::plan::MatchingContext;
use crate::runs::ActiveRun;

#[derive(Debug, Clone)]
pub struct ApplyRequest {
    pub plan_id: PlanId,
    pub decision_pack_id: Option<DecisionPackId>,
    /// Empty means "every `AUTO_UPLOAD` item in the plan".
    pub item_ids: Vec<String>,
    pub max_uploads: u32,
    pub stop_on_first_error: bool,
    pub rate_limit_seconds: f64,
    /// §4.5.3 precondition 2: the caller's `X-USE-REAL-UPLOADER: 1`
    /// header, already checked true by the REST layer before this
    /// struct is constructed.
    pub real_uploader_header_present: bool,
}

/// §4.5.3 preconditions, checked before any item is touched. Returns
/// the items to execute, in requested order, once every precondition
/// holds.
pub fn gate(request: &ApplyRequest, plan: &Plan, operator_mode: bool, max_uploads_hard_cap: u32) -> Result<Vec<String>, CoreError> {
    if !operator_mode {
        return Err(CoreError::ApplyGateRejected("process is not running in operator/development mode".into()));
    }
    if !request.real_uploader_header_present {
        return Err(CoreError::ApplyGateRejected("X-USE-REAL-UPLOADER: 1 header is required".into()));
    }
    if request.max_uploads > max_uploads_hard_cap {
        return Err(CoreError::ApplyGateRejected(format!("max_uploads {} exceeds the configured hard cap {}", request.max_uploads, max_uploads_hard_cap)));
    }

    let auto_upload_keys: std::collections::HashSet<&str> = plan
        .decisions
        .iter()
        .filter(|d| d.decision == Decision::AutoUpload)
        .map(|d| d.item.pending_item_key.as_str())
        .collect();

    let requested: Vec<String> = if request.item_ids.is_empty() {
        auto_upload_keys.iter().map(|s| s.to_string()).collect()
    } else {
        request.item_ids.clone()
    };

    for key in &requested {
        if !auto_upload_keys.contains(key.as_str()) {
            return Err(CoreError::ApplyGateRejected(format!("item {key} is not present in the plan with decision=AUTO_UPLOAD")));
        }
    }
    if requested.len() as u32 > request.max_uploads {
        return Err(CoreError::ApplyGateRejected(format!("{} requested items exceed max_uploads {}", requested.len(), request.max_uploads)));
    }
    Ok(requested)
}

/// Executes one gated apply (§4.5.3 steps 1-6) against an already
/// `Ready` `ActiveRun`. `plan`/`ctx` must reflect the same snapshot the
/// plan was built from; step 1 re-derives the decision instead of
/// trusting the plan's stored one, since repository/history state may
/// have moved since the plan was sealed.
pub async fn execute(
    active_run: &ActiveRun,
    repository: &Repository,
    ctx: &MatchingContext,
    plan: &Plan,
    rules: &[SubmissionRule],
    items: Vec<String>,
    rate_limit_seconds: f64,
    stop_on_first_error: bool,
    cancelled: &AtomicBool,
) -> Result<ExecutionResult, CoreError> {
    let run_id = plan.run_id.clone();
    let mut outcomes = Vec::with_capacity(items.len());
    let mut summary = ExecutionSummary::default();

    for item_key in items {
        // §4.6: cancellation is cooperative, honored only between items.
        if cancelled.load(Ordering::SeqCst) {
            outcomes.push(skip(&item_key, "job canceled"));
            summary.skipped += 1;
            continue;
        }

        let Some(decision) = plan.decisions.iter().find(|d| d.item.pending_item_key == item_key) else {
            outcomes.push(skip(&item_key, "item vanished from plan between gate and execution"));
            summary.skipped += 1;
            continue;
        };

        // Step 1: server-side revalidation.
        let fresh_debug = ctx.evaluate_item(
            &decision.item,
            chrono::Utc::now().date_naive(),
            &plan.platform_key,
            plan.coord_label.as_deref(),
            plan.requested_company_key.as_deref(),
            plan.requested_person_key.as_deref(),
            None,
        );
        let fresh_policy = crate::policy::evaluate_upload_policy(&fresh_debug);
        if fresh_policy.decision != Decision::AutoUpload {
            let reason = format!("policy_rejected: {:?}", fresh_policy.reason_code);
            let fingerprint = fresh_debug.outcome.fingerprint.clone();
            record_history(repository, &run_id, &plan.platform_key, plan, decision, Action::Skipped, None, None, None, fingerprint)?;
            outcomes.push(skip(&item_key, &reason));
            summary.skipped += 1;
            if stop_on_first_error {
                break;
            }
            continue;
        }

        // The engine computes this fingerprint from the resolved scope
        // once a type and rule are settled (§3.1 property 4); AUTO_UPLOAD
        // always reaches that point, so it's always `Some` here.
        let fingerprint = fresh_debug
            .outcome
            .fingerprint
            .clone()
            .ok_or_else(|| CoreError::InvalidRequest(format!("{item_key}: AUTO_UPLOAD with no fingerprint")))?;

        // Step 2: history dedupe check.
        if repository.history.has_submitted(&fingerprint).map_err(CoreError::from)? {
            outcomes.push(skip(&item_key, "already submitted"));
            summary.skipped += 1;
            continue;
        }

        let local_doc_id = fresh_policy.local_doc_ref.clone().ok_or_else(|| CoreError::InvalidRequest(format!("{item_key}: AUTO_UPLOAD with no local_doc_ref")))?;
        let doc = repository.documents.get(&local_doc_id).map_err(CoreError::from)?;

        // Step 3: record `planned`.
        record_history(
            repository,
            &run_id,
            &plan.platform_key,
            plan,
            decision,
            Action::Planned,
            Some(local_doc_id.clone()),
            Some(doc.type_id.clone()),
            Some(doc.sha256.clone()),
            Some(fingerprint.clone()),
        )?;

        let candidate_rules: Vec<SubmissionRule> = rules
            .iter()
            .filter(|r| r.document_type_id == doc.type_id && (r.coord_label.is_none() || r.coord_label.as_deref() == plan.coord_label.as_deref()))
            .cloned()
            .collect();
        let rule = SubmissionRule::select_applicable(&candidate_rules);
        let Some(rule) = rule else {
            record_history(repository, &run_id, &plan.platform_key, plan, decision, Action::Failed, Some(local_doc_id), Some(doc.type_id.clone()), Some(doc.sha256.clone()), Some(fingerprint.clone()))?;
            outcomes.push(fail(&item_key, "no submission rule bound to this document type"));
            summary.failed += 1;
            if stop_on_first_error {
                break;
            }
            continue;
        };

        let (valid_from, valid_to) = doc.effective_validity();
        let spec = cae_portal::UploadSpec {
            pending_item_key: item_key.clone(),
            file_path: PathBuf::from(&doc.stored_path),
            form: rule.form.clone(),
            valid_from,
            valid_to,
            issued_at: doc.issued_at,
        };

        // Step 4: perform the upload (§4.3.6).
        let upload_result = {
            let mut connector = active_run.connector_mut().await;
            cae_portal::upload_single_item(&mut **connector, &decision.item, &spec, 10).await
        };

        // Step 5: record the outcome.
        match upload_result {
            Ok(_evidence) => {
                record_history(repository, &run_id, &plan.platform_key, plan, decision, Action::Submitted, Some(local_doc_id), Some(doc.type_id.clone()), Some(doc.sha256.clone()), Some(fingerprint.clone()))?;
                outcomes.push(ItemExecutionOutcome { pending_item_key: item_key.clone(), outcome: ItemOutcome::Success, error_message: None });
                summary.success += 1;
            }
            Err(err) => {
                record_history(repository, &run_id, &plan.platform_key, plan, decision, Action::Failed, Some(local_doc_id), Some(doc.type_id.clone()), Some(doc.sha256.clone()), Some(fingerprint.clone()))?;
                outcomes.push(fail(&item_key, &err.to_string()));
                summary.failed += 1;
                if stop_on_first_error {
                    // Step 6 rate-limit sleep is skipped when we're about to stop anyway.
                    break;
                }
            }
        }

        // Step 6: rate limit between uploads.
        tokio::time::sleep(Duration::from_secs_f64(rate_limit_seconds.max(0.0))).await;
    }

    Ok(ExecutionResult { run_id, items: outcomes, summary })
}

fn skip(item_key: &str, reason: &str) -> ItemExecutionOutcome {
    ItemExecutionOutcome { pending_item_key: item_key.to_string(), outcome: ItemOutcome::Skipped, error_message: Some(reason.to_string()) }
}

fn fail(item_key: &str, reason: &str) -> ItemExecutionOutcome {
    ItemExecutionOutcome { pending_item_key: item_key.to_string(), outcome: ItemOutcome::Failed, error_message: Some(reason.to_string()) }
}

#[allow(clippy::too_many_arguments)]
fn record_history(
    repository: &Repository,
    run_id: &RunId,
    platform_key: &cae_ids::PlatformKey,
    plan: &Plan,
    decision: &cae_protocol::plan::PlanItemDecision,
    action: Action,
    doc_id: Option<cae_ids::DocId>,
    type_id: Option<cae_ids::TypeId>,
    file_sha256: Option<String>,
    fingerprint: Option<String>,
) -> Result<(), CoreError> {
    // Reuse the engine-resolved fingerprint verbatim (§3.1 property 4)
    // rather than re-deriving one from the plan's requested keys; the
    // two must never diverge or the next `evaluate` won't recognize
    // this record as a duplicate. Early rejections the engine never
    // fingerprinted (scope mismatch, inactive type, ...) fall back to
    // empty since they never reach dedupe.
    let fingerprint = fingerprint.unwrap_or_default();
    let snapshot = serde_json::to_value(&decision.item).unwrap_or(serde_json::Value::Null);
    repository
        .history
        .record_decision(
            run_id.clone(),
            platform_key.clone(),
            plan.coord_label.clone(),
            plan.requested_company_key.clone(),
            plan.requested_person_key.clone(),
            fingerprint,
            snapshot,
            doc_id,
            type_id,
            file_sha256,
            action,
            decision.decision,
            chrono::Utc::now(),
        )
        .map_err(CoreError::from)?;
    Ok(())
}
