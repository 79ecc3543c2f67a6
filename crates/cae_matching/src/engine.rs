//! The Matching Engine proper (§4.2): a pure function of its inputs —
//! no I/O, no wall-clock beyond the injected `today` — producing a
//! `MatchingDebugReport` unconditionally.

use cae_ids::PlatformKey;
use cae_protocol::catalog::{DocumentType, PeriodKind, Scope};
use cae_protocol::config::PersonRecord;
use cae_protocol::document::DocumentInstance;
use cae_protocol::learning::{HintStrength, LearnedHint};
use cae_protocol::matching::{
    AppliedHint, CandidateDoc, CandidateType, Decision, HintEffect, InputsSnapshot, MatchOutcome, MatchingDebugReport, PendingRequirement,
    ReasonCode,
};
use cae_protocol::rules::SubmissionRule;
use cae_security::fingerprint::pending_fingerprint;
use chrono::NaiveDate;

use crate::candidates::score_type_candidates;
use crate::detect::{detect_code, detect_dni, detect_period_key, normalize_pending_text};
use crate::documents::search_documents;
use crate::scope::resolve_scope;

/// Top-two candidate confidences differ by less than this ⇒ ambiguous
/// (§4.2 step 8).
const AMBIGUITY_MARGIN: f64 = 0.1;
/// A learning hint's soft boost to any candidate it names (§4.2.2).
const HINT_SOFT_BOOST: f64 = 0.2;

/// Everything the matching engine needs for one pending item. Every
/// slice here is a snapshot the caller (`cae_core`) gathered up front —
/// `evaluate` never queries a store itself.
pub struct MatchingInputs<'a> {
    pub pending: &'a PendingRequirement,
    pub today: NaiveDate,
    pub platform_key: &'a PlatformKey,
    pub coord_label: Option<&'a str>,
    pub requested_company_key: Option<&'a str>,
    pub requested_person_key: Option<&'a str>,
    pub types: &'a [DocumentType],
    pub documents: &'a [DocumentInstance],
    pub rules: &'a [SubmissionRule],
    pub hints: &'a [LearnedHint],
    pub people: &'a [PersonRecord],
    /// Period `[start, end]` bounds for `pending.detected_period_key`
    /// (or the engine's own detection), supplied by the caller since
    /// only the repository's period planner knows period-kind-specific
    /// boundaries.
    pub period_bounds: Option<(NaiveDate, NaiveDate)>,
    pub file_exists: &'a dyn Fn(&DocumentInstance) -> bool,
    pub history_has_submitted: &'a dyn Fn(&str) -> bool,
    pub history_has_active_planned: &'a dyn Fn(&str) -> bool,
}

fn applies_to(hint: &LearnedHint, platform_type_label: &str, subject_key: Option<&str>, person_key: Option<&str>, period_key: Option<&str>) -> bool {
    if hint.disabled {
        return false;
    }
    let c = &hint.conditions;
    c.subject_key.as_deref().map_or(true, |v| Some(v) == subject_key)
        && c.person_key.as_deref().map_or(true, |v| Some(v) == person_key)
        && c.period_key.as_deref().map_or(true, |v| Some(v) == period_key)
        && c.portal_type_label_normalized
            .as_deref()
            .map_or(true, |v| platform_type_label.contains(v))
}

struct HintApplication {
    applied: Vec<AppliedHint>,
    /// `Some` only when a single EXACT hint resolved the match directly.
    resolved_doc_id: Option<cae_ids::DocId>,
    /// doc_ids that should receive the soft boost.
    boosted_doc_ids: Vec<cae_ids::DocId>,
}

fn apply_hints(hints: &[LearnedHint], normalized_text: &str, subject_key: Option<&str>, person_key: Option<&str>, period_key: Option<&str>, documents: &[DocumentInstance], file_exists: &dyn Fn(&DocumentInstance) -> bool) -> HintApplication {
    let applicable: Vec<&LearnedHint> = hints
        .iter()
        .filter(|h| applies_to(h, normalized_text, subject_key, person_key, period_key))
        .collect();

    let exact: Vec<&&LearnedHint> = applicable.iter().filter(|h| h.strength == HintStrength::Exact).collect();

    if exact.len() == 1 {
        let hint = *exact[0];
        let doc_exists = documents
            .iter()
            .find(|d| d.doc_id == hint.learned_mapping.local_doc_id)
            .is_some_and(file_exists);
        if doc_exists {
            return HintApplication {
                applied: vec![AppliedHint {
                    hint_id: hint.hint_id.clone(),
                    effect: HintEffect::Resolved,
                }],
                resolved_doc_id: Some(hint.learned_mapping.local_doc_id.clone()),
                boosted_doc_ids: Vec::new(),
            };
        }
    }

    let mut applied = Vec::new();
    let mut boosted_doc_ids = Vec::new();
    if applicable.len() > 1 || (applicable.len() == 1 && exact.is_empty()) {
        for hint in &applicable {
            applied.push(AppliedHint {
                hint_id: hint.hint_id.clone(),
                effect: HintEffect::Boosted,
            });
            boosted_doc_ids.push(hint.learned_mapping.local_doc_id.clone());
        }
    }

    HintApplication {
        applied,
        resolved_doc_id: None,
        boosted_doc_ids,
    }
}

#[allow(clippy::too_many_arguments)]
fn debug_report(
    inputs_snapshot: InputsSnapshot,
    candidate_types: Vec<CandidateType>,
    candidate_docs: Vec<CandidateDoc>,
    applied_hints: Vec<AppliedHint>,
    decision: Decision,
    local_docs_considered: usize,
    reason_code: ReasonCode,
    human_hint: Option<String>,
    fingerprint: Option<String>,
) -> MatchingDebugReport {
    MatchingDebugReport {
        inputs: inputs_snapshot,
        candidate_types,
        candidate_docs,
        applied_hints: applied_hints.clone(),
        outcome: MatchOutcome {
            decision,
            local_docs_considered,
            primary_reason_code: reason_code,
            human_hint,
            applied_hints,
            fingerprint,
        },
    }
}

/// Run the Matching Engine on one pending item (§4.2). Always returns a
/// `MatchingDebugReport`; never errors.
pub fn evaluate(inputs: &MatchingInputs) -> MatchingDebugReport {
    let normalized_text = normalize_pending_text(&inputs.pending.tipo_doc, &inputs.pending.elemento, &inputs.pending.empresa);
    let detected_code = detect_code(&normalized_text);
    let detected_dni = detect_dni(&normalized_text);
    let detected_period_key = inputs.pending.detected_period_key.clone().or_else(|| detect_period_key(&normalized_text));

    let snapshot = InputsSnapshot {
        normalized_text: normalized_text.clone(),
        detected_code: detected_code.clone(),
        detected_period_key: detected_period_key.clone(),
        detected_dni: detected_dni.clone(),
    };

    let candidate_types = score_type_candidates(inputs.types, &normalized_text, detected_code.as_deref());

    let Some(top_type_candidate) = candidate_types.first() else {
        return debug_report(snapshot, candidate_types, Vec::new(), Vec::new(), Decision::NoMatch, 0, ReasonCode::NoLocalMatch, None, None);
    };

    let Some(type_) = inputs.types.iter().find(|t| t.type_id == top_type_candidate.type_id) else {
        return debug_report(snapshot, candidate_types, Vec::new(), Vec::new(), Decision::NoMatch, 0, ReasonCode::NoLocalMatch, None, None);
    };

    if !type_.active {
        return debug_report(
            snapshot,
            candidate_types,
            Vec::new(),
            Vec::new(),
            Decision::NoMatch,
            0,
            ReasonCode::TypeInactive,
            Some(format!("document type {} is inactive", type_.type_id.as_str())),
            None,
        );
    }

    let resolved_scope = match resolve_scope(
        type_.scope,
        inputs.requested_company_key,
        inputs.requested_person_key,
        inputs.people,
        &normalized_text,
        detected_dni.as_deref(),
    ) {
        Ok(s) => s,
        Err(()) => {
            return debug_report(snapshot, candidate_types, Vec::new(), Vec::new(), Decision::NoMatch, 0, ReasonCode::ScopeMismatch, None, None);
        }
    };

    let applicable_rules: Vec<SubmissionRule> = inputs
        .rules
        .iter()
        .filter(|r| &r.platform_key == inputs.platform_key && r.document_type_id == type_.type_id)
        .filter(|r| r.coord_label.is_none() || r.coord_label.as_deref() == inputs.coord_label)
        .filter(|r| rule_matches_text(r, &normalized_text, &inputs.pending.empresa))
        .cloned()
        .collect();

    if SubmissionRule::select_applicable(&applicable_rules).is_none() {
        return debug_report(
            snapshot,
            candidate_types,
            Vec::new(),
            Vec::new(),
            Decision::ReviewRequired,
            0,
            ReasonCode::PolicyRejected,
            Some("no enabled submission rule applies to this platform/type/coord".to_string()),
            None,
        );
    }

    let period_key_for_search = if type_.period_kind == PeriodKind::None { None } else { detected_period_key.as_deref() };

    // Canonical dedupe fingerprint (§3.1 property 4): engine-resolved
    // scope + period_key_for_search, never the caller's requested
    // filters. `apply::execute` reads this same value back out of the
    // debug report rather than re-deriving it.
    let fingerprint = pending_fingerprint(
        inputs.platform_key.as_str(),
        type_.type_id.as_str(),
        resolved_scope.company_key.as_deref(),
        resolved_scope.person_key.as_deref(),
        period_key_for_search,
    );

    if (inputs.history_has_submitted)(&fingerprint) {
        return debug_report(snapshot, candidate_types, Vec::new(), Vec::new(), Decision::Skip, 0, ReasonCode::SkipAlreadySubmitted, None, Some(fingerprint));
    }
    if (inputs.history_has_active_planned)(&fingerprint) {
        return debug_report(snapshot, candidate_types, Vec::new(), Vec::new(), Decision::Skip, 0, ReasonCode::SkipAlreadyPlanned, None, Some(fingerprint));
    }

    let subject_key = resolved_scope.company_key.as_deref().or(resolved_scope.person_key.as_deref());
    let hints_applied = apply_hints(
        inputs.hints,
        &normalized_text,
        subject_key,
        resolved_scope.person_key.as_deref(),
        period_key_for_search,
        inputs.documents,
        inputs.file_exists,
    );

    if let Some(resolved_doc_id) = hints_applied.resolved_doc_id {
        return debug_report(
            snapshot,
            candidate_types,
            vec![CandidateDoc {
                doc_id: resolved_doc_id,
                confidence: 1.0,
                filtered_out_reason: None,
            }],
            hints_applied.applied,
            Decision::AutoUpload,
            1,
            ReasonCode::MatchOk,
            None,
            Some(fingerprint.clone()),
        );
    }

    let mut candidate_docs = search_documents(
        inputs.documents,
        &type_.type_id,
        type_.scope,
        resolved_scope.company_key.as_deref(),
        resolved_scope.person_key.as_deref(),
        type_.period_kind,
        period_key_for_search,
        inputs.period_bounds,
        inputs.file_exists,
    );

    for candidate in candidate_docs.iter_mut() {
        if hints_applied.boosted_doc_ids.contains(&candidate.doc_id) {
            candidate.confidence += HINT_SOFT_BOOST;
        }
    }
    candidate_docs.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let local_docs_considered = candidate_docs.len();

    if candidate_docs.is_empty() {
        return debug_report(
            snapshot,
            candidate_types,
            candidate_docs,
            hints_applied.applied,
            Decision::ReviewRequired,
            local_docs_considered,
            ReasonCode::MissingDocForPeriod,
            None,
            Some(fingerprint.clone()),
        );
    }

    if candidate_docs.len() > 1 && (candidate_docs[0].confidence - candidate_docs[1].confidence).abs() < AMBIGUITY_MARGIN {
        return debug_report(
            snapshot,
            candidate_types,
            candidate_docs,
            hints_applied.applied,
            Decision::ReviewRequired,
            local_docs_considered,
            ReasonCode::AmbiguousMatch,
            None,
            Some(fingerprint.clone()),
        );
    }

    let best = candidate_docs[0].clone();
    if best.filtered_out_reason.is_some() {
        return debug_report(
            snapshot,
            candidate_types,
            candidate_docs,
            hints_applied.applied,
            Decision::ReviewRequired,
            local_docs_considered,
            ReasonCode::MissingLocalFile,
            None,
            Some(fingerprint.clone()),
        );
    }

    debug_report(
        snapshot,
        candidate_types,
        candidate_docs,
        hints_applied.applied,
        Decision::AutoUpload,
        local_docs_considered,
        ReasonCode::MatchOk,
        None,
        Some(fingerprint),
    )
}

fn rule_matches_text(rule: &SubmissionRule, normalized_text: &str, empresa: &str) -> bool {
    let empresa_norm = cae_security::normalize(empresa);
    let text_ok = rule.match_criteria.pending_text_contains.is_empty()
        || rule
            .match_criteria
            .pending_text_contains
            .iter()
            .any(|needle| normalized_text.contains(&cae_security::normalize(needle)));
    let empresa_ok = rule.match_criteria.empresa_contains.is_empty()
        || rule
            .match_criteria
            .empresa_contains
            .iter()
            .any(|needle| empresa_norm.contains(&cae_security::normalize(needle)));
    text_ok && empresa_ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use cae_ids::{DocId, RuleId, TypeId};
    use cae_protocol::catalog::{ValidityBasis, ValidityPolicy, ValidityStartMode};
    use cae_protocol::document::{ComputedValidity, DocumentStatus, ExtractedMeta};
    use cae_protocol::rules::{FormSpec, MatchCriteria, RuleScope};

    fn pending(tipo: &str, elemento: &str, empresa: &str, period: Option<&str>) -> PendingRequirement {
        PendingRequirement {
            pending_item_key: "k1".into(),
            tipo_doc: tipo.into(),
            elemento: elemento.into(),
            empresa: empresa.into(),
            detected_period_key: period.map(str::to_string),
            portal_metadata: serde_json::Value::Null,
        }
    }

    fn autonomos_type() -> DocumentType {
        DocumentType {
            type_id: TypeId::from("T104_AUTONOMOS_RECEIPT"),
            name: "Autonomos receipt".into(),
            description: String::new(),
            scope: Scope::Worker,
            validity_policy: ValidityPolicy::Monthly {
                basis: ValidityBasis::IssueDate,
                grace_days: 0,
                n_months: 1,
            },
            period_kind: PeriodKind::Month,
            platform_aliases: vec!["t104.0".into(), "t205".into(), "t205.0".into()],
            issue_date_required: true,
            allow_late_submission: false,
            late_submission_max_days: None,
            validity_start_mode: ValidityStartMode::IssueDate,
            active: true,
        }
    }

    fn permissive_rule() -> SubmissionRule {
        SubmissionRule {
            rule_id: RuleId::new("r1"),
            platform_key: PlatformKey::new("ctaima"),
            coord_label: None,
            scope: RuleScope::Global,
            enabled: true,
            match_criteria: MatchCriteria::default(),
            document_type_id: TypeId::from("T104_AUTONOMOS_RECEIPT"),
            form: FormSpec::default(),
        }
    }

    fn doc(company: &str, person: &str, period: &str, status: DocumentStatus) -> DocumentInstance {
        DocumentInstance {
            doc_id: DocId::new(),
            type_id: TypeId::from("T104_AUTONOMOS_RECEIPT"),
            scope: Scope::Worker,
            company_key: Some(company.into()),
            person_key: Some(person.into()),
            file_name_original: "recibo.pdf".into(),
            stored_path: "docs/x.pdf".into(),
            sha256: "deadbeef".into(),
            issued_at: None,
            extracted: ExtractedMeta::default(),
            period_kind: PeriodKind::Month,
            period_key: Some(period.into()),
            needs_period: false,
            computed_validity: ComputedValidity {
                valid_from: None,
                valid_to: None,
                confidence: 0.5,
                reasons: vec![],
            },
            validity_override: None,
            status,
        }
    }

    fn base_inputs<'a>(
        pending: &'a PendingRequirement,
        platform_key: &'a PlatformKey,
        types: &'a [DocumentType],
        documents: &'a [DocumentInstance],
        rules: &'a [SubmissionRule],
    ) -> MatchingInputs<'a> {
        MatchingInputs {
            pending,
            today: NaiveDate::from_ymd_opt(2023, 6, 1).unwrap(),
            platform_key,
            coord_label: None,
            requested_company_key: Some("ACME"),
            requested_person_key: Some("ERM001"),
            types,
            documents,
            rules,
            hints: &[],
            people: &[],
            period_bounds: None,
            file_exists: &|_| true,
            history_has_submitted: &|_| false,
            history_has_active_planned: &|_| false,
        }
    }

    #[test]
    fn match_ok_when_a_single_good_document_exists() {
        let pending = pending("t104.0", "recibo autonomos", "ACME SA", Some("2023-05"));
        let platform_key = PlatformKey::new("ctaima");
        let types = vec![autonomos_type()];
        let rules = vec![permissive_rule()];
        let documents = vec![doc("ACME", "ERM001", "2023-05", DocumentStatus::Reviewed)];
        let report = evaluate(&base_inputs(&pending, &platform_key, &types, &documents, &rules));
        assert_eq!(report.outcome.decision, Decision::AutoUpload);
        assert_eq!(report.outcome.primary_reason_code, ReasonCode::MatchOk);
    }

    #[test]
    fn no_local_match_when_no_alias_present() {
        let pending = pending("documento generico", "sin alias", "ACME SA", None);
        let platform_key = PlatformKey::new("ctaima");
        let types = vec![autonomos_type()];
        let rules = vec![permissive_rule()];
        let documents = vec![];
        let report = evaluate(&base_inputs(&pending, &platform_key, &types, &documents, &rules));
        assert_eq!(report.outcome.decision, Decision::NoMatch);
        assert_eq!(report.outcome.primary_reason_code, ReasonCode::NoLocalMatch);
    }

    #[test]
    fn missing_doc_for_period_when_type_matches_but_no_document_covers_it() {
        let pending = pending("t104.0", "recibo autonomos", "ACME SA", Some("2023-05"));
        let platform_key = PlatformKey::new("ctaima");
        let types = vec![autonomos_type()];
        let rules = vec![permissive_rule()];
        let documents = vec![doc("ACME", "ERM001", "2023-01", DocumentStatus::Reviewed)];
        let report = evaluate(&base_inputs(&pending, &platform_key, &types, &documents, &rules));
        assert_eq!(report.outcome.decision, Decision::ReviewRequired);
        assert_eq!(report.outcome.primary_reason_code, ReasonCode::MissingDocForPeriod);
    }

    #[test]
    fn missing_local_file_when_matched_doc_has_no_blob() {
        let pending = pending("t104.0", "recibo autonomos", "ACME SA", Some("2023-05"));
        let platform_key = PlatformKey::new("ctaima");
        let types = vec![autonomos_type()];
        let rules = vec![permissive_rule()];
        let documents = vec![doc("ACME", "ERM001", "2023-05", DocumentStatus::Reviewed)];
        let mut inputs = base_inputs(&pending, &platform_key, &types, &documents, &rules);
        inputs.file_exists = &|_| false;
        let report = evaluate(&inputs);
        assert_eq!(report.outcome.decision, Decision::ReviewRequired);
        assert_eq!(report.outcome.primary_reason_code, ReasonCode::MissingLocalFile);
    }

    #[test]
    fn ambiguous_match_when_top_two_scores_are_close() {
        let pending = pending("t104.0", "recibo autonomos", "ACME SA", Some("2023-05"));
        let platform_key = PlatformKey::new("ctaima");
        let types = vec![autonomos_type()];
        let rules = vec![permissive_rule()];
        let documents = vec![
            doc("ACME", "ERM001", "2023-05", DocumentStatus::Reviewed),
            doc("ACME", "ERM001", "2023-05", DocumentStatus::ReadyToSubmit),
        ];
        let report = evaluate(&base_inputs(&pending, &platform_key, &types, &documents, &rules));
        assert_eq!(report.outcome.decision, Decision::ReviewRequired);
        assert_eq!(report.outcome.primary_reason_code, ReasonCode::AmbiguousMatch);
    }

    #[test]
    fn skip_already_submitted_short_circuits_before_document_search() {
        let pending = pending("t104.0", "recibo autonomos", "ACME SA", Some("2023-05"));
        let platform_key = PlatformKey::new("ctaima");
        let types = vec![autonomos_type()];
        let rules = vec![permissive_rule()];
        let documents = vec![doc("ACME", "ERM001", "2023-05", DocumentStatus::Reviewed)];
        let mut inputs = base_inputs(&pending, &platform_key, &types, &documents, &rules);
        inputs.history_has_submitted = &|_| true;
        let report = evaluate(&inputs);
        assert_eq!(report.outcome.decision, Decision::Skip);
        assert_eq!(report.outcome.primary_reason_code, ReasonCode::SkipAlreadySubmitted);
    }

    #[test]
    fn type_inactive_yields_no_match_without_consulting_documents() {
        let pending = pending("t104.0", "recibo autonomos", "ACME SA", Some("2023-05"));
        let platform_key = PlatformKey::new("ctaima");
        let mut inactive = autonomos_type();
        inactive.active = false;
        let types = vec![inactive];
        let rules = vec![permissive_rule()];
        let documents = vec![doc("ACME", "ERM001", "2023-05", DocumentStatus::Reviewed)];
        let report = evaluate(&base_inputs(&pending, &platform_key, &types, &documents, &rules));
        assert_eq!(report.outcome.decision, Decision::NoMatch);
        assert_eq!(report.outcome.primary_reason_code, ReasonCode::TypeInactive);
    }

    #[test]
    fn policy_rejected_when_no_rule_applies_for_platform() {
        let pending = pending("t104.0", "recibo autonomos", "ACME SA", Some("2023-05"));
        let platform_key = PlatformKey::new("ctaima");
        let types = vec![autonomos_type()];
        let rules: Vec<SubmissionRule> = vec![];
        let documents = vec![doc("ACME", "ERM001", "2023-05", DocumentStatus::Reviewed)];
        let report = evaluate(&base_inputs(&pending, &platform_key, &types, &documents, &rules));
        assert_eq!(report.outcome.decision, Decision::ReviewRequired);
        assert_eq!(report.outcome.primary_reason_code, ReasonCode::PolicyRejected);
    }

    #[test]
    fn exact_hint_resolves_directly_at_full_confidence() {
        let pending = pending("t104.0", "recibo autonomos", "ACME SA", Some("2023-05"));
        let platform_key = PlatformKey::new("ctaima");
        let types = vec![autonomos_type()];
        let rules = vec![permissive_rule()];
        let matched_doc = doc("ACME", "ERM001", "2023-05", DocumentStatus::Draft);
        let documents = vec![matched_doc.clone()];
        let hint = LearnedHint {
            hint_id: cae_ids::HintId::new("h1"),
            item_fingerprint: "fp".into(),
            learned_mapping: cae_protocol::learning::LearnedMapping {
                type_id_expected: TypeId::from("T104_AUTONOMOS_RECEIPT"),
                local_doc_id: matched_doc.doc_id.clone(),
                local_doc_fingerprint: None,
            },
            conditions: cae_protocol::learning::HintConditions::default(),
            strength: HintStrength::Exact,
            disabled: false,
            source_decision_pack_id: cae_ids::DecisionPackId::new(),
        };
        let mut inputs = base_inputs(&pending, &platform_key, &types, &documents, &rules);
        inputs.hints = std::slice::from_ref(&hint);
        let report = evaluate(&inputs);
        assert_eq!(report.outcome.decision, Decision::AutoUpload);
        assert_eq!(report.outcome.applied_hints.len(), 1);
        assert_eq!(report.outcome.applied_hints[0].effect, HintEffect::Resolved);
    }
}
