//! Policy evaluator (§4.5.1): turns one `MatchingDebugReport` into the
//! closed `{decision, reason_code, reason, confidence, local_doc_ref}`
//! tuple a plan item carries. Pure function of its input, same as the
//! matching engine it sits on top of.

use cae_ids::DocId;
use cae_protocol::matching::{Decision, MatchingDebugReport, ReasonCode};

#[derive(Debug, Clone)]
pub struct PolicyDecision {
    pub decision: Decision,
    pub reason_code: ReasonCode,
    pub reason: String,
    pub confidence: f64,
    pub local_doc_ref: Option<DocId>,
}

fn default_reason(code: ReasonCode) -> &'static str {
    match code {
        ReasonCode::MatchOk => "matched a local document covering the pending period",
        ReasonCode::NoLocalMatch => "no document type alias matched the pending text",
        ReasonCode::MissingDocForPeriod => "a document type matched, but no local document covers this period",
        ReasonCode::MissingLocalFile => "the matched document has no file on disk",
        ReasonCode::AmbiguousMatch => "top two candidate documents scored within the ambiguity margin",
        ReasonCode::ScopeMismatch => "pending subject did not resolve against the requested scope",
        ReasonCode::TypeInactive => "the matched document type is inactive",
        ReasonCode::PolicyRejected => "no enabled submission rule applies",
        ReasonCode::SkipAlreadySubmitted => "a prior submitted history record already covers this fingerprint",
        ReasonCode::SkipAlreadyPlanned => "a prior planned history record already covers this fingerprint",
        ReasonCode::FingerprintCollision => "fingerprint collision detected",
        ReasonCode::Unknown => "unknown",
    }
}

/// `evaluate_upload_policy` (§4.5.1): folds the matching engine's
/// outcome into a plan-item decision. The engine already picked the
/// decision and primary reason code (§4.2 step 9); this function's job
/// is to carry that choice forward with a human-readable reason and
/// the confidence/local_doc_ref a plan consumer needs, without
/// re-deriving anything the engine already decided.
pub fn evaluate_upload_policy(debug: &MatchingDebugReport) -> PolicyDecision {
    let reason_code = debug.outcome.primary_reason_code;
    let reason = debug.outcome.human_hint.clone().unwrap_or_else(|| default_reason(reason_code).to_string());
    let best = debug.candidate_docs.first();
    let confidence = match debug.outcome.decision {
        Decision::AutoUpload => best.map(|d| d.confidence).unwrap_or(1.0),
        _ => best.map(|d| d.confidence).unwrap_or(0.0),
    };
    let local_doc_ref = if debug.outcome.decision == Decision::AutoUpload {
        best.map(|d| d.doc_id.clone())
    } else {
        None
    };
    PolicyDecision {
        decision: debug.outcome.decision,
        reason_code,
        reason,
        confidence,
        local_doc_ref,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cae_ids::{DocId, TypeId};
    use cae_protocol::matching::{CandidateDoc, InputsSnapshot, MatchOutcome};

    fn report(decision: Decision, reason_code: ReasonCode, docs: Vec<CandidateDoc>, human_hint: Option<String>) -> MatchingDebugReport {
        MatchingDebugReport {
            inputs: InputsSnapshot {
                normalized_text: "t104 recibo".into(),
                detected_code: Some("T104".into()),
                detected_period_key: Some("2026-06".into()),
                detected_dni: None,
            },
            candidate_types: Vec::new(),
            candidate_docs: docs,
            applied_hints: Vec::new(),
            outcome: MatchOutcome {
                decision,
                local_docs_considered: 1,
                primary_reason_code: reason_code,
                human_hint,
                applied_hints: Vec::new(),
                fingerprint: Some("fp".into()),
            },
        }
    }

    #[test]
    fn auto_upload_carries_best_candidate_as_local_doc_ref() {
        let doc_id = DocId::new();
        let debug = report(
            Decision::AutoUpload,
            ReasonCode::MatchOk,
            vec![CandidateDoc { doc_id: doc_id.clone(), confidence: 0.97, filtered_out_reason: None }],
            None,
        );
        let policy = evaluate_upload_policy(&debug);
        assert_eq!(policy.decision, Decision::AutoUpload);
        assert_eq!(policy.local_doc_ref, Some(doc_id));
        assert!((policy.confidence - 0.97).abs() < f64::EPSILON);
        assert!(policy.reason.contains("matched a local document"));
    }

    #[test]
    fn no_match_never_carries_a_local_doc_ref() {
        let debug = report(Decision::NoMatch, ReasonCode::NoLocalMatch, Vec::new(), None);
        let policy = evaluate_upload_policy(&debug);
        assert_eq!(policy.local_doc_ref, None);
        assert_eq!(policy.confidence, 0.0);
    }

    #[test]
    fn human_hint_overrides_the_default_reason_text() {
        let _ = TypeId::from("T104");
        let debug = report(Decision::ReviewRequired, ReasonCode::AmbiguousMatch, Vec::new(), Some("two docs tied at 0.81".into()));
        let policy = evaluate_upload_policy(&debug);
        assert_eq!(policy.reason, "two docs tied at 0.81");
    }
}
