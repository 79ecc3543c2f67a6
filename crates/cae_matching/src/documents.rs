//! Document search and scoring (§4.2 step 4): query the repository
//! snapshot by `{type_id, company_key, person_key, period_key?}`, with a
//! worker-scope fallback that drops `company_key`, then score survivors.

use cae_ids::TypeId;
use cae_protocol::catalog::{PeriodKind, Scope};
use cae_protocol::document::{DocumentInstance, DocumentStatus};
use cae_protocol::matching::CandidateDoc;
use chrono::NaiveDate;

const SCORE_TYPE_ALIAS: f64 = 0.6;
const SCORE_GOOD_STATUS: f64 = 0.3;
const SCORE_VALIDITY_COVERS_PERIOD: f64 = 0.2;
const SCORE_DRAFT_PENALTY: f64 = -0.2;

fn matches_subject(doc: &DocumentInstance, company_key: Option<&str>, person_key: Option<&str>, require_company: bool) -> bool {
    if require_company && doc.company_key.as_deref() != company_key {
        return false;
    }
    doc.person_key.as_deref() == person_key
}

fn validity_covers_period(doc: &DocumentInstance, period_start: Option<NaiveDate>, period_end: Option<NaiveDate>) -> bool {
    let (valid_from, valid_to) = doc.effective_validity();
    match (period_start, period_end, valid_from, valid_to) {
        (Some(ps), Some(pe), from, to) => {
            let after_from = from.map_or(true, |f| f <= pe);
            let before_to = to.map_or(true, |t| t >= ps);
            after_from && before_to
        }
        _ => false,
    }
}

fn score_doc(doc: &DocumentInstance, period_start: Option<NaiveDate>, period_end: Option<NaiveDate>) -> f64 {
    let mut score = SCORE_TYPE_ALIAS;
    match doc.status {
        DocumentStatus::Reviewed | DocumentStatus::ReadyToSubmit => score += SCORE_GOOD_STATUS,
        DocumentStatus::Draft => score += SCORE_DRAFT_PENALTY,
        DocumentStatus::Submitted | DocumentStatus::Expired => {}
    }
    if validity_covers_period(doc, period_start, period_end) {
        score += SCORE_VALIDITY_COVERS_PERIOD;
    }
    score
}

/// Search `documents` for candidates matching `type_id` and the resolved
/// scope, scoring each survivor. `period_key` is required for a match
/// when `period_kind != None` and a period was detected; `period_bounds`
/// supplies that period's `[start, end]` for the validity-coverage bonus.
#[allow(clippy::too_many_arguments)]
pub fn search_documents(
    documents: &[DocumentInstance],
    type_id: &TypeId,
    scope: Scope,
    company_key: Option<&str>,
    person_key: Option<&str>,
    period_kind: PeriodKind,
    period_key: Option<&str>,
    period_bounds: Option<(NaiveDate, NaiveDate)>,
    file_exists: &dyn Fn(&DocumentInstance) -> bool,
) -> Vec<CandidateDoc> {
    let period_required = period_kind != PeriodKind::None && period_key.is_some();

    let primary: Vec<&DocumentInstance> = documents
        .iter()
        .filter(|d| &d.type_id == type_id)
        .filter(|d| matches_subject(d, company_key, person_key, true))
        .filter(|d| !period_required || d.period_key.as_deref() == period_key)
        .collect();

    let pool: Vec<&DocumentInstance> = if primary.is_empty() && scope == Scope::Worker {
        documents
            .iter()
            .filter(|d| &d.type_id == type_id)
            .filter(|d| matches_subject(d, company_key, person_key, false))
            .filter(|d| !period_required || d.period_key.as_deref() == period_key)
            .collect()
    } else {
        primary
    };

    let (period_start, period_end) = period_bounds.map_or((None, None), |(s, e)| (Some(s), Some(e)));

    let mut candidates: Vec<CandidateDoc> = pool
        .iter()
        .map(|doc| {
            let exists = file_exists(doc);
            CandidateDoc {
                doc_id: doc.doc_id.clone(),
                confidence: score_doc(doc, period_start, period_end),
                filtered_out_reason: if exists { None } else { Some("missing_local_file".to_string()) },
            }
        })
        .collect();

    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    candidates
}
