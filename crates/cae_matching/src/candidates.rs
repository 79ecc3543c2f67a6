//! Type-candidate scoring (§4.2 step 2): aliases contained in the
//! normalized pending text, scored by how tightly the alias anchors the
//! text.

use cae_protocol::catalog::DocumentType;
use cae_protocol::matching::CandidateType;
use cae_security::normalize;

const SCORE_EXACT_START: f64 = 0.9;
const SCORE_LOOSE_START: f64 = 0.75;
const SCORE_CONTAINS: f64 = 0.6;
/// How many leading characters of the normalized text still count as
/// "the start" for the looser anchor (§4.2 step 2: "at start with
/// looser bounds").
const LOOSE_START_WINDOW: usize = 20;

/// Score one alias against the normalized text plus any already-detected
/// leading code, returning the best qualifying score.
fn score_alias(normalized_text: &str, detected_code: Option<&str>, alias: &str) -> Option<f64> {
    let alias = normalize(alias);
    if alias.is_empty() {
        return None;
    }
    if normalized_text.starts_with(&alias) {
        return Some(SCORE_EXACT_START);
    }
    if detected_code == Some(alias.as_str()) {
        return Some(SCORE_EXACT_START);
    }
    if let Some(pos) = normalized_text.find(&alias) {
        if pos <= LOOSE_START_WINDOW {
            return Some(SCORE_LOOSE_START);
        }
        return Some(SCORE_CONTAINS);
    }
    None
}

/// Built-in aliases for document types the spec names explicitly
/// (§4.2 step 2: "maintain a curated alias seed ... so these matchings
/// never require human setup"), keyed by `type_id`. Merged into
/// whatever the operator has configured on `DocumentType.platform_aliases`
/// rather than replacing it. This is production matching data, not the
/// fixture data a demo/test catalog loader seeds a workspace with.
fn curated_alias_seed(type_id: &str) -> &'static [&'static str] {
    match type_id {
        "T104_AUTONOMOS_RECEIPT" => &["t104.0", "t205", "t205.0", "cuota autonomos", "cuota de autonomos", "recibo autonomos"],
        _ => &[],
    }
}

/// Every `DocumentType` whose aliases (operator-configured or curated)
/// appear in `normalized_text`, each scored by its single best-matching
/// alias, sorted by descending confidence. Includes inactive types —
/// the caller decides what to do with an inactive top candidate.
pub fn score_type_candidates(types: &[DocumentType], normalized_text: &str, detected_code: Option<&str>) -> Vec<CandidateType> {
    let mut out = Vec::new();
    for type_ in types {
        let best = type_
            .platform_aliases
            .iter()
            .map(String::as_str)
            .chain(curated_alias_seed(type_.type_id.as_str()).iter().copied())
            .filter_map(|alias| score_alias(normalized_text, detected_code, alias).map(|score| (score, alias.to_string())))
            .max_by(|a, b| a.0.total_cmp(&b.0));
        if let Some((confidence, matched_alias)) = best {
            out.push(CandidateType {
                type_id: type_.type_id.clone(),
                confidence,
                matched_alias,
            });
        }
    }
    out.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use cae_ids::TypeId;
    use cae_protocol::catalog::{PeriodKind, Scope, ValidityBasis, ValidityPolicy, ValidityStartMode};

    fn type_with_aliases(id: &str, aliases: &[&str]) -> DocumentType {
        DocumentType {
            type_id: TypeId::from(id),
            name: id.to_string(),
            description: String::new(),
            scope: Scope::Worker,
            validity_policy: ValidityPolicy::Monthly {
                basis: ValidityBasis::IssueDate,
                grace_days: 0,
                n_months: 1,
            },
            period_kind: PeriodKind::Month,
            platform_aliases: aliases.iter().map(|a| a.to_string()).collect(),
            issue_date_required: true,
            allow_late_submission: false,
            late_submission_max_days: None,
            validity_start_mode: ValidityStartMode::IssueDate,
            active: true,
        }
    }

    #[test]
    fn exact_alias_at_start_scores_highest() {
        let types = vec![type_with_aliases("T104", &["t104.0", "t205"])];
        let candidates = score_type_candidates(&types, "t104.0 recibo autonomos acme", None);
        assert_eq!(candidates[0].confidence, SCORE_EXACT_START);
    }

    #[test]
    fn alias_found_deep_in_text_scores_lowest() {
        let types = vec![type_with_aliases("T104", &["autonomos"])];
        let text = "recibo de cuota mensual correspondiente al regimen de autonomos de la empresa acme";
        let candidates = score_type_candidates(&types, text, None);
        assert_eq!(candidates[0].confidence, SCORE_CONTAINS);
    }

    #[test]
    fn detected_code_equal_to_alias_counts_as_exact() {
        let types = vec![type_with_aliases("T205", &["t205.0"])];
        let candidates = score_type_candidates(&types, "documento generico sin alias al inicio t205.0", Some("t205.0"));
        assert_eq!(candidates[0].confidence, SCORE_EXACT_START);
    }

    #[test]
    fn no_candidate_when_no_alias_present() {
        let types = vec![type_with_aliases("T999", &["zzz_unrelated"])];
        let candidates = score_type_candidates(&types, "recibo autonomos acme", None);
        assert!(candidates.is_empty());
    }

    #[test]
    fn curated_seed_matches_the_canonical_autonomos_type_with_no_configured_aliases() {
        let types = vec![type_with_aliases("T104_AUTONOMOS_RECEIPT", &[])];
        let candidates = score_type_candidates(&types, "t205.0 ultimo recibo bancario pago cuota autonomos", None);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].type_id.as_str(), "T104_AUTONOMOS_RECEIPT");
    }

    #[test]
    fn best_alias_per_type_is_kept_even_if_a_worse_alias_also_matches() {
        let types = vec![type_with_aliases("T104", &["autonomos", "t104.0"])];
        let candidates = score_type_candidates(&types, "t104.0 recibo autonomos", None);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].confidence, SCORE_EXACT_START);
    }
}
