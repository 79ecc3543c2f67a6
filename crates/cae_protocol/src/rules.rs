//! `SubmissionRule`: declarative matching + form contract per portal.

use cae_ids::{PlatformKey, RuleId, TypeId};
use serde::{Deserialize, Serialize};

/// A rule's precedence scope. `Coord` overrides `Global` for the same
/// `(platform_key, document_type_id, coord_label)` (§3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleScope {
    Global,
    Coord,
}

/// Text-matching conditions against a normalized pending item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchCriteria {
    #[serde(default)]
    pub pending_text_contains: Vec<String>,
    #[serde(default)]
    pub empresa_contains: Vec<String>,
}

/// Selectors needed to drive the upload form for this rule's document
/// type on this platform.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormSpec {
    pub upload_field_selector: String,
    pub date_fields: Vec<DateFieldSpec>,
    pub submit_button_selector: String,
    /// Text fragments that, once present after submit, count as
    /// confirmation evidence (§4.3.6 step 5).
    pub confirmation_text_patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateFieldSpec {
    pub selector: String,
    pub source: DateFieldSource,
}

/// Which resolved validity date a form date field is filled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFieldSource {
    ValidFrom,
    ValidTo,
    IssuedAt,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRule {
    pub rule_id: RuleId,
    pub platform_key: PlatformKey,
    pub coord_label: Option<String>,
    pub scope: RuleScope,
    pub enabled: bool,
    #[serde(rename = "match")]
    pub match_criteria: MatchCriteria,
    pub document_type_id: TypeId,
    pub form: FormSpec,
}

impl SubmissionRule {
    /// The precedence key rules are grouped by (§3.1): a `Coord` rule
    /// overrides a `Global` rule sharing this tuple.
    pub fn precedence_key(&self) -> (PlatformKey, TypeId, Option<String>) {
        (
            self.platform_key.clone(),
            self.document_type_id.clone(),
            self.coord_label.clone(),
        )
    }

    /// Pick the applicable rule from a candidate set: `Coord` beats
    /// `Global` for the same precedence key; a disabled `Coord` rule
    /// falls back to `Global` (property 5).
    pub fn select_applicable<'a>(candidates: &'a [SubmissionRule]) -> Option<&'a SubmissionRule> {
        candidates
            .iter()
            .filter(|r| r.enabled)
            .max_by_key(|r| matches!(r.scope, RuleScope::Coord))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(scope: RuleScope, enabled: bool) -> SubmissionRule {
        SubmissionRule {
            rule_id: RuleId::new("r1"),
            platform_key: PlatformKey::new("ctaima"),
            coord_label: Some("COORD_A".into()),
            scope,
            enabled,
            match_criteria: MatchCriteria::default(),
            document_type_id: TypeId::from("T104_AUTONOMOS_RECEIPT"),
            form: FormSpec::default(),
        }
    }

    #[test]
    fn coord_overrides_global() {
        let rules = vec![rule(RuleScope::Global, true), rule(RuleScope::Coord, true)];
        let selected = SubmissionRule::select_applicable(&rules).unwrap();
        assert_eq!(selected.scope, RuleScope::Coord);
    }

    #[test]
    fn disabled_coord_falls_back_to_global() {
        let rules = vec![rule(RuleScope::Global, true), rule(RuleScope::Coord, false)];
        let selected = SubmissionRule::select_applicable(&rules).unwrap();
        assert_eq!(selected.scope, RuleScope::Global);
    }
}
