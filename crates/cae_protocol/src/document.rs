//! `DocumentInstance`: a concrete document held in the repository.

use cae_ids::{DocId, TypeId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::catalog::Scope;

/// Lifecycle state of a held document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Draft,
    Reviewed,
    ReadyToSubmit,
    Submitted,
    Expired,
}

/// Derived on read, never persisted unverified (§3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidityStatus {
    Valid,
    ExpiringSoon,
    Expired,
    Unknown,
}

/// Dates recovered from the document's content or filename, as opposed
/// to dates declared explicitly by the uploader.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedMeta {
    pub validity_start_date: Option<NaiveDate>,
    pub name_date: Option<NaiveDate>,
}

/// Output of the Validity Calculator (§4.1.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputedValidity {
    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,
    /// In `[0, 1]`.
    pub confidence: f64,
    pub reasons: Vec<String>,
}

impl ComputedValidity {
    pub fn unknown(reasons: Vec<String>) -> Self {
        Self {
            valid_from: None,
            valid_to: None,
            confidence: 0.0,
            reasons,
        }
    }
}

/// A human override that replaces `computed_validity` for every consumer
/// while present (§3.1, scenario S5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidityOverride {
    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,
    pub reason: String,
}

/// A concrete document held in the repository.
///
/// Invariants (enforced by `cae_repository`, not by this type alone):
/// `scope=company` implies `company_key` set and `person_key` null;
/// `scope=worker` implies both set; `period_kind=none` iff `period_key`
/// is null.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInstance {
    pub doc_id: DocId,
    pub type_id: TypeId,
    pub scope: Scope,
    pub company_key: Option<String>,
    pub person_key: Option<String>,

    pub file_name_original: String,
    /// Relative to the repository root.
    pub stored_path: String,
    pub sha256: String,

    pub issued_at: Option<NaiveDate>,
    pub extracted: ExtractedMeta,
    pub period_kind: crate::catalog::PeriodKind,
    pub period_key: Option<String>,
    pub needs_period: bool,

    pub computed_validity: ComputedValidity,
    pub validity_override: Option<ValidityOverride>,

    pub status: DocumentStatus,
}

impl DocumentInstance {
    /// The validity a consumer should actually use: the override when
    /// present, otherwise the computed value.
    pub fn effective_validity(&self) -> (Option<NaiveDate>, Option<NaiveDate>) {
        if let Some(ov) = &self.validity_override {
            (ov.valid_from.or(self.computed_validity.valid_from), ov.valid_to.or(self.computed_validity.valid_to))
        } else {
            (self.computed_validity.valid_from, self.computed_validity.valid_to)
        }
    }

    /// `validity_status` and `days_until_expiry`, derived fresh on every
    /// read against the supplied "today" — never cached on the struct.
    pub fn validity_status(&self, today: NaiveDate, expiring_soon_days: i64) -> (ValidityStatus, Option<i64>) {
        let (_, valid_to) = self.effective_validity();
        match valid_to {
            None => (ValidityStatus::Unknown, None),
            Some(to) => {
                let days = (to - today).num_days();
                let status = if days < 0 {
                    ValidityStatus::Expired
                } else if days <= expiring_soon_days {
                    ValidityStatus::ExpiringSoon
                } else {
                    ValidityStatus::Valid
                };
                (status, Some(days))
            }
        }
    }
}
