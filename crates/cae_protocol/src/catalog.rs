//! The document type catalog: `DocumentType` and its `ValidityPolicy`.

use cae_ids::TypeId;
use serde::{Deserialize, Serialize};

/// Who a document class is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Company,
    Worker,
}

/// The temporal bucket a document class is submitted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodKind {
    None,
    Month,
    Quarter,
    Year,
}

/// Where `validity_start_date` is taken from on upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidityStartMode {
    IssueDate,
    Manual,
}

/// What a validity period is computed relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidityBasis {
    IssueDate,
    NameDate,
    Manual,
}

/// Declarative, deterministic validity rule. A sum type over the four
/// supported modes; each variant carries exactly the fields its mode
/// needs, so an `annual` policy can't accidentally be missing
/// `fixed_end_date` or vice versa.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ValidityPolicy {
    Monthly {
        basis: ValidityBasis,
        #[serde(default)]
        grace_days: u32,
        #[serde(default = "default_n_months")]
        n_months: u32,
    },
    Annual {
        basis: ValidityBasis,
        #[serde(default)]
        grace_days: u32,
        #[serde(default = "default_annual_months")]
        months: u32,
    },
    FixedEndDate {
        basis: ValidityBasis,
        #[serde(default)]
        grace_days: u32,
        date: chrono::NaiveDate,
    },
    None,
}

fn default_n_months() -> u32 {
    1
}

fn default_annual_months() -> u32 {
    12
}

impl ValidityPolicy {
    pub fn basis(&self) -> Option<ValidityBasis> {
        match self {
            ValidityPolicy::Monthly { basis, .. }
            | ValidityPolicy::Annual { basis, .. }
            | ValidityPolicy::FixedEndDate { basis, .. } => Some(*basis),
            ValidityPolicy::None => None,
        }
    }

    pub fn grace_days(&self) -> u32 {
        match self {
            ValidityPolicy::Monthly { grace_days, .. }
            | ValidityPolicy::Annual { grace_days, .. }
            | ValidityPolicy::FixedEndDate { grace_days, .. } => *grace_days,
            ValidityPolicy::None => 0,
        }
    }

    /// The `period_kind` a policy of this mode implies (§4.1.2).
    pub fn implied_period_kind(&self) -> PeriodKind {
        match self {
            ValidityPolicy::Monthly { .. } => PeriodKind::Month,
            ValidityPolicy::Annual { .. } => PeriodKind::Year,
            ValidityPolicy::FixedEndDate { .. } | ValidityPolicy::None => PeriodKind::None,
        }
    }
}

/// Catalog entry defining a class of documents.
///
/// Identity is `type_id`, which is stable once created; everything else
/// is mutable via catalog CRUD. Deletion is blocked at the repository
/// layer if any live instance still references the type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentType {
    pub type_id: TypeId,
    pub name: String,
    pub description: String,
    pub scope: Scope,
    pub validity_policy: ValidityPolicy,
    pub period_kind: PeriodKind,
    /// Normalized aliases used by the matching engine's alias search.
    pub platform_aliases: Vec<String>,
    pub issue_date_required: bool,
    pub allow_late_submission: bool,
    pub late_submission_max_days: Option<u32>,
    pub validity_start_mode: ValidityStartMode,
    pub active: bool,
}

impl DocumentType {
    /// Deep-copies every field except `type_id` and `name`, which the
    /// caller must supply — used by `duplicate_type` (§4.1, property 8)
    /// to avoid constructor collisions on the two fields that must be
    /// unique per copy.
    pub fn duplicated_as(&self, new_type_id: TypeId, new_name: String) -> Self {
        Self {
            type_id: new_type_id,
            name: new_name,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DocumentType {
        DocumentType {
            type_id: TypeId::from("T104_AUTONOMOS_RECEIPT"),
            name: "Autonomos receipt".into(),
            description: "".into(),
            scope: Scope::Worker,
            validity_policy: ValidityPolicy::Monthly {
                basis: ValidityBasis::IssueDate,
                grace_days: 0,
                n_months: 1,
            },
            period_kind: PeriodKind::Month,
            platform_aliases: vec!["t104.0".into(), "t205".into()],
            issue_date_required: true,
            allow_late_submission: false,
            late_submission_max_days: None,
            validity_start_mode: ValidityStartMode::IssueDate,
            active: true,
        }
    }

    #[test]
    fn duplicated_as_preserves_everything_but_identity_and_name() {
        let original = sample();
        let copy = original.duplicated_as(TypeId::from("T104_AUTONOMOS_RECEIPT_COPY"), "Autonomos receipt (copy)".into());
        assert_eq!(copy.type_id.as_str(), "T104_AUTONOMOS_RECEIPT_COPY");
        assert_eq!(copy.name, "Autonomos receipt (copy)");
        assert_eq!(copy.platform_aliases, original.platform_aliases);
        assert_eq!(copy.scope, original.scope);
    }

    #[test]
    fn monthly_policy_implies_month_period_kind() {
        assert_eq!(sample().validity_policy.implied_period_kind(), PeriodKind::Month);
    }
}
