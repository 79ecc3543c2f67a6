//! Deterministic validity calculation (§4.1.1). Pure function of a
//! policy and the metadata available on a document; never panics, never
//! reads the clock — "today" for downstream status checks is injected
//! by the caller.

use cae_protocol::catalog::{ValidityBasis, ValidityPolicy};
use cae_protocol::document::{ComputedValidity, ExtractedMeta};
use chrono::{Datelike, NaiveDate};

fn pick_base(basis: ValidityBasis, issued_at: Option<NaiveDate>, extracted: &ExtractedMeta) -> Option<NaiveDate> {
    match basis {
        ValidityBasis::IssueDate => issued_at.or(extracted.validity_start_date),
        ValidityBasis::NameDate => extracted.name_date,
        ValidityBasis::Manual => extracted.validity_start_date,
    }
}

/// Shift `date` forward by `months`, clamping the day-of-month so e.g.
/// Jan 31 + 1 month lands on Feb 28/29 rather than overflowing.
fn add_months(date: NaiveDate, months: i32) -> NaiveDate {
    let (year, month0) = shifted_year_month0(date, months);
    let day = date.day();
    let last_day = last_day_of_month(year, month0 + 1);
    NaiveDate::from_ymd_opt(year, month0 + 1, 1)
        .expect("valid month")
        .with_day(day.min(last_day))
        .expect("clamped day is valid")
}

/// The first day of the month `months` after `date`'s month.
fn first_day_of_month_after(date: NaiveDate, months: i32) -> NaiveDate {
    let (year, month0) = shifted_year_month0(date, months);
    NaiveDate::from_ymd_opt(year, month0 + 1, 1).expect("valid month")
}

fn shifted_year_month0(date: NaiveDate, months: i32) -> (i32, u32) {
    let total = date.year() * 12 + (date.month0() as i32) + months;
    (total.div_euclid(12), total.rem_euclid(12) as u32)
}

fn last_day_of_month(year: i32, month: u32) -> u32 {
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .expect("valid month");
    let first = NaiveDate::from_ymd_opt(year, month, 1).expect("valid month");
    (next - first).num_days() as u32
}

/// Compute `valid_from`/`valid_to`/`confidence`/`reasons` for a policy
/// applied to a document's declared issue date and extracted metadata,
/// per §4.1.1.
pub fn compute_validity(policy: &ValidityPolicy, issued_at: Option<NaiveDate>, extracted: &ExtractedMeta) -> ComputedValidity {
    if matches!(policy, ValidityPolicy::None) {
        return ComputedValidity {
            valid_from: None,
            valid_to: None,
            confidence: 1.0,
            reasons: Vec::new(),
        };
    }

    let basis = policy.basis().expect("non-None policy always carries a basis");
    let Some(base) = pick_base(basis, issued_at, extracted) else {
        return ComputedValidity::unknown(vec![format!("no value available for basis {basis:?}")]);
    };

    let mut confidence: f64 = 0.4;

    let valid_to_before_grace = match policy {
        ValidityPolicy::Monthly { n_months, .. } => {
            confidence += 0.3;
            Some(first_day_of_month_after(base, *n_months as i32) - chrono::Duration::days(1))
        }
        ValidityPolicy::Annual { months, .. } => {
            confidence += 0.3;
            Some(add_months(base, *months as i32))
        }
        ValidityPolicy::FixedEndDate { date, .. } => {
            confidence += 0.3;
            Some(*date)
        }
        ValidityPolicy::None => None,
    };

    confidence += 0.3;
    let confidence = confidence.min(1.0);

    let grace_days = policy.grace_days();
    let valid_to = valid_to_before_grace.map(|d| d + chrono::Duration::days(grace_days as i64));

    ComputedValidity {
        valid_from: Some(base),
        valid_to,
        confidence,
        reasons: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cae_protocol::catalog::ValidityPolicy;

    fn extracted_with(name_date: Option<NaiveDate>) -> ExtractedMeta {
        ExtractedMeta {
            validity_start_date: None,
            name_date,
        }
    }

    #[test]
    fn monthly_policy_ends_at_last_day_of_nth_month() {
        let policy = ValidityPolicy::Monthly {
            basis: ValidityBasis::IssueDate,
            grace_days: 0,
            n_months: 1,
        };
        let issued_at = Some(NaiveDate::from_ymd_opt(2026, 1, 15).unwrap());
        let computed = compute_validity(&policy, issued_at, &ExtractedMeta::default());
        assert_eq!(computed.valid_to, Some(NaiveDate::from_ymd_opt(2026, 1, 31).unwrap()));
        assert_eq!(computed.confidence, 1.0);
    }

    #[test]
    fn grace_days_extend_valid_to() {
        let policy = ValidityPolicy::Monthly {
            basis: ValidityBasis::IssueDate,
            grace_days: 5,
            n_months: 1,
        };
        let issued_at = Some(NaiveDate::from_ymd_opt(2026, 1, 15).unwrap());
        let computed = compute_validity(&policy, issued_at, &ExtractedMeta::default());
        assert_eq!(computed.valid_to, Some(NaiveDate::from_ymd_opt(2026, 2, 5).unwrap()));
    }

    #[test]
    fn annual_policy_adds_whole_years_via_month_arithmetic() {
        let policy = ValidityPolicy::Annual {
            basis: ValidityBasis::IssueDate,
            grace_days: 0,
            months: 12,
        };
        let issued_at = Some(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        let computed = compute_validity(&policy, issued_at, &ExtractedMeta::default());
        assert_eq!(computed.valid_to, Some(NaiveDate::from_ymd_opt(2025, 2, 28).unwrap()));
    }

    #[test]
    fn name_date_basis_reads_from_extracted_metadata() {
        let policy = ValidityPolicy::Monthly {
            basis: ValidityBasis::NameDate,
            grace_days: 0,
            n_months: 1,
        };
        let extracted = extracted_with(Some(NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()));
        let computed = compute_validity(&policy, None, &extracted);
        assert_eq!(computed.valid_from, Some(NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()));
    }

    #[test]
    fn manual_basis_reads_the_uploader_declared_start_date() {
        let policy = ValidityPolicy::Monthly {
            basis: ValidityBasis::Manual,
            grace_days: 0,
            n_months: 1,
        };
        let extracted = ExtractedMeta {
            validity_start_date: Some(NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()),
            name_date: None,
        };
        let computed = compute_validity(&policy, None, &extracted);
        assert_eq!(computed.valid_from, Some(NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()));
        assert_eq!(computed.confidence, 1.0);
    }

    #[test]
    fn missing_base_yields_zero_confidence_and_reasons() {
        let policy = ValidityPolicy::Monthly {
            basis: ValidityBasis::IssueDate,
            grace_days: 0,
            n_months: 1,
        };
        let computed = compute_validity(&policy, None, &ExtractedMeta::default());
        assert_eq!(computed.confidence, 0.0);
        assert!(!computed.reasons.is_empty());
    }

    #[test]
    fn none_policy_has_no_validity_window_but_full_confidence() {
        let computed = compute_validity(&ValidityPolicy::None, None, &ExtractedMeta::default());
        assert_eq!(computed.valid_from, None);
        assert_eq!(computed.valid_to, None);
        assert_eq!(computed.confidence, 1.0);
    }
}
