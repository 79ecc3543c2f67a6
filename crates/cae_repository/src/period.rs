//! Period Planner (§4.1.2): period-kind derivation, the expected-periods
//! series for a horizon, period-vs-document status, and period-key
//! inference from filename patterns. Locale is fixed to Spanish full
//! month names and 3-letter abbreviations, the one portal family this
//! crate targets — no other locale is attempted.

use cae_protocol::catalog::PeriodKind;
use cae_protocol::document::DocumentInstance;
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodStatus {
    Available,
    Late,
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedPeriod {
    pub period_key: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
}

/// Emit the sorted series of periods covering the last `months_back`
/// months (inclusive of the current month), per `period_kind`.
pub fn expected_periods(period_kind: PeriodKind, today: NaiveDate, months_back: u32) -> Vec<ExpectedPeriod> {
    match period_kind {
        PeriodKind::None => Vec::new(),
        PeriodKind::Month => monthly_series(today, months_back),
        PeriodKind::Quarter => quarterly_series(today, months_back),
        PeriodKind::Year => yearly_series(today, months_back),
    }
}

fn monthly_series(today: NaiveDate, months_back: u32) -> Vec<ExpectedPeriod> {
    let mut out = Vec::new();
    for offset in (0..=months_back).rev() {
        let total = today.year() * 12 + today.month0() as i32 - offset as i32;
        let year = total.div_euclid(12);
        let month = (total.rem_euclid(12) as u32) + 1;
        let start = NaiveDate::from_ymd_opt(year, month, 1).expect("valid month");
        let end = last_day_of_month(year, month);
        out.push(ExpectedPeriod {
            period_key: format!("{year:04}-{month:02}"),
            period_start: start,
            period_end: end,
        });
    }
    out
}

fn quarterly_series(today: NaiveDate, months_back: u32) -> Vec<ExpectedPeriod> {
    let quarters_back = months_back / 3 + 1;
    let current_quarter = (today.month0() / 3) as i32;
    let mut out = Vec::new();
    for offset in (0..quarters_back).rev() {
        let total = today.year() * 4 + current_quarter - offset as i32;
        let year = total.div_euclid(4);
        let quarter = total.rem_euclid(4);
        let start_month = quarter as u32 * 3 + 1;
        let start = NaiveDate::from_ymd_opt(year, start_month, 1).expect("valid month");
        let end = last_day_of_month(year, start_month + 2);
        out.push(ExpectedPeriod {
            period_key: format!("{year:04}-Q{}", quarter + 1),
            period_start: start,
            period_end: end,
        });
    }
    out
}

fn yearly_series(today: NaiveDate, months_back: u32) -> Vec<ExpectedPeriod> {
    let years_back = months_back / 12 + 1;
    let mut out = Vec::new();
    for offset in (0..years_back).rev() {
        let year = today.year() - offset as i32;
        out.push(ExpectedPeriod {
            period_key: format!("{year:04}"),
            period_start: NaiveDate::from_ymd_opt(year, 1, 1).expect("valid month"),
            period_end: NaiveDate::from_ymd_opt(year, 12, 31).expect("valid month"),
        });
    }
    out
}

fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .expect("valid month");
    next - chrono::Duration::days(1)
}

/// Status of one expected period against the document instances already
/// filtered to that period (same `type_id`, subject, period_key).
pub fn status_of_period(period_end: NaiveDate, grace_days: i64, docs_subset: &[&DocumentInstance], today: NaiveDate) -> PeriodStatus {
    let has_instance = !docs_subset.is_empty();
    if !has_instance {
        return PeriodStatus::Missing;
    }
    let not_expired = docs_subset.iter().any(|doc| {
        let (_, valid_to) = doc.effective_validity();
        valid_to.map(|valid_to| today <= valid_to).unwrap_or(true)
    });
    if not_expired {
        return PeriodStatus::Available;
    }
    if today <= period_end + chrono::Duration::days(grace_days) {
        PeriodStatus::Available
    } else {
        PeriodStatus::Late
    }
}

fn iso_year_month_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?P<year>20\d{2})[-_](?P<month>0[1-9]|1[0-2])").expect("valid regex"))
}

fn spanish_month_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?P<day>\d{1,2})[-_ ](?P<month>ene|feb|mar|abr|may|jun|jul|ago|sep|oct|nov|dic)[a-z]*[-_ ](?P<year>\d{2,4})")
            .expect("valid regex")
    })
}

fn spanish_month_number(abbrev: &str) -> Option<u32> {
    match abbrev.to_lowercase().as_str() {
        "ene" => Some(1),
        "feb" => Some(2),
        "mar" => Some(3),
        "abr" => Some(4),
        "may" => Some(5),
        "jun" => Some(6),
        "jul" => Some(7),
        "ago" => Some(8),
        "sep" => Some(9),
        "oct" => Some(10),
        "nov" => Some(11),
        "dic" => Some(12),
        _ => None,
    }
}

fn normalize_two_digit_year(raw: &str) -> Option<i32> {
    let n: i32 = raw.parse().ok()?;
    if raw.len() == 4 {
        Some(n)
    } else {
        Some(2000 + n)
    }
}

/// Infer a `YYYY-MM` period key from declared dates first, then by
/// regex extraction from the filename: `YYYY-MM`, then Spanish
/// `dd-MMM-YY`. Returns `None` if nothing reliable is found — never
/// guesses.
pub fn infer_period_key(issue_date: Option<NaiveDate>, name_date: Option<NaiveDate>, filename: Option<&str>) -> Option<String> {
    if let Some(date) = issue_date.or(name_date) {
        return Some(format!("{:04}-{:02}", date.year(), date.month()));
    }
    let filename = filename?;
    if let Some(caps) = iso_year_month_re().captures(filename) {
        let year = &caps["year"];
        let month = &caps["month"];
        return Some(format!("{year}-{month}"));
    }
    if let Some(caps) = spanish_month_re().captures(filename) {
        let month = spanish_month_number(&caps["month"])?;
        let year = normalize_two_digit_year(&caps["year"])?;
        return Some(format!("{year:04}-{month:02}"));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monthly_series_covers_requested_horizon_inclusive() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        let series = expected_periods(PeriodKind::Month, today, 2);
        let keys: Vec<_> = series.iter().map(|p| p.period_key.clone()).collect();
        assert_eq!(keys, vec!["2026-01", "2026-02", "2026-03"]);
    }

    #[test]
    fn quarterly_series_spans_quarter_boundaries() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 10).unwrap();
        let series = expected_periods(PeriodKind::Quarter, today, 3);
        assert_eq!(series.last().unwrap().period_key, "2026-Q1");
        assert_eq!(series.first().unwrap().period_key, "2025-Q4");
    }

    #[test]
    fn infer_period_key_prefers_declared_dates_over_filename() {
        let date = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
        let key = infer_period_key(Some(date), None, Some("recibo-ene-2026.pdf"));
        assert_eq!(key, Some("2026-04".to_string()));
    }

    #[test]
    fn infer_period_key_extracts_iso_year_month_from_filename() {
        let key = infer_period_key(None, None, Some("recibo_2026-02_contrib.pdf"));
        assert_eq!(key, Some("2026-02".to_string()));
    }

    #[test]
    fn infer_period_key_extracts_spanish_month_abbreviation() {
        let key = infer_period_key(None, None, Some("comprobante-15-mar-26.pdf"));
        assert_eq!(key, Some("2026-03".to_string()));
    }

    #[test]
    fn infer_period_key_returns_none_without_reliable_signal() {
        let key = infer_period_key(None, None, Some("documento_final.pdf"));
        assert_eq!(key, None);
    }
}
