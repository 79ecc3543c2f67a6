//! Text detection over a pending item's normalized free text (§4.2 step
//! 1): a leading document code, a Spanish/ISO month-year token, and a
//! Spanish DNI. Distinct from `cae_repository::period`'s filename-based
//! inference — this operates on portal-scraped prose, not filenames.

use std::sync::OnceLock;

use regex::Regex;

use cae_security::normalize;

fn code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([a-z]\d{2,4}(?:\.\d+)?)\b").expect("valid regex"))
}

/// A leading alphanumeric code like `T205.0` or `t104`, lowercased.
pub fn detect_code(normalized_text: &str) -> Option<String> {
    code_re().captures(normalized_text).map(|c| c[1].to_string())
}

fn dni_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{8}[a-z])\b").expect("valid regex"))
}

/// A Spanish DNI (8 digits + check letter), lowercased.
pub fn detect_dni(normalized_text: &str) -> Option<String> {
    dni_re().captures(normalized_text).map(|c| c[1].to_string())
}

const SPANISH_MONTHS: &[(&str, u32)] = &[
    ("enero", 1),
    ("ene", 1),
    ("febrero", 2),
    ("feb", 2),
    ("marzo", 3),
    ("mar", 3),
    ("abril", 4),
    ("abr", 4),
    ("mayo", 5),
    ("may", 5),
    ("junio", 6),
    ("jun", 6),
    ("julio", 7),
    ("jul", 7),
    ("agosto", 8),
    ("ago", 8),
    ("septiembre", 9),
    ("setiembre", 9),
    ("sep", 9),
    ("octubre", 10),
    ("oct", 10),
    ("noviembre", 11),
    ("nov", 11),
    ("diciembre", 12),
    ("dic", 12),
];

fn iso_period_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(20\d{2})[-/](\d{1,2})\b").expect("valid regex"))
}

fn spanish_month_word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let months = SPANISH_MONTHS.iter().map(|(name, _)| *name).collect::<Vec<_>>().join("|");
        Regex::new(&format!(r"\b({months})\b.{{0,6}}\b(20\d{{2}}|\d{{2}})\b")).expect("valid regex")
    })
}

/// A `YYYY-MM` period token detected in free text, Spanish or ISO.
pub fn detect_period_key(normalized_text: &str) -> Option<String> {
    if let Some(caps) = iso_period_re().captures(normalized_text) {
        let year: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        if (1..=12).contains(&month) {
            return Some(format!("{year:04}-{month:02}"));
        }
    }
    if let Some(caps) = spanish_month_word_re().captures(normalized_text) {
        let month = SPANISH_MONTHS.iter().find(|(name, _)| *name == &caps[1]).map(|(_, m)| *m)?;
        let raw_year = &caps[2];
        let year: u32 = raw_year.parse().ok()?;
        let year = if raw_year.len() == 4 { year } else { 2000 + year };
        return Some(format!("{year:04}-{month:02}"));
    }
    None
}

/// Join and normalize a pending item's free-text fields (§4.2 step 1).
pub fn normalize_pending_text(tipo_doc: &str, elemento: &str, empresa: &str) -> String {
    normalize(&format!("{tipo_doc} {elemento} {empresa}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_leading_code_with_decimal_suffix() {
        assert_eq!(detect_code("t205.0 recibo autonomos"), Some("t205.0".to_string()));
    }

    #[test]
    fn detects_leading_code_without_suffix() {
        assert_eq!(detect_code("t104 recibo"), Some("t104".to_string()));
    }

    #[test]
    fn no_code_when_text_does_not_start_with_one() {
        assert_eq!(detect_code("recibo t104"), None);
    }

    #[test]
    fn detects_dni() {
        assert_eq!(detect_dni("trabajador 12345678z acme sa"), Some("12345678z".to_string()));
    }

    #[test]
    fn detects_iso_period() {
        assert_eq!(detect_period_key("recibo periodo 2023-05 autonomos"), Some("2023-05".to_string()));
    }

    #[test]
    fn detects_spanish_month_abbreviation_with_two_digit_year() {
        assert_eq!(detect_period_key("recibo mar 23 autonomos"), Some("2023-03".to_string()));
    }

    #[test]
    fn detects_spanish_full_month_with_four_digit_year() {
        assert_eq!(detect_period_key("recibo marzo 2023 autonomos"), Some("2023-03".to_string()));
    }

    #[test]
    fn no_period_without_reliable_token() {
        assert_eq!(detect_period_key("recibo autonomos sin fecha"), None);
    }
}
