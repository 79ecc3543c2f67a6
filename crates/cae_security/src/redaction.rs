//! Evidence redaction (§6.3): HTML and DOM snapshots are redacted for
//! tokens, DNI, emails, and passwords before being persisted, when
//! enabled by policy.

use serde_json::Value;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedactionMode {
    None,
    Truncate,
    #[default]
    Hash,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RedactionPolicy {
    pub mode: RedactionMode,
    pub max_value_length: usize,
    pub hash_prefix_length: usize,
}

impl Default for RedactionPolicy {
    fn default() -> Self {
        Self {
            mode: RedactionMode::Hash,
            max_value_length: 64,
            hash_prefix_length: 8,
        }
    }
}

/// Patterns in a DOM field name (or, for HTML, a surrounding attribute)
/// that mark a value as sensitive enough to redact.
const SENSITIVE_PATTERNS: &[&str] = &[
    "password", "passwd", "pwd", "secret", "token", "auth", "credential", "dni", "nif", "ssn",
    "email", "e-mail", "phone", "telefono", "cookie", "session", "csrf",
];

pub fn is_sensitive_field(name: &str) -> bool {
    let lower = name.to_lowercase();
    SENSITIVE_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Apply redaction to a single JSON value (a DOM snapshot field) based
/// on policy.
pub fn redact_value(value: &Value, policy: &RedactionPolicy) -> Value {
    match policy.mode {
        RedactionMode::None => value.clone(),
        RedactionMode::Truncate => truncate_value(value, policy.max_value_length),
        RedactionMode::Hash => hash_value(value, policy.hash_prefix_length),
    }
}

fn truncate_value(value: &Value, max_length: usize) -> Value {
    match value {
        Value::String(s) => {
            if s.chars().count() <= max_length {
                value.clone()
            } else {
                let truncated: String = s.chars().take(max_length).collect();
                Value::String(format!("{truncated}..."))
            }
        }
        Value::Array(arr) => Value::Array(arr.iter().map(|v| truncate_value(v, max_length)).collect()),
        Value::Object(obj) => {
            let mut out = serde_json::Map::new();
            for (k, v) in obj.iter() {
                out.insert(k.clone(), truncate_value(v, max_length));
            }
            Value::Object(out)
        }
        _ => value.clone(),
    }
}

fn hash_value(value: &Value, prefix_length: usize) -> Value {
    match value {
        Value::String(s) => Value::String(format!("[redacted:{}]", &compute_hash(s)[..prefix_length.min(64)])),
        Value::Number(n) => Value::String(format!("[redacted:{}]", &compute_hash(&n.to_string())[..prefix_length.min(64)])),
        Value::Array(arr) => Value::Array(arr.iter().map(|v| hash_value(v, prefix_length)).collect()),
        Value::Object(obj) => {
            let mut out = serde_json::Map::new();
            for (k, v) in obj.iter() {
                out.insert(k.clone(), hash_value(v, prefix_length));
            }
            Value::Object(out)
        }
        Value::Bool(_) | Value::Null => value.clone(),
    }
}

fn compute_hash(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    hex::encode(hasher.finalize())
}

/// Selectively redact a DOM snapshot object, leaving non-sensitive
/// fields (the common case — most of a snapshot is layout structure,
/// not user data) untouched.
pub fn redact_dom_snapshot(snapshot: &Value, policy: &RedactionPolicy) -> Value {
    match snapshot {
        Value::Object(obj) => {
            let mut out = serde_json::Map::new();
            for (k, v) in obj.iter() {
                if is_sensitive_field(k) {
                    out.insert(k.clone(), redact_value(v, policy));
                } else {
                    out.insert(k.clone(), redact_dom_snapshot(v, policy));
                }
            }
            Value::Object(out)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(|v| redact_dom_snapshot(v, policy)).collect()),
        other => other.clone(),
    }
}

/// Redact emails, bare long digit runs (DNI-shaped), and bearer-style
/// tokens out of a full HTML document before it is persisted as
/// evidence (§6.3). Best-effort text scrub, not a DOM-aware parse.
pub fn redact_html(html: &str) -> String {
    let email_re = regex::Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap();
    let dni_re = regex::Regex::new(r"\b\d{8}[A-Za-z]\b").unwrap();
    let token_re = regex::Regex::new(r"(?i)(bearer|token)\s+[A-Za-z0-9._-]{10,}").unwrap();

    let redacted = email_re.replace_all(html, "[redacted-email]");
    let redacted = dni_re.replace_all(&redacted, "[redacted-dni]");
    let redacted = token_re.replace_all(&redacted, "[redacted-token]");
    redacted.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hash_mode_redacts_strings() {
        let policy = RedactionPolicy::default();
        let out = redact_value(&json!("super-secret-password"), &policy);
        assert!(out.as_str().unwrap().starts_with("[redacted:"));
    }

    #[test]
    fn hash_mode_preserves_bool_and_null() {
        let policy = RedactionPolicy::default();
        assert_eq!(redact_value(&json!(true), &policy), json!(true));
        assert_eq!(redact_value(&json!(null), &policy), json!(null));
    }

    #[test]
    fn dom_snapshot_only_redacts_sensitive_fields() {
        let policy = RedactionPolicy::default();
        let snapshot = json!({
            "dni_field": "12345678Z",
            "row_count": 3,
        });
        let out = redact_dom_snapshot(&snapshot, &policy);
        assert!(out["dni_field"].as_str().unwrap().starts_with("[redacted:"));
        assert_eq!(out["row_count"], json!(3));
    }

    #[test]
    fn redact_html_scrubs_email_dni_and_token() {
        let html = "<p>user@example.com</p><p>12345678Z</p><p>Bearer abcdef0123456789</p>";
        let out = redact_html(html);
        assert!(!out.contains("user@example.com"));
        assert!(!out.contains("12345678Z"));
        assert!(out.contains("[redacted-email]"));
        assert!(out.contains("[redacted-dni]"));
        assert!(out.contains("[redacted-token]"));
    }

    #[test]
    fn is_sensitive_field_matches_known_patterns() {
        assert!(is_sensitive_field("user_password"));
        assert!(is_sensitive_field("dni_number"));
        assert!(!is_sensitive_field("row_count"));
    }
}
