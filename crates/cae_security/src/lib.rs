//! Security and text-hygiene primitives shared across the CAE
//! submission core: the one normalization function (§3.2), the
//! browser-navigation domain allowlist (§4.3.1), evidence redaction
//! (§6.3), and fingerprinting (§3.1).

pub mod domain_allowlist;
pub mod fingerprint;
pub mod normalize;
pub mod redaction;

pub use domain_allowlist::{DomainAllowlist, SecurityError};
pub use fingerprint::{hash_parts, pending_fingerprint, sha256_hex};
pub use normalize::normalize;
pub use redaction::{is_sensitive_field, redact_dom_snapshot, redact_html, redact_value, RedactionMode, RedactionPolicy};
