//! Domain allowlist — validates that browser navigation stays within
//! the URL allow-list bound to a `HeadfulRun` (§4.3.1). Generalizes the
//! canonicalize-and-contain pattern used for filesystem path allowlists
//! to URL hosts: a navigation target is legal only if its host equals,
//! or is a subdomain of, one of the allowed hosts.

use thiserror::Error;
use url::Url;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SecurityError {
    #[error("navigation to {url} is outside the allowed domain(s) {allowed:?}")]
    DomainEscape { url: String, allowed: Vec<String> },
    #[error("could not parse navigation target as a URL: {0}")]
    InvalidUrl(String),
}

impl From<SecurityError> for cae_protocol::CaeError {
    fn from(err: SecurityError) -> Self {
        cae_protocol::CaeError::new(
            cae_protocol::CaeErrorCode::SecurityBlockedDomainEscape,
            cae_protocol::Stage::Security,
            cae_protocol::Severity::Critical,
            err.to_string(),
        )
    }
}

/// Binds a `HeadfulRun` to one or more allowed hosts.
#[derive(Debug, Clone)]
pub struct DomainAllowlist {
    allowed_hosts: Vec<String>,
}

impl DomainAllowlist {
    pub fn new(allowed_hosts: Vec<String>) -> Self {
        Self {
            allowed_hosts: allowed_hosts.into_iter().map(|h| h.to_lowercase()).collect(),
        }
    }

    pub fn single(host: impl Into<String>) -> Self {
        Self::new(vec![host.into()])
    }

    fn host_matches(&self, host: &str) -> bool {
        let host = host.to_lowercase();
        self.allowed_hosts
            .iter()
            .any(|allowed| &host == allowed || host.ends_with(&format!(".{allowed}")))
    }

    /// Validate a navigation target. Returns the parsed `Url` on
    /// success so callers don't have to re-parse it.
    pub fn validate(&self, target: &str) -> Result<Url, SecurityError> {
        let url = Url::parse(target).map_err(|e| SecurityError::InvalidUrl(e.to_string()))?;
        let host = url
            .host_str()
            .ok_or_else(|| SecurityError::InvalidUrl(target.to_string()))?;
        if self.host_matches(host) {
            Ok(url)
        } else {
            Err(SecurityError::DomainEscape {
                url: target.to_string(),
                allowed: self.allowed_hosts.clone(),
            })
        }
    }

    pub fn allowed_hosts(&self) -> &[String] {
        &self.allowed_hosts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_exact_host() {
        let allow = DomainAllowlist::single("portal.example.com");
        assert!(allow.validate("https://portal.example.com/login").is_ok());
    }

    #[test]
    fn allows_subdomain() {
        let allow = DomainAllowlist::single("example.com");
        assert!(allow.validate("https://portal.example.com/login").is_ok());
    }

    #[test]
    fn rejects_foreign_host() {
        let allow = DomainAllowlist::single("portal.example.com");
        let err = allow.validate("https://evil.example.net/phish").unwrap_err();
        assert!(matches!(err, SecurityError::DomainEscape { .. }));
    }

    #[test]
    fn rejects_lookalike_suffix() {
        // "notportal.example.com" must not match "portal.example.com".
        let allow = DomainAllowlist::single("portal.example.com");
        let err = allow.validate("https://notportal.example.com/x").unwrap_err();
        assert!(matches!(err, SecurityError::DomainEscape { .. }));
    }
}
