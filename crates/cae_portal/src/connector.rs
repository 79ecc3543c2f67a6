//! The typed `Connector` interface (§9 design notes: the source's
//! duck-typed connector registry becomes a typed trait) and the
//! registry mapping `platform_key -> Connector` constructors. The
//! initial implementation registers exactly one connector,
//! `FantocciniConnector`, for the single portal family this spec
//! targets (§4.3 preamble).

use std::collections::HashMap;

use async_trait::async_trait;
use cae_ids::PlatformKey;
use cae_matching::MatchingInputs;
use cae_protocol::{MatchingDebugReport, PendingRequirement};

use crate::error::PortalError;
use crate::navigation::ScreenSignature;
use crate::upload::{UploadEvidence, UploadSpec};

/// One portal's login + pending-grid + upload surface, driven by a
/// single exclusively-owned browser page (§9: "the scraping logic is
/// cooperative and owns its single browser page exclusively"). The
/// source's duck-typed connector (`login, navigate_to_pending,
/// extract_pending, match, upload_one`) becomes this typed interface;
/// `match` is renamed `match_pending` to dodge the keyword.
#[async_trait]
pub trait Connector: Send {
    /// Perform login via the platform's declarative form selectors if
    /// no storage state exists, or verify the existing session
    /// otherwise (§4.3.1, `BROWSER_STARTED -> AUTHENTICATED`).
    async fn login(&mut self) -> Result<(), PortalError>;

    /// Dismiss overlays, then navigate to the pending grid (§4.3.3,
    /// §4.3.4). Returns the resulting screen signature.
    async fn navigate_to_pending(&mut self) -> Result<ScreenSignature, PortalError>;

    /// Paginated scrape of the pending grid (§4.3.5).
    async fn extract_pending(&mut self, max_pages: u32) -> Result<Vec<PendingRequirement>, PortalError>;

    /// Match one scraped pending item against the repository (§4.2).
    /// Not browser-specific — every connector shares this
    /// implementation rather than re-deriving it, since matching is
    /// pure CPU and never touches the page (§9: "matching and policy
    /// are pure CPU and never suspend").
    fn match_pending(&self, inputs: &MatchingInputs<'_>) -> MatchingDebugReport {
        cae_matching::evaluate(inputs)
    }

    /// Single-item upload (§4.3.6 steps 2-5): open the form, fill
    /// declarative fields, attach the file, submit, and wait for
    /// confirmation evidence. Re-location (step 1) and post-
    /// verification (step 6) are the caller's responsibility
    /// (`upload::upload_single_item`) since they both go through
    /// `extract_pending` rather than anything upload-specific.
    async fn upload_one(&mut self, item: &PendingRequirement, spec: &UploadSpec) -> Result<UploadEvidence, PortalError>;
}

/// Constructs a fresh `Connector` for one platform/run. Boxed so the
/// registry can hold heterogeneous constructors behind one type.
pub type ConnectorFactory = Box<dyn Fn() -> Box<dyn Connector> + Send + Sync>;

/// Maps `platform_key -> Connector` constructors (§9 design notes).
#[derive(Default)]
pub struct ConnectorRegistry {
    factories: HashMap<PlatformKey, ConnectorFactory>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, platform_key: PlatformKey, factory: ConnectorFactory) {
        self.factories.insert(platform_key, factory);
    }

    pub fn build(&self, platform_key: &PlatformKey) -> Option<Box<dyn Connector>> {
        self.factories.get(platform_key).map(|f| f())
    }

    pub fn supports(&self, platform_key: &PlatformKey) -> bool {
        self.factories.contains_key(platform_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubConnector;

    #[async_trait]
    impl Connector for StubConnector {
        async fn login(&mut self) -> Result<(), PortalError> {
            Ok(())
        }
        async fn navigate_to_pending(&mut self) -> Result<ScreenSignature, PortalError> {
            Ok("sig".to_string())
        }
        async fn extract_pending(&mut self, _max_pages: u32) -> Result<Vec<PendingRequirement>, PortalError> {
            Ok(Vec::new())
        }
        async fn upload_one(&mut self, _item: &PendingRequirement, _spec: &UploadSpec) -> Result<UploadEvidence, PortalError> {
            Ok(UploadEvidence::default())
        }
    }

    #[test]
    fn registry_builds_registered_platform_only() {
        let mut registry = ConnectorRegistry::new();
        let ctaima = PlatformKey::new("ctaima");
        registry.register(ctaima.clone(), Box::new(|| Box::new(StubConnector)));
        assert!(registry.supports(&ctaima));
        assert!(registry.build(&ctaima).is_some());
        assert!(!registry.supports(&PlatformKey::new("unregistered")));
        assert!(registry.build(&PlatformKey::new("unregistered")).is_none());
    }
}
