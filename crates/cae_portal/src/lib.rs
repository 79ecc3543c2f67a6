//! The Portal Execution Pipeline (§4.3): a headful browser run per
//! platform/tenant, navigating to the pending-documentation grid,
//! scraping it, and driving single-item uploads. The deterministic
//! pieces (frame/grid selection, overlay-dismissal ordering, the
//! navigation retry cascade, pagination dedup, the same-state loop
//! guard) are pure functions or small traits over observed page state;
//! `fantoccini_connector` is the one place that turns those into real
//! WebDriver calls.

pub mod connector;
pub mod error;
pub mod fantoccini_connector;
pub mod frame;
pub mod navigation;
pub mod overlay;
pub mod pagination;
pub mod run;
pub mod upload;

pub use connector::{Connector, ConnectorFactory, ConnectorRegistry};
pub use error::PortalError;
pub use fantoccini_connector::{close_and_flush, Credentials, FantocciniConnector};
pub use frame::{grid_readiness, select_grid_frame, FrameDescriptor, GridObservation, GridReadiness};
pub use navigation::{compute_screen_signature, navigate_to_pending_grid, NavigationStrategy, SameStateGuard, ScreenSignature};
pub use overlay::{dismiss_overlays, OverlayDriver};
pub use pagination::{collect_pages, ScrapedPage};
pub use run::{ActionGuard, RunDriver};
pub use upload::{upload_single_item, UploadEvidence, UploadSpec};
