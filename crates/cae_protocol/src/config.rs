//! Wire shapes for the read-only external configuration the Core consumes
//! (§6.5: `org.json`, `people.json`, `platforms.json`). Loading these files
//! from disk is explicitly out of scope (§1) — the Core only ever sees
//! already-parsed values of these shapes, supplied by its caller.

use cae_ids::PlatformKey;
use serde::{Deserialize, Serialize};

/// A company/organization subject, as declared in `org.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrgRecord {
    pub company_key: String,
    pub name: String,
}

/// A worker subject, as declared in `people.json`. `dni` and `full_name`
/// are matched against portal-scraped text via [`cae_security::normalize`]
/// by the matching engine's scope-resolution step (§4.2 step 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonRecord {
    pub person_key: String,
    pub dni: String,
    pub full_name: String,
    pub company_key: String,
}

/// A coordination ("coord") grouping within a platform, used for
/// `SubmissionRule` precedence (§3.1) and rule lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordRecord {
    pub coord_label: String,
    pub display_name: String,
}

/// Declarative login-form selectors for a platform (§4.3.1).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginSelectors {
    pub username_field: String,
    pub password_field: String,
    pub submit_button: String,
    /// Selector present only once authenticated, used to verify the
    /// `BROWSER_STARTED -> AUTHENTICATED` transition (§4.4).
    pub authenticated_marker: String,
}

/// A CAE portal, as declared in `platforms.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformRecord {
    pub platform_key: PlatformKey,
    pub display_name: String,
    pub base_url: String,
    /// The host(s) a `HeadfulRun` against this platform is allowed to
    /// navigate within (§4.3.1).
    pub allowed_domains: Vec<String>,
    pub login: LoginSelectors,
    pub coords: Vec<CoordRecord>,
}
