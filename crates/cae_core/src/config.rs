//! Core configuration, sourced from the environment variables §6.6
//! names: `REPOSITORY_DATA_DIR`, `BROWSER_HEADFUL`, `MAX_UPLOADS_HARD_CAP`,
//! `SAME_STATE_REVISIT_THRESHOLD`, `HARD_CAP_STEPS`,
//! `RATE_LIMIT_DEFAULT_SECONDS`. Credentials and portal/org/people
//! records load from the read-only configuration files under
//! `config_dir` (§6.5), never from the environment.

use std::env;
use std::path::PathBuf;

use cae_protocol::job::{DEFAULT_MAX_UPLOADS_HARD_CAP, DEFAULT_RATE_LIMIT_SECONDS};

/// §5: two successive unchanged screen-signature observations trip the
/// same-state loop guard.
pub const DEFAULT_SAME_STATE_REVISIT_THRESHOLD: u32 = 2;
/// No named default in the spec; chosen generously above any realistic
/// single-run action count so it only ever trips a genuinely runaway
/// action loop, not a long but legitimate run.
pub const DEFAULT_HARD_CAP_STEPS: u32 = 200;
/// Idempotency retention window for repeated apply requests (§5); not
/// separately named as an env var, so it is a Core constant.
pub const IDEMPOTENCY_RETENTION: std::time::Duration = std::time::Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct CoreOptions {
    pub repository_root: PathBuf,
    pub config_dir: PathBuf,
    pub webdriver_url: String,
    pub browser_headful: bool,
    pub max_uploads_hard_cap: u32,
    pub same_state_revisit_threshold: u32,
    pub hard_cap_steps: u32,
    pub rate_limit_default_seconds: f64,
    /// §4.5.3's first apply precondition ("process environment
    /// explicitly set to the development/operator mode"). Not one of
    /// the §6.6-named variables; an additive gate constant the way
    /// `IDEMPOTENCY_RETENTION` is.
    pub operator_mode: bool,
}

impl CoreOptions {
    /// Reads every env var named in §6.6, falling back to the spec's
    /// explicit defaults where one is given.
    pub fn from_env() -> Self {
        Self {
            repository_root: env::var("REPOSITORY_DATA_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("./data/repository")),
            config_dir: env::var("CONFIG_DATA_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("./data/config")),
            webdriver_url: env::var("WEBDRIVER_URL").unwrap_or_else(|_| "http://localhost:4444".to_string()),
            operator_mode: parse_bool_env("CAE_OPERATOR_MODE", false),
            browser_headful: parse_bool_env("BROWSER_HEADFUL", false),
            max_uploads_hard_cap: parse_env("MAX_UPLOADS_HARD_CAP", DEFAULT_MAX_UPLOADS_HARD_CAP),
            same_state_revisit_threshold: parse_env("SAME_STATE_REVISIT_THRESHOLD", DEFAULT_SAME_STATE_REVISIT_THRESHOLD),
            hard_cap_steps: parse_env("HARD_CAP_STEPS", DEFAULT_HARD_CAP_STEPS),
            rate_limit_default_seconds: parse_env("RATE_LIMIT_DEFAULT_SECONDS", DEFAULT_RATE_LIMIT_SECONDS),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn parse_bool_env(key: &str, default: bool) -> bool {
    match env::var(key).ok().as_deref() {
        Some("1") | Some("true") | Some("TRUE") | Some("yes") => true,
        Some("0") | Some("false") | Some("FALSE") | Some("no") => false,
        _ => default,
    }
}

/// An in-memory-only credential pair for one platform (§4.3.1, §5:
/// "never flushed to disk or evidence"), as declared in `secrets.json`.
#[derive(Debug, Clone)]
pub struct SecretRecord {
    pub platform_key: cae_ids::PlatformKey,
    pub username: String,
    pub password: String,
}

/// Every read-only configuration record the Core consumes (§6.5).
/// Loading `org.json`/`people.json`/`platforms.json`/`secrets.json`
/// from `config_dir` is explicitly out of scope for `cae_core` itself
/// (mirrors `cae_protocol::config`'s doc comment) — the `cae` binary
/// reads them and hands this bundle to `Core::new_with_config`.
#[derive(Debug, Clone, Default)]
pub struct ConfigBundle {
    pub orgs: Vec<cae_protocol::config::OrgRecord>,
    pub people: Vec<cae_protocol::config::PersonRecord>,
    pub platforms: Vec<cae_protocol::config::PlatformRecord>,
    pub secrets: Vec<SecretRecord>,
}

impl ConfigBundle {
    pub fn platform(&self, platform_key: &cae_ids::PlatformKey) -> Option<&cae_protocol::config::PlatformRecord> {
        self.platforms.iter().find(|p| &p.platform_key == platform_key)
    }

    pub fn secret(&self, platform_key: &cae_ids::PlatformKey) -> Option<&SecretRecord> {
        self.secrets.iter().find(|s| &s.platform_key == platform_key)
    }
}
