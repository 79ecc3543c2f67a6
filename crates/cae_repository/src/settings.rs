//! Repository-wide settings (§6.1 `GET|PUT /api/repository/settings`),
//! held in a single `settings.json` at the repository root.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::RepositoryError;
use crate::store::JsonFile;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub repository_root_dir: String,
    /// Window, in days, for `ExpiringSoon` classification (§3.1).
    #[serde(default = "default_expiring_soon_days")]
    pub expiring_soon_days: i64,
    /// How many months of `expected_periods` history the period planner
    /// surfaces by default (§4.1.2).
    #[serde(default = "default_period_lookback_months")]
    pub period_lookback_months: u32,
}

fn default_expiring_soon_days() -> i64 {
    30
}

fn default_period_lookback_months() -> u32 {
    12
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            repository_root_dir: String::new(),
            expiring_soon_days: default_expiring_soon_days(),
            period_lookback_months: default_period_lookback_months(),
        }
    }
}

pub struct SettingsStore {
    file: JsonFile<Settings>,
}

impl SettingsStore {
    pub fn open(path: PathBuf) -> Self {
        Self { file: JsonFile::new(path) }
    }

    pub fn get(&self) -> Result<Settings, RepositoryError> {
        self.file.read()
    }

    pub fn put(&self, settings: Settings) -> Result<Settings, RepositoryError> {
        self.file.write(&settings)?;
        Ok(settings)
    }
}
