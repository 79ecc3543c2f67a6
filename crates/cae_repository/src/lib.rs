//! The on-disk document repository (§4.1, §6.2): atomic JSON-file
//! persistence for the type catalog, document instances, submission
//! rules, submission history, and repository settings. No SQL, no
//! embedded database — every entity is one file, written via
//! temp-then-rename.

pub mod docs;
pub mod error;
pub mod history;
pub mod period;
pub mod rules_repo;
pub mod settings;
pub mod store;
pub mod types_repo;
pub mod validity;

pub use docs::{DocumentFilter, DocumentStore, UploadRequest};
pub use error::RepositoryError;
pub use history::HistoryStore;
pub use period::{expected_periods, infer_period_key, status_of_period, ExpectedPeriod, PeriodStatus};
pub use rules_repo::RuleCatalog;
pub use settings::{Settings, SettingsStore};
pub use types_repo::TypeCatalog;
pub use validity::compute_validity;

use std::path::{Path, PathBuf};

/// Opens every store rooted at a single repository directory (§6.2
/// on-disk layout: `types.json`, `docs/`, `meta/`, `rules/`, `history/`,
/// `settings.json`). The single entry point `cae_core` opens on startup.
pub struct Repository {
    pub types: TypeCatalog,
    pub documents: DocumentStore,
    pub rules: RuleCatalog,
    pub history: HistoryStore,
    pub settings: SettingsStore,
    root: PathBuf,
}

impl Repository {
    pub fn open(root: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let root = root.as_ref().to_path_buf();
        Ok(Self {
            types: TypeCatalog::open(root.join("types.json"))?,
            documents: DocumentStore::open(&root)?,
            rules: RuleCatalog::open(root.join("rules").join("submission_rules.json"))?,
            history: HistoryStore::open(root.join("history")),
            settings: SettingsStore::open(root.join("settings.json")),
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
