//! Append-only submission history (§6.2 `history/<year>/<month>/`), the
//! unit of dedupe for "already submitted"/"already planned" decisions
//! (§4.2 reason codes `skip_already_submitted`/`skip_already_planned`).

use std::collections::HashSet;
use std::path::PathBuf;

use cae_ids::{DocId, PlatformKey, RecordId, RunId, TypeId};
use cae_protocol::history::{Action, SubmissionRecord};
use cae_protocol::matching::Decision;
use chrono::{DateTime, Datelike, Utc};

use crate::error::RepositoryError;
use crate::store::JsonStore;

/// One `JsonStore` per `<year>/<month>` bucket; buckets are opened lazily
/// and never cached, since history is append-mostly and read in bulk
/// only for dedupe scans and listings.
// TODO: records are never purged; a retention sweep would hook in here
// once a numeric retention window is decided.
pub struct HistoryStore {
    root: PathBuf,
}

impl HistoryStore {
    pub fn open(root: PathBuf) -> Self {
        Self { root }
    }

    fn bucket(&self, at: DateTime<Utc>) -> Result<JsonStore<SubmissionRecord>, RepositoryError> {
        let dir = self.root.join(format!("{:04}", at.year())).join(format!("{:02}", at.month()));
        JsonStore::new(dir)
    }

    fn all_buckets(&self) -> Result<Vec<JsonStore<SubmissionRecord>>, RepositoryError> {
        let mut buckets = Vec::new();
        if !self.root.exists() {
            return Ok(buckets);
        }
        let years = std::fs::read_dir(&self.root).map_err(|e| RepositoryError::Io {
            path: self.root.display().to_string(),
            source: e,
        })?;
        for year_entry in years {
            let year_path = year_entry
                .map_err(|e| RepositoryError::Io {
                    path: self.root.display().to_string(),
                    source: e,
                })?
                .path();
            if !year_path.is_dir() {
                continue;
            }
            let months = std::fs::read_dir(&year_path).map_err(|e| RepositoryError::Io {
                path: year_path.display().to_string(),
                source: e,
            })?;
            for month_entry in months {
                let month_path = month_entry
                    .map_err(|e| RepositoryError::Io {
                        path: year_path.display().to_string(),
                        source: e,
                    })?
                    .path();
                if month_path.is_dir() {
                    buckets.push(JsonStore::new(month_path)?);
                }
            }
        }
        Ok(buckets)
    }

    /// Every record ever written, unordered across buckets (callers sort
    /// by `created_at`/`seq` if order matters).
    pub fn list_all(&self) -> Result<Vec<SubmissionRecord>, RepositoryError> {
        let mut all = Vec::new();
        for bucket in self.all_buckets()? {
            all.extend(bucket.load_all()?);
        }
        Ok(all)
    }

    pub fn append(&self, record: &SubmissionRecord) -> Result<(), RepositoryError> {
        self.bucket(record.created_at)?.save(record.record_id.as_str(), record)
    }

    /// The next `seq` value for `run_id`: one past the highest `seq`
    /// already recorded for that run, or `0` if it has none yet. Derived
    /// by scanning rather than an in-memory counter, so sequencing stays
    /// correct across process restarts (§5).
    pub fn next_seq(&self, run_id: &RunId) -> Result<u64, RepositoryError> {
        let max = self
            .list_all()?
            .into_iter()
            .filter(|r| &r.run_id == run_id)
            .map(|r| r.seq)
            .max();
        Ok(max.map_or(0, |m| m + 1))
    }

    /// Whether `fingerprint` has a `Submitted` record anywhere in history
    /// (§4.2 `skip_already_submitted`).
    pub fn has_submitted(&self, fingerprint: &str) -> Result<bool, RepositoryError> {
        Ok(self.list_all()?.iter().any(|r| r.pending_fingerprint == fingerprint && r.action == Action::Submitted))
    }

    /// Whether `fingerprint` has a `Planned` record not yet superseded by
    /// a later `Submitted`/`Skipped`/`Failed` record for the same
    /// fingerprint (§4.2 `skip_already_planned`). "Not yet superseded" is
    /// approximated by "no later record with the same fingerprint exists".
    pub fn has_active_planned(&self, fingerprint: &str) -> Result<bool, RepositoryError> {
        let mut matching: Vec<SubmissionRecord> = self
            .list_all()?
            .into_iter()
            .filter(|r| r.pending_fingerprint == fingerprint)
            .collect();
        if matching.is_empty() {
            return Ok(false);
        }
        matching.sort_by_key(|r| r.created_at);
        Ok(matching.last().is_some_and(|latest| latest.action == Action::Planned))
    }

    /// Distinct fingerprints with at least one `Submitted` record, for
    /// bulk dedupe passes (matching engine history-dedupe step, §4.2).
    pub fn submitted_fingerprints(&self) -> Result<HashSet<String>, RepositoryError> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|r| r.action == Action::Submitted)
            .map(|r| r.pending_fingerprint)
            .collect())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn record_decision(
        &self,
        run_id: RunId,
        platform_key: PlatformKey,
        coord_label: Option<String>,
        company_key: Option<String>,
        person_key: Option<String>,
        pending_fingerprint: String,
        pending_snapshot: serde_json::Value,
        doc_id: Option<DocId>,
        type_id: Option<TypeId>,
        file_sha256: Option<String>,
        action: Action,
        decision: Decision,
        now: DateTime<Utc>,
    ) -> Result<SubmissionRecord, RepositoryError> {
        let seq = self.next_seq(&run_id)?;
        let record = SubmissionRecord {
            record_id: RecordId::new(),
            platform_key,
            coord_label,
            company_key,
            person_key,
            pending_fingerprint,
            pending_snapshot,
            doc_id,
            type_id,
            file_sha256,
            action,
            decision,
            run_id,
            evidence_path: None,
            created_at: now,
            submitted_at: None,
            error_message: None,
            seq,
        };
        self.append(&record)?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cae_ids::PlatformKey;
    use tempfile::tempdir;

    fn mk_record(run_id: RunId, fingerprint: &str, action: Action, seq: u64, created_at: DateTime<Utc>) -> SubmissionRecord {
        SubmissionRecord {
            record_id: RecordId::new(),
            platform_key: PlatformKey::from("fremap"),
            coord_label: Some("C-01".into()),
            company_key: Some("ACME".into()),
            person_key: Some("ERM".into()),
            pending_fingerprint: fingerprint.into(),
            pending_snapshot: serde_json::json!({}),
            doc_id: None,
            type_id: None,
            file_sha256: None,
            action,
            decision: Decision::AutoUpload,
            run_id,
            evidence_path: None,
            created_at,
            submitted_at: None,
            error_message: None,
            seq,
        }
    }

    #[test]
    fn next_seq_is_monotonic_per_run() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::open(dir.path().to_path_buf());
        let run_id = RunId::new();
        let now = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        assert_eq!(store.next_seq(&run_id).unwrap(), 0);
        store.append(&mk_record(run_id.clone(), "fp1", Action::Planned, 0, now)).unwrap();
        assert_eq!(store.next_seq(&run_id).unwrap(), 1);
        store.append(&mk_record(run_id.clone(), "fp2", Action::Planned, 1, now)).unwrap();
        assert_eq!(store.next_seq(&run_id).unwrap(), 2);
    }

    #[test]
    fn next_seq_is_independent_across_runs() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::open(dir.path().to_path_buf());
        let run_a = RunId::new();
        let run_b = RunId::new();
        let now = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        store.append(&mk_record(run_a.clone(), "fp1", Action::Planned, 0, now)).unwrap();
        assert_eq!(store.next_seq(&run_b).unwrap(), 0);
    }

    #[test]
    fn has_submitted_true_only_after_submitted_record() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::open(dir.path().to_path_buf());
        let run_id = RunId::new();
        let now = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        assert!(!store.has_submitted("fpX").unwrap());
        store.append(&mk_record(run_id.clone(), "fpX", Action::Planned, 0, now)).unwrap();
        assert!(!store.has_submitted("fpX").unwrap());
        store.append(&mk_record(run_id, "fpX", Action::Submitted, 1, now)).unwrap();
        assert!(store.has_submitted("fpX").unwrap());
    }

    #[test]
    fn has_active_planned_false_once_superseded_by_later_record() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::open(dir.path().to_path_buf());
        let run_id = RunId::new();
        let earlier = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        let later = DateTime::<Utc>::from_timestamp(1_700_000_100, 0).unwrap();
        store.append(&mk_record(run_id.clone(), "fpY", Action::Planned, 0, earlier)).unwrap();
        assert!(store.has_active_planned("fpY").unwrap());
        store.append(&mk_record(run_id, "fpY", Action::Skipped, 1, later)).unwrap();
        assert!(!store.has_active_planned("fpY").unwrap());
    }

    #[test]
    fn records_land_in_year_month_buckets() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::open(dir.path().to_path_buf());
        let run_id = RunId::new();
        let at = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        let record = mk_record(run_id, "fpZ", Action::Planned, 0, at);
        store.append(&record).unwrap();
        let expected_dir = dir.path().join(format!("{:04}", at.year())).join(format!("{:02}", at.month()));
        assert!(expected_dir.join(format!("{}.json", record.record_id.as_str())).exists());
    }
}
