//! Learning Hint Store (§4.2.2, §6.2 `learning/`): an append-only
//! `hints.jsonl`, a materialized `hints_index.json` kept current after
//! every write so other tooling can read the resolved set without
//! replaying the log, and a `hints_tombstones.json` file for soft
//! disable. Generation is idempotent on `hint_id`, so a repeated
//! `MARK_AS_MATCH` decision never duplicates a hint.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use cae_ids::{DecisionPackId, DocId, HintId, TypeId};
use cae_protocol::learning::{HintConditions, HintStrength, LearnedHint, LearnedMapping};
use cae_security::fingerprint::hash_parts;

use crate::error::MatchingError;

fn io_err(path: &PathBuf, source: std::io::Error) -> MatchingError {
    MatchingError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn json_err(path: &Path, source: serde_json::Error) -> MatchingError {
    MatchingError::Json {
        path: path.display().to_string(),
        source,
    }
}

/// Write `content` to `path` via a temp-file-then-rename so a reader
/// never observes a partial `hints_index.json`.
fn atomic_write(path: &Path, content: &[u8]) -> Result<(), MatchingError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| io_err(&parent.to_path_buf(), e))?;
    let temp_path = parent.join(format!(".tmp_{}", uuid::Uuid::new_v4()));
    std::fs::write(&temp_path, content).map_err(|e| io_err(&temp_path, e))?;
    std::fs::rename(&temp_path, path).map_err(|e| io_err(&path.to_path_buf(), e))
}

/// Content-derived, so generating a hint twice for the same
/// `(decision_pack_id, item_fingerprint, type_id_expected, local_doc_id)`
/// yields the same id (§4.2.2 "generation is idempotent on `hint_id`").
pub fn derive_hint_id(decision_pack_id: &DecisionPackId, item_fingerprint: &str, type_id_expected: &TypeId, local_doc_id: &DocId) -> HintId {
    let digest = hash_parts(&[decision_pack_id.as_str(), item_fingerprint, type_id_expected.as_str(), local_doc_id.as_str()]);
    HintId::new(digest)
}

pub struct HintStore {
    path: PathBuf,
    index_path: PathBuf,
    tombstones_path: PathBuf,
}

impl HintStore {
    pub fn open(dir: PathBuf) -> Result<Self, MatchingError> {
        std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        let store = Self {
            path: dir.join("hints.jsonl"),
            index_path: dir.join("hints_index.json"),
            tombstones_path: dir.join("hints_tombstones.json"),
        };
        store.rewrite_index()?;
        Ok(store)
    }

    fn read_lines(path: &PathBuf) -> Result<Vec<String>, MatchingError> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        Ok(raw.lines().filter(|l| !l.trim().is_empty()).map(str::to_string).collect())
    }

    fn tombstoned_ids(&self) -> Result<HashSet<HintId>, MatchingError> {
        Self::read_lines(&self.tombstones_path)?
            .into_iter()
            .map(|line| serde_json::from_str::<HintId>(&line).map_err(|e| MatchingError::Json {
                path: self.tombstones_path.display().to_string(),
                source: e,
            }))
            .collect()
    }

    /// Every hint ever appended, most-recent-write-wins per `hint_id`
    /// (re-generation with the same id overwrites its conditions), with
    /// tombstoned hints marked `disabled`.
    pub fn list_all(&self) -> Result<Vec<LearnedHint>, MatchingError> {
        let tombstoned = self.tombstoned_ids()?;
        let mut by_id: Vec<LearnedHint> = Vec::new();
        for line in Self::read_lines(&self.path)? {
            let mut hint: LearnedHint = serde_json::from_str(&line).map_err(|e| MatchingError::Json {
                path: self.path.display().to_string(),
                source: e,
            })?;
            if tombstoned.contains(&hint.hint_id) {
                hint.disabled = true;
            }
            if let Some(slot) = by_id.iter_mut().find(|h: &&mut LearnedHint| h.hint_id == hint.hint_id) {
                *slot = hint;
            } else {
                by_id.push(hint);
            }
        }
        Ok(by_id)
    }

    /// Every non-disabled hint, the slice `evaluate` is given (§4.2
    /// step 6).
    pub fn list_active(&self) -> Result<Vec<LearnedHint>, MatchingError> {
        Ok(self.list_all()?.into_iter().filter(|h| !h.disabled).collect())
    }

    /// Materialize `hints_index.json` from the current log + tombstones
    /// (§6.2), so other tooling can read the resolved hint set directly
    /// instead of replaying `hints.jsonl` itself.
    fn rewrite_index(&self) -> Result<(), MatchingError> {
        let all = self.list_all()?;
        let json = serde_json::to_string_pretty(&all).map_err(|e| json_err(&self.index_path, e))?;
        atomic_write(&self.index_path, json.as_bytes())
    }

    fn append_line<T: serde::Serialize>(&self, path: &PathBuf, value: &T) -> Result<(), MatchingError> {
        let mut line = serde_json::to_string(value).map_err(|e| MatchingError::Json {
            path: path.display().to_string(),
            source: e,
        })?;
        line.push('\n');
        let mut file = OpenOptions::new().create(true).append(true).open(path).map_err(|e| io_err(path, e))?;
        file.write_all(line.as_bytes()).map_err(|e| io_err(path, e))
    }

    /// Record a `MARK_AS_MATCH` decision as a learned hint (§4.2.2).
    /// Idempotent on `hint_id`: calling this twice for the same decision
    /// content appends two lines, but `list_all` collapses them to the
    /// latest by id, so the observable store never double-counts it.
    #[allow(clippy::too_many_arguments)]
    pub fn generate(
        &self,
        decision_pack_id: DecisionPackId,
        item_fingerprint: String,
        type_id_expected: TypeId,
        local_doc_id: DocId,
        local_doc_fingerprint: Option<String>,
        conditions: HintConditions,
        strength: HintStrength,
    ) -> Result<LearnedHint, MatchingError> {
        let hint_id = derive_hint_id(&decision_pack_id, &item_fingerprint, &type_id_expected, &local_doc_id);
        let hint = LearnedHint {
            hint_id,
            item_fingerprint,
            learned_mapping: LearnedMapping {
                type_id_expected,
                local_doc_id,
                local_doc_fingerprint,
            },
            conditions,
            strength,
            disabled: false,
            source_decision_pack_id: decision_pack_id,
        };
        self.append_line(&self.path, &hint)?;
        self.rewrite_index()?;
        Ok(hint)
    }

    /// Soft-disable a hint by id (never removes the original record).
    pub fn disable(&self, hint_id: &HintId) -> Result<(), MatchingError> {
        self.append_line(&self.tombstones_path, hint_id)?;
        self.rewrite_index()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn conditions() -> HintConditions {
        HintConditions {
            subject_key: Some("ACME".into()),
            person_key: Some("ERM001".into()),
            period_key: Some("2023-05".into()),
            portal_type_label_normalized: Some("t104.0 recibo autonomos".into()),
        }
    }

    #[test]
    fn generate_is_idempotent_on_hint_id() {
        let dir = tempdir().unwrap();
        let store = HintStore::open(dir.path().to_path_buf()).unwrap();
        let pack_id = DecisionPackId::new();
        let doc_id = DocId::new();
        let first = store
            .generate(
                pack_id.clone(),
                "fp1".into(),
                TypeId::from("T104"),
                doc_id.clone(),
                None,
                conditions(),
                HintStrength::Exact,
            )
            .unwrap();
        let second = store
            .generate(pack_id, "fp1".into(), TypeId::from("T104"), doc_id, None, conditions(), HintStrength::Exact)
            .unwrap();
        assert_eq!(first.hint_id, second.hint_id);
        assert_eq!(store.list_all().unwrap().len(), 1);
    }

    #[test]
    fn disable_marks_hint_disabled_without_removing_it() {
        let dir = tempdir().unwrap();
        let store = HintStore::open(dir.path().to_path_buf()).unwrap();
        let hint = store
            .generate(
                DecisionPackId::new(),
                "fp1".into(),
                TypeId::from("T104"),
                DocId::new(),
                None,
                conditions(),
                HintStrength::Exact,
            )
            .unwrap();
        store.disable(&hint.hint_id).unwrap();
        let all = store.list_all().unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].disabled);
        assert!(store.list_active().unwrap().is_empty());
    }

    #[test]
    fn materializes_index_and_tombstones_under_the_spec_names() {
        let dir = tempdir().unwrap();
        let store = HintStore::open(dir.path().to_path_buf()).unwrap();
        let hint = store
            .generate(DecisionPackId::new(), "fp1".into(), TypeId::from("T104"), DocId::new(), None, conditions(), HintStrength::Exact)
            .unwrap();
        assert!(dir.path().join("hints_index.json").exists());
        store.disable(&hint.hint_id).unwrap();
        assert!(dir.path().join("hints_tombstones.json").exists());
        let index_raw = std::fs::read_to_string(dir.path().join("hints_index.json")).unwrap();
        let index: Vec<LearnedHint> = serde_json::from_str(&index_raw).unwrap();
        assert_eq!(index.len(), 1);
        assert!(index[0].disabled);
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = HintStore::open(dir.path().to_path_buf()).unwrap();
            store
                .generate(
                    DecisionPackId::new(),
                    "fp1".into(),
                    TypeId::from("T104"),
                    DocId::new(),
                    None,
                    conditions(),
                    HintStrength::Soft,
                )
                .unwrap();
        }
        let reopened = HintStore::open(dir.path().to_path_buf()).unwrap();
        assert_eq!(reopened.list_active().unwrap().len(), 1);
    }
}
