//! Atomic JSON-file persistence primitives (§4.1, §6.2). Every mutating
//! write in this crate goes through `atomic_write`: write a sibling
//! `.tmp` file, then rename onto the target so readers never observe a
//! partially-written file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::RepositoryError;

fn io_err(path: &Path, source: std::io::Error) -> RepositoryError {
    RepositoryError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn json_err(path: &Path, source: serde_json::Error) -> RepositoryError {
    RepositoryError::Json {
        path: path.display().to_string(),
        source,
    }
}

/// Write `content` to `path` via a temp-file-then-rename so concurrent
/// readers only ever see the previous complete version or the new
/// complete version, never a partial write (§6.2).
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<(), RepositoryError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    let temp_path = parent.join(format!(".tmp_{}", uuid::Uuid::new_v4()));
    fs::write(&temp_path, content).map_err(|e| io_err(&temp_path, e))?;
    fs::rename(&temp_path, path).map_err(|e| io_err(path, e))?;
    Ok(())
}

/// Serialize `value` to pretty JSON and atomically write it to `path`.
pub fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), RepositoryError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| json_err(path, e))?;
    atomic_write(path, json.as_bytes())
}

/// One JSON document per entity, keyed by a caller-supplied string id —
/// the shape of `meta/<doc_id>.json` and `history/<y>/<m>/<record_id>
/// .json`. Generalizes the per-id file store pattern used for approvals
/// and jobs in the lineage this crate is adapted from.
pub struct JsonStore<T> {
    dir: PathBuf,
    _marker: std::marker::PhantomData<T>,
}

impl<T: Serialize + DeserializeOwned> JsonStore<T> {
    pub fn new(dir: PathBuf) -> Result<Self, RepositoryError> {
        fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        Ok(Self {
            dir,
            _marker: std::marker::PhantomData,
        })
    }

    fn entity_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    pub fn save(&self, id: &str, value: &T) -> Result<(), RepositoryError> {
        atomic_write_json(&self.entity_path(id), value)
    }

    pub fn load(&self, id: &str) -> Result<Option<T>, RepositoryError> {
        let path = self.entity_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        let value = serde_json::from_str(&raw).map_err(|e| json_err(&path, e))?;
        Ok(Some(value))
    }

    pub fn load_all(&self) -> Result<Vec<T>, RepositoryError> {
        let mut items = Vec::new();
        let entries = fs::read_dir(&self.dir).map_err(|e| io_err(&self.dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| io_err(&self.dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            if path.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.starts_with(".tmp_")) {
                continue;
            }
            let raw = fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
            let value = serde_json::from_str(&raw).map_err(|e| json_err(&path, e))?;
            items.push(value);
        }
        Ok(items)
    }

    pub fn delete(&self, id: &str) -> Result<bool, RepositoryError> {
        let path = self.entity_path(id);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).map_err(|e| io_err(&path, e))?;
        Ok(true)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// A single JSON file holding one value — the shape of `types.json`,
/// `settings.json`, and `rules/submission_rules.json`.
pub struct JsonFile<T> {
    path: PathBuf,
    _marker: std::marker::PhantomData<T>,
}

impl<T: Serialize + DeserializeOwned + Default> JsonFile<T> {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn read(&self) -> Result<T, RepositoryError> {
        if !self.path.exists() {
            return Ok(T::default());
        }
        let raw = fs::read_to_string(&self.path).map_err(|e| io_err(&self.path, e))?;
        serde_json::from_str(&raw).map_err(|e| json_err(&self.path, e))
    }

    pub fn write(&self, value: &T) -> Result<(), RepositoryError> {
        atomic_write_json(&self.path, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Widget {
        id: String,
        count: u32,
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store: JsonStore<Widget> = JsonStore::new(dir.path().to_path_buf()).unwrap();
        let widget = Widget { id: "w1".into(), count: 3 };
        store.save("w1", &widget).unwrap();
        let loaded = store.load("w1").unwrap().unwrap();
        assert_eq!(loaded, widget);
    }

    #[test]
    fn load_nonexistent_is_none() {
        let dir = tempdir().unwrap();
        let store: JsonStore<Widget> = JsonStore::new(dir.path().to_path_buf()).unwrap();
        assert!(store.load("missing").unwrap().is_none());
    }

    #[test]
    fn load_all_skips_temp_files() {
        let dir = tempdir().unwrap();
        let store: JsonStore<Widget> = JsonStore::new(dir.path().to_path_buf()).unwrap();
        store.save("w1", &Widget { id: "w1".into(), count: 1 }).unwrap();
        store.save("w2", &Widget { id: "w2".into(), count: 2 }).unwrap();
        fs::write(dir.path().join(".tmp_stale"), b"garbage").unwrap();
        let all = store.load_all().unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn delete_reports_whether_it_existed() {
        let dir = tempdir().unwrap();
        let store: JsonStore<Widget> = JsonStore::new(dir.path().to_path_buf()).unwrap();
        store.save("w1", &Widget { id: "w1".into(), count: 1 }).unwrap();
        assert!(store.delete("w1").unwrap());
        assert!(!store.delete("w1").unwrap());
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Settings {
        root: String,
    }

    #[test]
    fn json_file_defaults_when_missing() {
        let dir = tempdir().unwrap();
        let file: JsonFile<Settings> = JsonFile::new(dir.path().join("settings.json"));
        assert_eq!(file.read().unwrap(), Settings::default());
        file.write(&Settings { root: "/data".into() }).unwrap();
        assert_eq!(file.read().unwrap().root, "/data");
    }
}
