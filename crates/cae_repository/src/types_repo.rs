//! DocumentType catalog CRUD (§4.1): one JSON file (`types.json`) holding
//! the whole catalog, guarded by `duplicate_type`'s collision-avoiding id
//! generation and deletion's live-instance guard.

use std::path::PathBuf;
use std::sync::RwLock;

use cae_ids::TypeId;
use cae_protocol::catalog::DocumentType;

use crate::error::RepositoryError;
use crate::store::JsonFile;

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct TypesFile {
    types: Vec<DocumentType>,
}

pub struct TypeCatalog {
    file: JsonFile<TypesFile>,
    cache: RwLock<TypesFile>,
}

impl TypeCatalog {
    pub fn open(path: PathBuf) -> Result<Self, RepositoryError> {
        let file = JsonFile::new(path);
        let cache = file.read()?;
        Ok(Self {
            file,
            cache: RwLock::new(cache),
        })
    }

    fn persist(&self, types: TypesFile) -> Result<(), RepositoryError> {
        self.file.write(&types)?;
        *self.cache.write().expect("lock poisoned") = types;
        Ok(())
    }

    pub fn list_types(&self) -> Vec<DocumentType> {
        self.cache.read().expect("lock poisoned").types.clone()
    }

    pub fn get_type(&self, type_id: &TypeId) -> Result<DocumentType, RepositoryError> {
        self.cache
            .read()
            .expect("lock poisoned")
            .types
            .iter()
            .find(|t| &t.type_id == type_id)
            .cloned()
            .ok_or_else(|| RepositoryError::TypeNotFound(type_id.as_str().to_string()))
    }

    pub fn create_type(&self, new_type: DocumentType) -> Result<DocumentType, RepositoryError> {
        let mut current = self.cache.read().expect("lock poisoned").clone();
        if current.types.iter().any(|t| t.type_id == new_type.type_id) {
            return Err(RepositoryError::DuplicateTypeId(new_type.type_id.as_str().to_string()));
        }
        current.types.push(new_type.clone());
        self.persist(current)?;
        Ok(new_type)
    }

    pub fn update_type(&self, updated: DocumentType) -> Result<DocumentType, RepositoryError> {
        let mut current = self.cache.read().expect("lock poisoned").clone();
        let slot = current
            .types
            .iter_mut()
            .find(|t| t.type_id == updated.type_id)
            .ok_or_else(|| RepositoryError::TypeNotFound(updated.type_id.as_str().to_string()))?;
        *slot = updated.clone();
        self.persist(current)?;
        Ok(updated)
    }

    pub fn toggle_active(&self, type_id: &TypeId) -> Result<DocumentType, RepositoryError> {
        let mut current = self.cache.read().expect("lock poisoned").clone();
        let slot = current
            .types
            .iter_mut()
            .find(|t| &t.type_id == type_id)
            .ok_or_else(|| RepositoryError::TypeNotFound(type_id.as_str().to_string()))?;
        slot.active = !slot.active;
        let result = slot.clone();
        self.persist(current)?;
        Ok(result)
    }

    /// Deletes a type, refusing if `live_instance_count` (supplied by the
    /// caller, which owns the document store) is nonzero.
    pub fn delete_type(&self, type_id: &TypeId, live_instance_count: usize) -> Result<(), RepositoryError> {
        if live_instance_count > 0 {
            return Err(RepositoryError::TypeHasLiveInstances(type_id.as_str().to_string(), live_instance_count));
        }
        let mut current = self.cache.read().expect("lock poisoned").clone();
        let before = current.types.len();
        current.types.retain(|t| &t.type_id != type_id);
        if current.types.len() == before {
            return Err(RepositoryError::TypeNotFound(type_id.as_str().to_string()));
        }
        self.persist(current)
    }

    /// `duplicate_type`: auto-generates `<id>_COPY`, `<id>_COPY_2`, …
    /// when `new_type_id` is not supplied, deep-copying every field
    /// except `type_id` and `name` (property 8).
    pub fn duplicate_type(&self, source_id: &TypeId, new_type_id: Option<TypeId>) -> Result<DocumentType, RepositoryError> {
        let source = self.get_type(source_id)?;
        let current = self.cache.read().expect("lock poisoned").clone();
        let existing_ids: std::collections::HashSet<&str> = current.types.iter().map(|t| t.type_id.as_str()).collect();

        let final_id = match new_type_id {
            Some(id) => {
                if existing_ids.contains(id.as_str()) {
                    return Err(RepositoryError::DuplicateTypeId(id.as_str().to_string()));
                }
                id
            }
            None => next_copy_id(source_id.as_str(), &existing_ids),
        };

        let new_name = format!("{} (copy)", source.name);
        let copy = source.duplicated_as(final_id, new_name);
        self.create_type(copy)
    }
}

fn next_copy_id(base: &str, existing: &std::collections::HashSet<&str>) -> TypeId {
    let first_candidate = format!("{base}_COPY");
    if !existing.contains(first_candidate.as_str()) {
        return TypeId::from(first_candidate.as_str());
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}_COPY_{n}");
        if !existing.contains(candidate.as_str()) {
            return TypeId::from(candidate.as_str());
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cae_protocol::catalog::{Scope, ValidityBasis, ValidityPolicy, ValidityStartMode};
    use tempfile::tempdir;

    fn sample(type_id: &str) -> DocumentType {
        DocumentType {
            type_id: TypeId::from(type_id),
            name: "Autonomos receipt".into(),
            description: "".into(),
            scope: Scope::Worker,
            validity_policy: ValidityPolicy::Monthly {
                basis: ValidityBasis::IssueDate,
                grace_days: 0,
                n_months: 1,
            },
            period_kind: cae_protocol::catalog::PeriodKind::Month,
            platform_aliases: vec!["t104.0".into()],
            issue_date_required: true,
            allow_late_submission: false,
            late_submission_max_days: None,
            validity_start_mode: ValidityStartMode::IssueDate,
            active: true,
        }
    }

    #[test]
    fn create_then_get_round_trips() {
        let dir = tempdir().unwrap();
        let catalog = TypeCatalog::open(dir.path().join("types.json")).unwrap();
        catalog.create_type(sample("T104")).unwrap();
        let fetched = catalog.get_type(&TypeId::from("T104")).unwrap();
        assert_eq!(fetched.name, "Autonomos receipt");
    }

    #[test]
    fn create_rejects_duplicate_id() {
        let dir = tempdir().unwrap();
        let catalog = TypeCatalog::open(dir.path().join("types.json")).unwrap();
        catalog.create_type(sample("T104")).unwrap();
        let err = catalog.create_type(sample("T104")).unwrap_err();
        assert!(matches!(err, RepositoryError::DuplicateTypeId(_)));
    }

    #[test]
    fn delete_blocked_when_live_instances_exist() {
        let dir = tempdir().unwrap();
        let catalog = TypeCatalog::open(dir.path().join("types.json")).unwrap();
        catalog.create_type(sample("T104")).unwrap();
        let err = catalog.delete_type(&TypeId::from("T104"), 2).unwrap_err();
        assert!(matches!(err, RepositoryError::TypeHasLiveInstances(_, 2)));
    }

    #[test]
    fn duplicate_without_explicit_id_generates_copy_suffix() {
        let dir = tempdir().unwrap();
        let catalog = TypeCatalog::open(dir.path().join("types.json")).unwrap();
        catalog.create_type(sample("T104")).unwrap();
        let copy1 = catalog.duplicate_type(&TypeId::from("T104"), None).unwrap();
        assert_eq!(copy1.type_id.as_str(), "T104_COPY");
        let copy2 = catalog.duplicate_type(&TypeId::from("T104"), None).unwrap();
        assert_eq!(copy2.type_id.as_str(), "T104_COPY_2");
        assert_eq!(copy2.platform_aliases, sample("T104").platform_aliases);
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("types.json");
        {
            let catalog = TypeCatalog::open(path.clone()).unwrap();
            catalog.create_type(sample("T104")).unwrap();
        }
        let reopened = TypeCatalog::open(path).unwrap();
        assert_eq!(reopened.list_types().len(), 1);
    }
}
