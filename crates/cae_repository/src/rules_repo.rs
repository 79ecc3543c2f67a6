//! `SubmissionRule` CRUD (§3.1, §4.2 step 5): one JSON file
//! (`rules/submission_rules.json`) holding every rule across every
//! platform, mirroring `TypeCatalog`'s single-file-plus-cache shape.

use std::path::PathBuf;
use std::sync::RwLock;

use cae_ids::{PlatformKey, RuleId};
use cae_protocol::rules::SubmissionRule;

use crate::error::RepositoryError;
use crate::store::JsonFile;

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct RulesFile {
    rules: Vec<SubmissionRule>,
}

pub struct RuleCatalog {
    file: JsonFile<RulesFile>,
    cache: RwLock<RulesFile>,
}

impl RuleCatalog {
    pub fn open(path: PathBuf) -> Result<Self, RepositoryError> {
        let file = JsonFile::new(path);
        let cache = file.read()?;
        Ok(Self {
            file,
            cache: RwLock::new(cache),
        })
    }

    fn persist(&self, rules: RulesFile) -> Result<(), RepositoryError> {
        self.file.write(&rules)?;
        *self.cache.write().expect("lock poisoned") = rules;
        Ok(())
    }

    pub fn list_all(&self) -> Vec<SubmissionRule> {
        self.cache.read().expect("lock poisoned").rules.clone()
    }

    /// Rules for `platform_key` (every scope, enabled or not) — callers
    /// narrow further via `SubmissionRule::select_applicable`.
    pub fn list_for_platform(&self, platform_key: &PlatformKey) -> Vec<SubmissionRule> {
        self.cache
            .read()
            .expect("lock poisoned")
            .rules
            .iter()
            .filter(|r| &r.platform_key == platform_key)
            .cloned()
            .collect()
    }

    pub fn create(&self, rule: SubmissionRule) -> Result<SubmissionRule, RepositoryError> {
        let mut current = self.cache.read().expect("lock poisoned").clone();
        current.rules.push(rule.clone());
        self.persist(current)?;
        Ok(rule)
    }

    pub fn update(&self, updated: SubmissionRule) -> Result<SubmissionRule, RepositoryError> {
        let mut current = self.cache.read().expect("lock poisoned").clone();
        let slot = current
            .rules
            .iter_mut()
            .find(|r| r.rule_id == updated.rule_id)
            .ok_or_else(|| RepositoryError::InvariantViolated(format!("rule {} not found", updated.rule_id.as_str())))?;
        *slot = updated.clone();
        self.persist(current)?;
        Ok(updated)
    }

    pub fn delete(&self, rule_id: &RuleId) -> Result<(), RepositoryError> {
        let mut current = self.cache.read().expect("lock poisoned").clone();
        let before = current.rules.len();
        current.rules.retain(|r| &r.rule_id != rule_id);
        if current.rules.len() == before {
            return Err(RepositoryError::InvariantViolated(format!("rule {} not found", rule_id.as_str())));
        }
        self.persist(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cae_ids::TypeId;
    use cae_protocol::rules::{FormSpec, MatchCriteria, RuleScope};
    use tempfile::tempdir;

    fn rule(rule_id: &str, scope: RuleScope) -> SubmissionRule {
        SubmissionRule {
            rule_id: RuleId::new(rule_id),
            platform_key: PlatformKey::new("ctaima"),
            coord_label: Some("COORD_A".into()),
            scope,
            enabled: true,
            match_criteria: MatchCriteria::default(),
            document_type_id: TypeId::from("T104_AUTONOMOS_RECEIPT"),
            form: FormSpec::default(),
        }
    }

    #[test]
    fn create_then_list_for_platform() {
        let dir = tempdir().unwrap();
        let catalog = RuleCatalog::open(dir.path().join("submission_rules.json")).unwrap();
        catalog.create(rule("r1", RuleScope::Global)).unwrap();
        catalog.create(rule("r2", RuleScope::Coord)).unwrap();
        let rules = catalog.list_for_platform(&PlatformKey::new("ctaima"));
        assert_eq!(rules.len(), 2);
    }

    #[test]
    fn delete_missing_rule_errs() {
        let dir = tempdir().unwrap();
        let catalog = RuleCatalog::open(dir.path().join("submission_rules.json")).unwrap();
        let err = catalog.delete(&RuleId::new("missing")).unwrap_err();
        assert!(matches!(err, RepositoryError::InvariantViolated(_)));
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("submission_rules.json");
        {
            let catalog = RuleCatalog::open(path.clone()).unwrap();
            catalog.create(rule("r1", RuleScope::Global)).unwrap();
        }
        let reopened = RuleCatalog::open(path).unwrap();
        assert_eq!(reopened.list_all().len(), 1);
    }
}
