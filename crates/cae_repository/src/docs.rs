//! `DocumentInstance` CRUD, upload pipeline, and filtered listings (§4.1).
//! Each instance lives in its own `meta/<doc_id>.json` alongside its PDF
//! blob under `docs/<doc_id>.pdf` (§6.2).

use std::fs;
use std::path::PathBuf;

use cae_ids::{DocId, TypeId};
use cae_protocol::catalog::{DocumentType, PeriodKind, Scope, ValidityStartMode};
use cae_protocol::document::{
    ComputedValidity, DocumentInstance, DocumentStatus, ExtractedMeta, ValidityOverride, ValidityStatus,
};
use chrono::NaiveDate;

use crate::error::RepositoryError;
use crate::period::infer_period_key;
use crate::store::JsonStore;
use crate::validity::compute_validity;

/// Request parameters for `upload` (§4.1). `issue_date`/`validity_start_date`
/// are the uploader's *declared* dates; `name_date` is recovered from
/// filename/content (§3.1 `extracted`), never declared directly.
pub struct UploadRequest {
    pub file_bytes: Vec<u8>,
    pub mime: String,
    pub file_name_original: String,
    pub company_key: Option<String>,
    pub person_key: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub validity_start_date: Option<NaiveDate>,
    pub name_date: Option<NaiveDate>,
    pub period_key: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    pub type_id: Option<TypeId>,
    pub scope: Option<Scope>,
    pub status: Option<DocumentStatus>,
    pub validity_status: Option<ValidityStatus>,
    pub period_key: Option<String>,
    pub company_key: Option<String>,
    pub person_key: Option<String>,
}

fn is_pdf(mime: &str, bytes: &[u8]) -> bool {
    mime.eq_ignore_ascii_case("application/pdf") && bytes.starts_with(b"%PDF")
}

pub struct DocumentStore {
    meta: JsonStore<DocumentInstance>,
    docs_dir: PathBuf,
}

impl DocumentStore {
    pub fn open(root: &std::path::Path) -> Result<Self, RepositoryError> {
        let meta = JsonStore::new(root.join("meta"))?;
        let docs_dir = root.join("docs");
        fs::create_dir_all(&docs_dir).map_err(|e| RepositoryError::Io {
            path: docs_dir.display().to_string(),
            source: e,
        })?;
        Ok(Self { meta, docs_dir })
    }

    fn blob_path(&self, doc_id: &DocId) -> PathBuf {
        self.docs_dir.join(format!("{}.pdf", doc_id.as_str()))
    }

    /// Validate the `scope=company => company_key set, person_key null`
    /// and `scope=worker => both set` invariants (§3.1).
    fn validate_subject(scope: Scope, company_key: &Option<String>, person_key: &Option<String>) -> Result<(), RepositoryError> {
        match scope {
            Scope::Company => {
                if company_key.is_none() || person_key.is_some() {
                    return Err(RepositoryError::InvariantViolated(
                        "scope=company requires company_key set and person_key null".into(),
                    ));
                }
            }
            Scope::Worker => {
                if company_key.is_none() || person_key.is_none() {
                    return Err(RepositoryError::InvariantViolated(
                        "scope=worker requires both company_key and person_key set".into(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Upload pipeline (§4.1): MIME/scope validation, sha256, validity-start
    /// resolution, period inference, validity computation, persistence.
    pub fn upload(&self, type_: &DocumentType, req: UploadRequest) -> Result<DocumentInstance, RepositoryError> {
        if !is_pdf(&req.mime, &req.file_bytes) {
            return Err(RepositoryError::UnsupportedMediaType(req.mime));
        }
        Self::validate_subject(type_.scope, &req.company_key, &req.person_key)?;

        let sha256 = cae_security::sha256_hex(&req.file_bytes);

        let validity_start_date = match type_.validity_start_mode {
            ValidityStartMode::IssueDate => req.issue_date,
            ValidityStartMode::Manual => req.validity_start_date,
        };

        let extracted = ExtractedMeta {
            validity_start_date,
            name_date: req.name_date,
        };

        let period_kind = type_.period_kind;
        let (period_key, needs_period) = if period_kind == PeriodKind::None {
            (None, false)
        } else if let Some(explicit) = req.period_key {
            (Some(explicit), false)
        } else {
            let inferred = infer_period_key(
                validity_start_date.or(req.issue_date),
                req.name_date,
                Some(&req.file_name_original),
            );
            let needs_period = inferred.is_none();
            (inferred, needs_period)
        };

        let computed_validity = compute_validity(&type_.validity_policy, req.issue_date, &extracted);

        let doc_id = DocId::new();
        let instance = DocumentInstance {
            doc_id: doc_id.clone(),
            type_id: type_.type_id.clone(),
            scope: type_.scope,
            company_key: req.company_key,
            person_key: req.person_key,
            file_name_original: req.file_name_original,
            stored_path: format!("docs/{}.pdf", doc_id.as_str()),
            sha256,
            issued_at: req.issue_date,
            extracted,
            period_kind,
            period_key,
            needs_period,
            computed_validity,
            validity_override: None,
            status: DocumentStatus::Draft,
        };

        self.write_blob(&doc_id, &req.file_bytes)?;
        self.meta.save(doc_id.as_str(), &instance)?;
        Ok(instance)
    }

    fn write_blob(&self, doc_id: &DocId, bytes: &[u8]) -> Result<(), RepositoryError> {
        crate::store::atomic_write(&self.blob_path(doc_id), bytes)
    }

    pub fn get(&self, doc_id: &DocId) -> Result<DocumentInstance, RepositoryError> {
        self.meta
            .load(doc_id.as_str())?
            .ok_or_else(|| RepositoryError::DocumentNotFound(doc_id.as_str().to_string()))
    }

    pub fn read_pdf(&self, doc_id: &DocId) -> Result<Vec<u8>, RepositoryError> {
        let path = self.blob_path(doc_id);
        fs::read(&path).map_err(|e| RepositoryError::Io {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Replace the underlying PDF bytes for an existing instance, updating
    /// `sha256` but leaving declared dates and computed validity untouched
    /// (callers revalidate separately via `update_document` if needed).
    pub fn replace_pdf(&self, doc_id: &DocId, mime: &str, bytes: &[u8]) -> Result<DocumentInstance, RepositoryError> {
        if !is_pdf(mime, bytes) {
            return Err(RepositoryError::UnsupportedMediaType(mime.to_string()));
        }
        let mut instance = self.get(doc_id)?;
        instance.sha256 = cae_security::sha256_hex(bytes);
        self.write_blob(doc_id, bytes)?;
        self.meta.save(doc_id.as_str(), &instance)?;
        Ok(instance)
    }

    pub fn update(&self, instance: DocumentInstance) -> Result<DocumentInstance, RepositoryError> {
        self.get(&instance.doc_id)?;
        self.meta.save(instance.doc_id.as_str(), &instance)?;
        Ok(instance)
    }

    pub fn set_override(&self, doc_id: &DocId, override_: Option<ValidityOverride>) -> Result<DocumentInstance, RepositoryError> {
        let mut instance = self.get(doc_id)?;
        instance.validity_override = override_;
        self.meta.save(doc_id.as_str(), &instance)?;
        Ok(instance)
    }

    pub fn delete(&self, doc_id: &DocId) -> Result<bool, RepositoryError> {
        let existed = self.meta.delete(doc_id.as_str())?;
        let blob = self.blob_path(doc_id);
        if blob.exists() {
            let _ = fs::remove_file(&blob);
        }
        Ok(existed)
    }

    pub fn file_exists(&self, instance: &DocumentInstance) -> bool {
        self.blob_path(&instance.doc_id).exists()
    }

    pub fn count_for_type(&self, type_id: &TypeId) -> Result<usize, RepositoryError> {
        Ok(self.meta.load_all()?.iter().filter(|d| &d.type_id == type_id).count())
    }

    /// List all documents matching `filter`. `validity_status` filtering is
    /// applied after computation, per §4.1.
    pub fn list(&self, filter: &DocumentFilter, today: NaiveDate, expiring_soon_days: i64) -> Result<Vec<DocumentInstance>, RepositoryError> {
        let mut all = self.meta.load_all()?;
        all.retain(|d| {
            filter.type_id.as_ref().map_or(true, |t| &d.type_id == t)
                && filter.scope.map_or(true, |s| d.scope == s)
                && filter.status.map_or(true, |s| d.status == s)
                && filter.period_key.as_ref().map_or(true, |p| d.period_key.as_deref() == Some(p.as_str()))
                && filter.company_key.as_ref().map_or(true, |c| d.company_key.as_deref() == Some(c.as_str()))
                && filter.person_key.as_ref().map_or(true, |p| d.person_key.as_deref() == Some(p.as_str()))
        });
        if let Some(wanted) = filter.validity_status {
            all.retain(|d| d.validity_status(today, expiring_soon_days).0 == wanted);
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cae_protocol::catalog::{ValidityBasis, ValidityPolicy};
    use tempfile::tempdir;

    fn sample_type() -> DocumentType {
        DocumentType {
            type_id: TypeId::from("T104_AUTONOMOS_RECEIPT"),
            name: "Autonomos receipt".into(),
            description: "".into(),
            scope: Scope::Worker,
            validity_policy: ValidityPolicy::Monthly {
                basis: ValidityBasis::IssueDate,
                grace_days: 0,
                n_months: 1,
            },
            period_kind: PeriodKind::Month,
            platform_aliases: vec!["t104.0".into()],
            issue_date_required: true,
            allow_late_submission: false,
            late_submission_max_days: None,
            validity_start_mode: ValidityStartMode::IssueDate,
            active: true,
        }
    }

    fn pdf_bytes() -> Vec<u8> {
        let mut b = b"%PDF-1.4\n".to_vec();
        b.extend_from_slice(b"fake content");
        b
    }

    #[test]
    fn upload_rejects_non_pdf_mime() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::open(dir.path()).unwrap();
        let req = UploadRequest {
            file_bytes: b"not a pdf".to_vec(),
            mime: "text/plain".into(),
            file_name_original: "x.txt".into(),
            company_key: Some("ACME".into()),
            person_key: Some("ERM".into()),
            issue_date: None,
            validity_start_date: None,
            name_date: None,
            period_key: None,
        };
        let err = store.upload(&sample_type(), req).unwrap_err();
        assert!(matches!(err, RepositoryError::UnsupportedMediaType(_)));
    }

    #[test]
    fn upload_rejects_missing_person_key_for_worker_scope() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::open(dir.path()).unwrap();
        let req = UploadRequest {
            file_bytes: pdf_bytes(),
            mime: "application/pdf".into(),
            file_name_original: "x.pdf".into(),
            company_key: Some("ACME".into()),
            person_key: None,
            issue_date: Some(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()),
            validity_start_date: None,
            name_date: None,
            period_key: None,
        };
        let err = store.upload(&sample_type(), req).unwrap_err();
        assert!(matches!(err, RepositoryError::InvariantViolated(_)));
    }

    #[test]
    fn upload_infers_period_key_and_sets_validity_start_from_issue_date() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::open(dir.path()).unwrap();
        let issue_date = NaiveDate::from_ymd_opt(2023, 5, 15).unwrap();
        let req = UploadRequest {
            file_bytes: pdf_bytes(),
            mime: "application/pdf".into(),
            file_name_original: "recibo.pdf".into(),
            company_key: Some("ACME".into()),
            person_key: Some("ERM".into()),
            issue_date: Some(issue_date),
            validity_start_date: None,
            name_date: None,
            period_key: None,
        };
        let doc = store.upload(&sample_type(), req).unwrap();
        assert_eq!(doc.period_key.as_deref(), Some("2023-05"));
        assert_eq!(doc.extracted.validity_start_date, Some(issue_date));
        assert!(!doc.needs_period);
        assert!(store.file_exists(&doc));
    }

    #[test]
    fn upload_marks_needs_period_when_inference_fails() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::open(dir.path()).unwrap();
        let req = UploadRequest {
            file_bytes: pdf_bytes(),
            mime: "application/pdf".into(),
            file_name_original: "documento_final.pdf".into(),
            company_key: Some("ACME".into()),
            person_key: Some("ERM".into()),
            issue_date: None,
            validity_start_date: None,
            name_date: None,
            period_key: None,
        };
        let doc = store.upload(&sample_type(), req).unwrap();
        assert!(doc.needs_period);
        assert!(doc.period_key.is_none());
    }

    #[test]
    fn round_trip_upload_same_bytes_yields_same_sha256_and_validity() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::open(dir.path()).unwrap();
        let issue_date = NaiveDate::from_ymd_opt(2023, 5, 15).unwrap();
        let make_req = || UploadRequest {
            file_bytes: pdf_bytes(),
            mime: "application/pdf".into(),
            file_name_original: "recibo.pdf".into(),
            company_key: Some("ACME".into()),
            person_key: Some("ERM".into()),
            issue_date: Some(issue_date),
            validity_start_date: None,
            name_date: None,
            period_key: None,
        };
        let a = store.upload(&sample_type(), make_req()).unwrap();
        let b = store.upload(&sample_type(), make_req()).unwrap();
        assert_eq!(a.sha256, b.sha256);
        assert_eq!(a.computed_validity.valid_to, b.computed_validity.valid_to);
    }

    #[test]
    fn set_override_then_clear_restores_computed() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::open(dir.path()).unwrap();
        let issue_date = NaiveDate::from_ymd_opt(2023, 5, 15).unwrap();
        let req = UploadRequest {
            file_bytes: pdf_bytes(),
            mime: "application/pdf".into(),
            file_name_original: "recibo.pdf".into(),
            company_key: Some("ACME".into()),
            person_key: Some("ERM".into()),
            issue_date: Some(issue_date),
            validity_start_date: None,
            name_date: None,
            period_key: None,
        };
        let doc = store.upload(&sample_type(), req).unwrap();
        let computed_to = doc.computed_validity.valid_to;

        let overridden = store
            .set_override(
                &doc.doc_id,
                Some(ValidityOverride {
                    valid_from: Some(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()),
                    valid_to: Some(NaiveDate::from_ymd_opt(2026, 6, 30).unwrap()),
                    reason: "re-issued".into(),
                }),
            )
            .unwrap();
        assert_eq!(overridden.effective_validity().1, Some(NaiveDate::from_ymd_opt(2026, 6, 30).unwrap()));

        let cleared = store.set_override(&doc.doc_id, None).unwrap();
        assert_eq!(cleared.effective_validity().1, computed_to);
    }
}
