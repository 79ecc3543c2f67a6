//! `/api/repository/docs` (§6.1): document CRUD and the multipart
//! upload pipeline (`DocumentStore::upload`, §4.1).

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use cae_ids::{DocId, TypeId};
use cae_protocol::catalog::Scope;
use cae_protocol::document::{DocumentInstance, DocumentStatus, ValidityOverride, ValidityStatus};
use cae_repository::docs::{DocumentFilter, UploadRequest};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DocsQuery {
    pub type_id: Option<String>,
    pub scope: Option<String>,
    pub status: Option<String>,
    pub validity_status: Option<String>,
    pub period_key: Option<String>,
    pub company_key: Option<String>,
    pub person_key: Option<String>,
}

fn parse_scope(s: &str) -> Option<Scope> {
    match s.to_lowercase().as_str() {
        "company" => Some(Scope::Company),
        "worker" => Some(Scope::Worker),
        _ => None,
    }
}

fn parse_status(s: &str) -> Option<DocumentStatus> {
    match s.to_lowercase().as_str() {
        "draft" => Some(DocumentStatus::Draft),
        "reviewed" => Some(DocumentStatus::Reviewed),
        "ready_to_submit" => Some(DocumentStatus::ReadyToSubmit),
        "submitted" => Some(DocumentStatus::Submitted),
        "expired" => Some(DocumentStatus::Expired),
        _ => None,
    }
}

fn parse_validity_status(s: &str) -> Option<ValidityStatus> {
    match s.to_lowercase().as_str() {
        "valid" => Some(ValidityStatus::Valid),
        "expiring_soon" => Some(ValidityStatus::ExpiringSoon),
        "expired" => Some(ValidityStatus::Expired),
        "unknown" => Some(ValidityStatus::Unknown),
        _ => None,
    }
}

fn build_filter(q: &DocsQuery) -> DocumentFilter {
    DocumentFilter {
        type_id: q.type_id.as_deref().map(TypeId::from),
        scope: q.scope.as_deref().and_then(parse_scope),
        status: q.status.as_deref().and_then(parse_status),
        validity_status: q.validity_status.as_deref().and_then(parse_validity_status),
        period_key: q.period_key.clone(),
        company_key: q.company_key.clone(),
        person_key: q.person_key.clone(),
    }
}

pub async fn list_docs(State(state): State<AppState>, Query(q): Query<DocsQuery>) -> ApiResult<Json<Vec<DocumentInstance>>> {
    let settings = state.repository.settings.get().map_err(ApiError::from)?;
    let today = chrono::Utc::now().date_naive();
    let filter = build_filter(&q);
    let docs = state.repository.documents.list(&filter, today, settings.expiring_soon_days).map_err(ApiError::from)?;
    Ok(Json(docs))
}

pub async fn list_pending_docs(State(state): State<AppState>, Query(q): Query<DocsQuery>) -> ApiResult<Json<Vec<DocumentInstance>>> {
    let settings = state.repository.settings.get().map_err(ApiError::from)?;
    let today = chrono::Utc::now().date_naive();
    let filter = build_filter(&q);
    let docs = state.repository.documents.list(&filter, today, settings.expiring_soon_days).map_err(ApiError::from)?;
    let pending = docs.into_iter().filter(|d| d.needs_period || d.status == DocumentStatus::Draft).collect();
    Ok(Json(pending))
}

pub async fn get_doc(State(state): State<AppState>, Path(doc_id): Path<String>) -> ApiResult<Json<DocumentInstance>> {
    let doc_id = DocId::parse(&doc_id).map_err(|_| ApiError::bad_request("invalid doc id"))?;
    Ok(Json(state.repository.documents.get(&doc_id).map_err(ApiError::from)?))
}

pub async fn get_doc_pdf(State(state): State<AppState>, Path(doc_id): Path<String>) -> ApiResult<Response> {
    let doc_id = DocId::parse(&doc_id).map_err(|_| ApiError::bad_request("invalid doc id"))?;
    let bytes = state.repository.documents.read_pdf(&doc_id).map_err(ApiError::from)?;
    Ok(([(header::CONTENT_TYPE, "application/pdf")], bytes).into_response())
}

#[derive(Default)]
struct UploadForm {
    file_bytes: Option<Vec<u8>>,
    mime: Option<String>,
    file_name_original: Option<String>,
    type_id: Option<String>,
    company_key: Option<String>,
    person_key: Option<String>,
    issue_date: Option<NaiveDate>,
    validity_start_date: Option<NaiveDate>,
    name_date: Option<NaiveDate>,
    period_key: Option<String>,
}

fn parse_date_field(name: &str, value: &str) -> ApiResult<Option<NaiveDate>> {
    if value.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| ApiError::bad_request(format!("{name} must be an ISO date (YYYY-MM-DD)")))
}

pub async fn upload_doc(State(state): State<AppState>, mut multipart: Multipart) -> ApiResult<(StatusCode, Json<DocumentInstance>)> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(|e| ApiError::bad_request(format!("malformed multipart body: {e}")))? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                form.mime = field.content_type().map(|s| s.to_string());
                form.file_name_original = field.file_name().map(|s| s.to_string());
                let data = field.bytes().await.map_err(|e| ApiError::bad_request(format!("failed to read file field: {e}")))?;
                form.file_bytes = Some(data.to_vec());
            }
            "type_id" => form.type_id = Some(field.text().await.unwrap_or_default()),
            "company_key" => form.company_key = Some(field.text().await.unwrap_or_default()).filter(|s| !s.is_empty()),
            "person_key" => form.person_key = Some(field.text().await.unwrap_or_default()).filter(|s| !s.is_empty()),
            "issue_date" => form.issue_date = parse_date_field("issue_date", &field.text().await.unwrap_or_default())?,
            "validity_start_date" => form.validity_start_date = parse_date_field("validity_start_date", &field.text().await.unwrap_or_default())?,
            "name_date" => form.name_date = parse_date_field("name_date", &field.text().await.unwrap_or_default())?,
            "period_key" => form.period_key = Some(field.text().await.unwrap_or_default()).filter(|s| !s.is_empty()),
            _ => {}
        }
    }

    let file_bytes = form.file_bytes.ok_or_else(|| ApiError::bad_request("missing required 'file' field"))?;
    let mime = form.mime.ok_or_else(|| ApiError::bad_request("missing content type on 'file' field"))?;
    let file_name_original = form.file_name_original.unwrap_or_else(|| "upload.pdf".to_string());
    let type_id_raw = form.type_id.ok_or_else(|| ApiError::bad_request("missing required 'type_id' field"))?;
    let type_id = TypeId::from(type_id_raw.as_str());

    let doc_type = state.repository.types.get_type(&type_id).map_err(ApiError::from)?;

    let req = UploadRequest {
        file_bytes,
        mime,
        file_name_original,
        company_key: form.company_key,
        person_key: form.person_key,
        issue_date: form.issue_date,
        validity_start_date: form.validity_start_date,
        name_date: form.name_date,
        period_key: form.period_key,
    };

    let instance = state.repository.documents.upload(&doc_type, req).map_err(ApiError::from)?;
    Ok((StatusCode::CREATED, Json(instance)))
}

pub async fn update_doc(State(state): State<AppState>, Path(doc_id): Path<String>, Json(updated): Json<DocumentInstance>) -> ApiResult<Json<DocumentInstance>> {
    if updated.doc_id.as_str() != doc_id {
        return Err(ApiError::bad_request("body doc_id does not match the path id"));
    }
    Ok(Json(state.repository.documents.update(updated).map_err(ApiError::from)?))
}

pub async fn replace_doc_pdf(State(state): State<AppState>, Path(doc_id): Path<String>, mut multipart: Multipart) -> ApiResult<Json<DocumentInstance>> {
    let doc_id = DocId::parse(&doc_id).map_err(|_| ApiError::bad_request("invalid doc id"))?;
    let mut file_bytes = None;
    let mut mime = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| ApiError::bad_request(format!("malformed multipart body: {e}")))? {
        if field.name() == Some("file") {
            mime = field.content_type().map(|s| s.to_string());
            let data = field.bytes().await.map_err(|e| ApiError::bad_request(format!("failed to read file field: {e}")))?;
            file_bytes = Some(data.to_vec());
        }
    }
    let file_bytes = file_bytes.ok_or_else(|| ApiError::bad_request("missing required 'file' field"))?;
    let mime = mime.ok_or_else(|| ApiError::bad_request("missing content type on 'file' field"))?;
    Ok(Json(state.repository.documents.replace_pdf(&doc_id, &mime, &file_bytes).map_err(ApiError::from)?))
}

pub async fn delete_doc(State(state): State<AppState>, Path(doc_id): Path<String>) -> ApiResult<StatusCode> {
    let doc_id = DocId::parse(&doc_id).map_err(|_| ApiError::bad_request("invalid doc id"))?;
    let deleted = state.repository.documents.delete(&doc_id).map_err(ApiError::from)?;
    Ok(if deleted { StatusCode::NO_CONTENT } else { StatusCode::NOT_FOUND })
}

#[derive(Debug, Deserialize)]
pub struct OverrideRequest {
    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,
    pub reason: Option<String>,
}

pub async fn set_doc_override(State(state): State<AppState>, Path(doc_id): Path<String>, Json(body): Json<OverrideRequest>) -> ApiResult<Json<DocumentInstance>> {
    let doc_id = DocId::parse(&doc_id).map_err(|_| ApiError::bad_request("invalid doc id"))?;
    let override_ = match &body.reason {
        Some(reason) => Some(ValidityOverride {
            valid_from: body.valid_from,
            valid_to: body.valid_to,
            reason: reason.clone(),
        }),
        None => None,
    };
    Ok(Json(state.repository.documents.set_override(&doc_id, override_).map_err(ApiError::from)?))
}
