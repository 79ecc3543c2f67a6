//! `/api/repository/types` (§6.1): DocumentType catalog CRUD, plus
//! `toggle_active`, `duplicate` and the Period Planner's `expected`
//! view for one type.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use cae_ids::TypeId;
use cae_protocol::catalog::DocumentType;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TypesQuery {
    pub query: Option<String>,
    pub period: Option<String>,
    pub scope: Option<String>,
    pub active: Option<bool>,
    pub sort: Option<String>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct TypesPage {
    pub items: Vec<DocumentType>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

pub async fn list_types(State(state): State<AppState>, Query(q): Query<TypesQuery>) -> Json<TypesPage> {
    let mut types = state.repository.types.list_types();

    if let Some(text) = q.query.as_ref().map(|s| s.to_lowercase()) {
        types.retain(|t| t.name.to_lowercase().contains(&text) || t.type_id.as_str().to_lowercase().contains(&text) || t.description.to_lowercase().contains(&text));
    }
    if let Some(period) = &q.period {
        types.retain(|t| format!("{:?}", t.period_kind).eq_ignore_ascii_case(period));
    }
    if let Some(scope) = &q.scope {
        types.retain(|t| format!("{:?}", t.scope).eq_ignore_ascii_case(scope));
    }
    if let Some(active) = q.active {
        types.retain(|t| t.active == active);
    }

    match q.sort.as_deref() {
        Some("name") => types.sort_by(|a, b| a.name.cmp(&b.name)),
        Some("-name") => types.sort_by(|a, b| b.name.cmp(&a.name)),
        _ => types.sort_by(|a, b| a.type_id.as_str().cmp(b.type_id.as_str())),
    }

    let total = types.len();
    let page_size = q.page_size.unwrap_or(50).max(1);
    let page = q.page.unwrap_or(1).max(1);
    let start = (page - 1) * page_size;
    let items = types.into_iter().skip(start).take(page_size).collect();

    Json(TypesPage { items, total, page, page_size })
}

pub async fn get_type(State(state): State<AppState>, Path(type_id): Path<String>) -> ApiResult<Json<DocumentType>> {
    Ok(Json(state.repository.types.get_type(&TypeId::from(type_id.as_str())).map_err(ApiError::from)?))
}

pub async fn create_type(State(state): State<AppState>, Json(new_type): Json<DocumentType>) -> ApiResult<(StatusCode, Json<DocumentType>)> {
    let created = state.repository.types.create_type(new_type).map_err(ApiError::from)?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_type(State(state): State<AppState>, Path(type_id): Path<String>, Json(updated): Json<DocumentType>) -> ApiResult<Json<DocumentType>> {
    if updated.type_id.as_str() != type_id {
        return Err(ApiError::bad_request("body type_id does not match the path id"));
    }
    Ok(Json(state.repository.types.update_type(updated).map_err(ApiError::from)?))
}

pub async fn delete_type(State(state): State<AppState>, Path(type_id): Path<String>) -> ApiResult<StatusCode> {
    let id = TypeId::from(type_id.as_str());
    let live = state.repository.documents.count_for_type(&id).map_err(ApiError::from)?;
    state.repository.types.delete_type(&id, live).map_err(ApiError::from)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_active(State(state): State<AppState>, Path(type_id): Path<String>) -> ApiResult<Json<DocumentType>> {
    Ok(Json(state.repository.types.toggle_active(&TypeId::from(type_id.as_str())).map_err(ApiError::from)?))
}

#[derive(Debug, Deserialize)]
pub struct DuplicateRequest {
    pub new_type_id: Option<String>,
}

pub async fn duplicate_type(State(state): State<AppState>, Path(type_id): Path<String>, Json(body): Json<DuplicateRequest>) -> ApiResult<(StatusCode, Json<DocumentType>)> {
    let copy = state
        .repository
        .types
        .duplicate_type(&TypeId::from(type_id.as_str()), body.new_type_id.as_deref().map(TypeId::from))
        .map_err(ApiError::from)?;
    Ok((StatusCode::CREATED, Json(copy)))
}

#[derive(Debug, Deserialize)]
pub struct ExpectedQuery {
    pub company_key: Option<String>,
    pub person_key: Option<String>,
    pub months_back: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ExpectedPeriodEntry {
    pub period_key: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub status: String,
}

pub async fn expected_periods(State(state): State<AppState>, Path(type_id): Path<String>, Query(q): Query<ExpectedQuery>) -> ApiResult<Json<Vec<ExpectedPeriodEntry>>> {
    let type_id = TypeId::from(type_id.as_str());
    let doc_type = state.repository.types.get_type(&type_id).map_err(ApiError::from)?;
    let settings = state.repository.settings.get().map_err(ApiError::from)?;
    let today = chrono::Utc::now().date_naive();
    let months_back = q.months_back.unwrap_or(settings.period_lookback_months);

    let filter = cae_repository::DocumentFilter {
        type_id: Some(type_id),
        company_key: q.company_key.clone(),
        person_key: q.person_key.clone(),
        ..Default::default()
    };
    let docs = state.repository.documents.list(&filter, today, settings.expiring_soon_days).map_err(ApiError::from)?;

    let grace_days = doc_type.validity_policy.grace_days();
    let periods = cae_repository::expected_periods(doc_type.period_kind, today, months_back);
    let entries = periods
        .into_iter()
        .map(|period| {
            let subset: Vec<&cae_protocol::document::DocumentInstance> = docs.iter().filter(|d| d.period_key.as_deref() == Some(period.period_key.as_str())).collect();
            let status = cae_repository::status_of_period(period.period_end, grace_days, &subset, today);
            ExpectedPeriodEntry {
                period_key: period.period_key,
                period_start: period.period_start,
                period_end: period.period_end,
                status: format!("{status:?}"),
            }
        })
        .collect();
    Ok(Json(entries))
}
