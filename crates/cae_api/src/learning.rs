//! `/api/learning/hints` (§6.1, §4.2.2): read and disable learned hints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use cae_ids::HintId;
use cae_protocol::learning::LearnedHint;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct HintsQuery {
    pub subject_key: Option<String>,
    pub person_key: Option<String>,
    pub period_key: Option<String>,
    pub active_only: Option<bool>,
}

pub async fn list_hints(State(state): State<AppState>, Query(q): Query<HintsQuery>) -> ApiResult<Json<Vec<LearnedHint>>> {
    let mut hints = if q.active_only.unwrap_or(false) {
        state.hint_store.list_active()?
    } else {
        state.hint_store.list_all()?
    };
    if let Some(subject_key) = &q.subject_key {
        hints.retain(|h| h.conditions.subject_key.as_deref() == Some(subject_key.as_str()));
    }
    if let Some(person_key) = &q.person_key {
        hints.retain(|h| h.conditions.person_key.as_deref() == Some(person_key.as_str()));
    }
    if let Some(period_key) = &q.period_key {
        hints.retain(|h| h.conditions.period_key.as_deref() == Some(period_key.as_str()));
    }
    Ok(Json(hints))
}

#[derive(Debug, Deserialize)]
pub struct DisableHintRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

pub async fn disable_hint(State(state): State<AppState>, Path(hint_id): Path<String>, Json(_body): Json<DisableHintRequest>) -> ApiResult<StatusCode> {
    let hint_id = HintId::from(hint_id.as_str());
    state.hint_store.disable(&hint_id)?;
    Ok(StatusCode::NO_CONTENT)
}
