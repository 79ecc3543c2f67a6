//! `GET|PUT /api/repository/settings` (§6.1).

use axum::extract::State;
use axum::Json;
use cae_repository::settings::Settings;

use crate::error::ApiResult;
use crate::state::AppState;

pub async fn get_settings(State(state): State<AppState>) -> ApiResult<Json<Settings>> {
    Ok(Json(state.repository.settings.get()?))
}

pub async fn put_settings(State(state): State<AppState>, Json(settings): Json<Settings>) -> ApiResult<Json<Settings>> {
    Ok(Json(state.repository.settings.put(settings)?))
}
