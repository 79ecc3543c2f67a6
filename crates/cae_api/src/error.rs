//! REST error envelope (§6.7): every non-2xx response body is a
//! `CaeError` as-is, whether it came from a `CoreError` the Core
//! returned or was synthesized here for a request this layer rejects
//! before it ever reaches the Core (malformed JSON, a missing
//! multipart field).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cae_core::CoreError;
use cae_protocol::{CaeError, CaeErrorCode, Severity, Stage};

pub struct ApiError {
    status: StatusCode,
    body: CaeError,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: CaeError::new(CaeErrorCode::ProposalInvalid, Stage::ProposalValidation, Severity::Error, message),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            body: CaeError::new(CaeErrorCode::ProposalInvalid, Stage::ProposalValidation, Severity::Error, message),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::UNPROCESSABLE_ENTITY);
        Self { status, body: err.to_cae_error() }
    }
}

impl From<cae_repository::RepositoryError> for ApiError {
    fn from(err: cae_repository::RepositoryError) -> Self {
        CoreError::from(err).into()
    }
}

impl From<cae_matching::MatchingError> for ApiError {
    fn from(err: cae_matching::MatchingError) -> Self {
        CoreError::from(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
