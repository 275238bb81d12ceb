use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::application::AppError;

/// Response body for errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Wrapper for converting service errors and malformed requests into HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    App(AppError),
    BadRequest(String),
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError::App(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::App(
                AppError::PhoneAlreadyRegistered { .. } | AppError::MirroredSale { .. },
            ) => StatusCode::CONFLICT,
            ApiError::App(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            ApiError::App(e) if e.is_validation() => StatusCode::BAD_REQUEST,
            ApiError::App(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::BadRequest(message) => message,
            ApiError::App(e) if status == StatusCode::INTERNAL_SERVER_ERROR => {
                error!(error = %format!("{e:#}"), "Request failed");
                "Internal server error".to_string()
            }
            ApiError::App(e) => e.to_string(),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
