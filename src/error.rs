use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use validator::{ValidationErrors, ValidationErrorsKind};

pub const PROFILE_INCOMPLETE_MESSAGE: &str = "Please complete your health profile first.";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{}", PROFILE_INCOMPLETE_MESSAGE)]
    ProfileIncomplete { missing: Vec<String> },

    #[error("Invalid fields: {}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(errors: &ValidationErrors) -> Self {
        AppError::Validation(field_paths(errors))
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "bad_request",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::ProfileIncomplete { .. } => "profile_incomplete",
            AppError::Validation(_) => "validation_failed",
            AppError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ProfileIncomplete { .. } => StatusCode::PRECONDITION_FAILED,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::ProfileIncomplete { missing } | AppError::Validation(missing) => json!({
                "error": self.code(),
                "message": self.to_string(),
                "missing": missing,
            }),
            AppError::Internal(e) => {
                tracing::error!(error = ?e, "internal error");
                json!({ "error": self.code(), "message": "Internal server error" })
            }
            _ => json!({ "error": self.code(), "message": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

/// Flattens nested validator errors into dotted field paths, sorted.
pub fn field_paths(errors: &ValidationErrors) -> Vec<String> {
    fn walk(prefix: &str, errors: &ValidationErrors, out: &mut Vec<String>) {
        for (field, kind) in errors.errors() {
            let path = if prefix.is_empty() {
                field.to_string()
            } else {
                format!("{prefix}.{field}")
            };
            match kind {
                ValidationErrorsKind::Field(_) => out.push(path),
                ValidationErrorsKind::Struct(inner) => walk(&path, inner, out),
                ValidationErrorsKind::List(items) => {
                    for (idx, inner) in items {
                        walk(&format!("{path}[{idx}]"), inner, out);
                    }
                }
            }
        }
    }

    let mut out = Vec::new();
    walk("", errors, &mut out);
    out.sort();
    out
}
