//! HTTP error responses: HTML for pages, JSON for the API.

use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
};
use serde_json::json;

use crate::domain::error::JournalError;

fn status_for(err: &JournalError) -> StatusCode {
    match err {
        JournalError::NotFound { .. } => StatusCode::NOT_FOUND,
        JournalError::Import { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        JournalError::ConfigMissing { .. }
        | JournalError::ConfigInvalid { .. }
        | JournalError::ConfigParse { .. } => StatusCode::BAD_REQUEST,
        JournalError::Database { .. }
        | JournalError::DatabaseQuery { .. }
        | JournalError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Error rendered as an HTML page.
#[derive(Debug)]
pub struct WebError {
    pub status: StatusCode,
    pub message: String,
}

impl WebError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl From<JournalError> for WebError {
    fn from(err: JournalError) -> Self {
        let status = status_for(&err);
        if status.is_server_error() {
            tracing::error!(error = %err, "page request failed");
        }
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let template = super::templates::ErrorTemplate {
            message: self.message.clone(),
            status: self.status.as_u16(),
        };
        match template.render() {
            Ok(html) => (self.status, Html(html)).into_response(),
            Err(_) => (self.status, self.message).into_response(),
        }
    }
}

/// Error rendered as a JSON `{"error": ...}` body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }
}

impl From<JournalError> for ApiError {
    fn from(err: JournalError) -> Self {
        let status = status_for(&err);
        if status.is_server_error() {
            tracing::error!(error = %err, "api request failed");
        }
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
