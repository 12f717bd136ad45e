//! Response envelopes and error mapping.
//!
//! # Responsibilities
//! - Wrap successful payloads in `{success, data, message, timestamp}`
//! - Map `ApiError` variants to status codes and `{error, message?, timestamp}` bodies
//! - Turn extractor rejections and handler panics into JSON errors
//!
//! # Design Decisions
//! - Internal errors are logged once, here, with their source chain
//! - Error bodies never carry a `success` field

use std::any::Any;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::observability::logging;

/// Errors surfaced to HTTP clients.
#[derive(Debug, Error)]
pub enum ApiError {
    /// 400 with an optional explanation and extra fields merged into the body.
    #[error("{error}")]
    BadRequest {
        error: String,
        message: Option<String>,
        extra: Option<Map<String, Value>>,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("Access Denied: {0}")]
    AccessDenied(String),

    #[error("Too many requests")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("{error}: {message}")]
    Internal { error: String, message: String },
}

impl ApiError {
    pub fn bad_request(error: impl Into<String>) -> Self {
        ApiError::BadRequest {
            error: error.into(),
            message: None,
            extra: None,
        }
    }

    /// Attach a human-readable explanation to a 400.
    pub fn with_message(self, msg: impl Into<String>) -> Self {
        match self {
            ApiError::BadRequest { error, extra, .. } => ApiError::BadRequest {
                error,
                message: Some(msg.into()),
                extra,
            },
            other => other,
        }
    }

    /// Attach an extra body field to a 400.
    pub fn with_field(self, key: &str, value: Value) -> Self {
        match self {
            ApiError::BadRequest {
                error,
                message,
                extra,
            } => {
                let mut extra = extra.unwrap_or_default();
                extra.insert(key.to_string(), value);
                ApiError::BadRequest {
                    error,
                    message,
                    extra: Some(extra),
                }
            }
            other => other,
        }
    }

    pub fn not_found(error: impl Into<String>) -> Self {
        ApiError::NotFound(error.into())
    }

    pub fn internal(error: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::Internal {
            error: error.into(),
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::AccessDenied(_) => StatusCode::FORBIDDEN,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = Map::new();

        match &self {
            ApiError::BadRequest {
                error,
                message,
                extra,
            } => {
                body.insert("error".into(), json!(error));
                if let Some(message) = message {
                    body.insert("message".into(), json!(message));
                }
                if let Some(extra) = extra {
                    body.extend(extra.clone());
                }
            }
            ApiError::NotFound(error) => {
                body.insert("error".into(), json!(error));
            }
            ApiError::AccessDenied(message) => {
                body.insert("error".into(), json!("Access Denied"));
                body.insert("message".into(), json!(message));
            }
            ApiError::RateLimited { retry_after_secs } => {
                body.insert("error".into(), json!("Too many requests"));
                body.insert(
                    "message".into(),
                    json!("Rate limit exceeded. Please try again later."),
                );
                body.insert("retryAfter".into(), json!(retry_after_secs));
            }
            ApiError::PayloadTooLarge { limit } => {
                body.insert("error".into(), json!("Payload too large"));
                body.insert(
                    "message".into(),
                    json!(format!("Request body exceeds {} bytes", limit)),
                );
            }
            ApiError::Internal { error, message } => {
                logging::enhanced_error(error, &self);
                body.insert("error".into(), json!(error));
                body.insert("message".into(), json!(message));
            }
        }
        body.insert("timestamp".into(), json!(Utc::now().to_rfc3339()));

        (status, Json(Value::Object(body))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request("Invalid JSON body").with_message(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::bad_request("Invalid query parameters").with_message(rejection.body_text())
    }
}

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    #[serde(skip)]
    status: StatusCode,
    success: bool,
    data: T,
    message: String,
    timestamp: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::OK, data, message)
    }

    pub fn created(data: T, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::CREATED, data, message)
    }

    fn with_status(status: StatusCode, data: T, message: impl Into<String>) -> Self {
        Self {
            status,
            success: true,
            data,
            message: message.into(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Panic handler for `CatchPanicLayer`: a 500 in the usual error shape.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response<String> {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown panic message".to_string()
    };

    tracing::error!(category = "error", panic = %detail, "Handler panicked");

    let body = json!({
        "error": "Internal server error",
        "message": detail,
        "timestamp": Utc::now().to_rfc3339(),
    })
    .to_string();

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn bad_request_merges_extra_fields() {
        let response = ApiError::bad_request("Invalid priority")
            .with_field("validPriorities", json!(["low", "medium", "high"]))
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"], "Invalid priority");
        assert_eq!(body["validPriorities"][2], "high");
        assert!(body["timestamp"].is_string());
        assert!(body.get("success").is_none());
    }

    #[tokio::test]
    async fn rate_limited_body_matches_contract() {
        let response = ApiError::RateLimited {
            retry_after_secs: 900,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let body = body_json(response).await;
        assert_eq!(body["error"], "Too many requests");
        assert_eq!(body["message"], "Rate limit exceeded. Please try again later.");
        assert_eq!(body["retryAfter"], 900);
    }

    #[tokio::test]
    async fn envelope_carries_status() {
        let response = ApiResponse::created(json!({"id": "1"}), "Todo created successfully")
            .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["id"], "1");
    }

    #[test]
    fn panic_payload_becomes_message() {
        let response = panic_response(Box::new("kaboom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.body().contains("kaboom"));
    }
}
