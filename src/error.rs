// HTTP API error types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

/// HTTP API error with appropriate status codes and client-friendly messages.
///
/// Every fallible path funnels into this enum before it reaches axum. The
/// JSON body is stable: an "error" message, plus an optional "details" string
/// carrying the raw driver text when one exists.
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request: missing/malformed fields, bad enum tags, bad ids
    Validation(String),

    // 409 Conflict: duplicate unique value, or a delete blocked by references
    Conflict {
        message: String,
        detail: Option<String>,
    },

    // 404 Not Found: no row matched the requested id or slug
    NotFound(String),

    // 400 Bad Request: an update that staged zero fields
    NoChange,

    // 500 Internal Server Error: database or filesystem failure
    Persistence {
        message: String,
        detail: Option<String>,
    },
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::Validation(_) => 400,
            ApiError::Conflict { .. } => 409,
            ApiError::NotFound(_) => 404,
            ApiError::NoChange => 400,
            ApiError::Persistence { .. } => 500,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::Validation(msg) => msg,
            ApiError::Conflict { message, .. } => message,
            ApiError::NotFound(msg) => msg,
            ApiError::NoChange => "no fields to update",
            ApiError::Persistence { message, .. } => message,
        }
    }

    /// Raw driver detail, when the error carries one
    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::Conflict { detail, .. } | ApiError::Persistence { detail, .. } => {
                detail.as_deref()
            }
            _ => None,
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut body = json!({ "error": self.message() });
        if let Some(detail) = self.detail() {
            body["details"] = json!(detail);
        }
        body
    }
}

// Static constructor methods
impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict {
            message: message.into(),
            detail: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn persistence(message: impl Into<String>, detail: Option<String>) -> Self {
        ApiError::Persistence {
            message: message.into(),
            detail,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        if matches!(self, ApiError::Persistence { .. }) {
            tracing::error!(
                message = self.message(),
                detail = self.detail(),
                "request failed"
            );
        }
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

/// Translate driver errors into the API taxonomy. Unique violations (23505)
/// and foreign key violations (23503) surface as conflicts with the raw
/// constraint message preserved; anything else is a persistence failure.
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => ApiError::not_found("record not found"),
            sqlx::Error::Database(db) => {
                let detail = Some(db.message().to_string());
                match db.code().as_deref() {
                    Some("23505") => ApiError::Conflict {
                        message: "duplicate value for a unique field".to_string(),
                        detail,
                    },
                    Some("23503") => ApiError::Conflict {
                        message: "operation violates a referential constraint".to_string(),
                        detail,
                    },
                    _ => ApiError::Persistence {
                        message: "database error".to_string(),
                        detail,
                    },
                }
            }
            _ => ApiError::Persistence {
                message: "database error".to_string(),
                detail: Some(err.to_string()),
            },
        }
    }
}

impl From<crate::database::DatabaseError> for ApiError {
    fn from(err: crate::database::DatabaseError) -> Self {
        match err {
            crate::database::DatabaseError::Sqlx(e) => ApiError::from(e),
            other => ApiError::persistence("database unavailable", Some(other.to_string())),
        }
    }
}
