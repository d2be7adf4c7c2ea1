use std::collections::HashMap;

use thiserror::Error;

/// Service error types.
///
/// Each variant maps to an HTTP status code via [`AppError::status_code`].
/// Use [`AppError::into_response`] to produce the standard JSON error body
/// `{ "error": "..." }`.
#[derive(Error, Debug)]
pub enum AppError {
    // --- 400 Bad Request ---
    #[error("{0}")]
    BadRequest(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Validation error: {0}")]
    Validation(String),

    // --- 401 Unauthorized ---
    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Session not found or expired")]
    SessionNotFound,

    // --- 403 Forbidden ---
    #[error("{0}")]
    Forbidden(String),

    #[error("Insufficient permissions")]
    Unauthorized,

    // --- 404 Not Found ---
    #[error("{0}")]
    NotFound(String),

    // --- 409 Conflict ---
    #[error("{0}")]
    Conflict(String),

    // --- 413 Payload Too Large ---
    #[error("{0}")]
    PayloadTooLarge(String),

    // --- 422 Unprocessable Entity ---
    #[error("Validation failed")]
    InvalidFields(HashMap<String, Vec<String>>),

    // --- 429 Too Many Requests ---
    #[error("Too many requests. Please try again later.")]
    RateLimited { retry_after: u64 },

    // --- 500 Internal Server Error ---
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Database(#[from] DatabaseError),

    #[error("{0}")]
    Identity(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),
}

impl AppError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            // 400
            Self::BadRequest(_) | Self::InvalidRequest(_) | Self::Validation(_) => 400,
            // 401
            Self::InvalidCredentials | Self::Unauthenticated | Self::SessionNotFound => 401,
            // 403
            Self::Forbidden(_) | Self::Unauthorized => 403,
            // 404
            Self::NotFound(_) => 404,
            // 409
            Self::Conflict(_) => 409,
            // 413
            Self::PayloadTooLarge(_) => 413,
            // 422
            Self::InvalidFields(_) => 422,
            // 429
            Self::RateLimited { .. } => 429,
            // 500
            Self::Config(_)
            | Self::Database(_)
            | Self::Identity(_)
            | Self::Serialization(_)
            | Self::Internal(_)
            | Self::PasswordHash(_) => 500,
        }
    }

    /// Whether the failure came from the database or the identity provider.
    pub fn is_downstream(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Identity(_))
    }

    /// Message safe to show to the caller.
    ///
    /// Downstream failures are passed through as-is; other server-side
    /// failures collapse to a generic message.
    pub fn public_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Identity(_) => self.to_string(),
            _ if self.status_code() == 500 => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    /// Convert this error into a JSON response: `{ "error": "..." }`.
    pub fn into_response(self) -> crate::types::AppResponse {
        let status = self.status_code();
        self.into_response_with_status(status)
    }

    /// Like [`AppError::into_response`] but with a fixed status code.
    ///
    /// Used by endpoints whose contract flattens every failure to a single
    /// status (CSV exports answer 403, logout answers 400).
    pub fn into_response_with_status(self, status: u16) -> crate::types::AppResponse {
        if self.is_downstream() {
            tracing::error!(error = %self, "downstream failure");
        }

        let message = self.public_message();
        let body = match &self {
            Self::InvalidFields(fields) => serde_json::json!({
                "error": message,
                "fieldErrors": fields,
            }),
            _ => serde_json::json!({ "error": message }),
        };
        let response = crate::types::AppResponse::json(status, &body)
            .unwrap_or_else(|_| crate::types::AppResponse::text(status, &message));

        match self {
            Self::RateLimited { retry_after } => {
                response.with_header("Retry-After", retry_after.to_string())
            }
            _ => response,
        }
    }

    // --- Constructors ---

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn identity(message: impl Into<String>) -> Self {
        Self::Identity(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// 422 failure for a single input field.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut fields = HashMap::new();
        fields.insert(field.into(), vec![message.into()]);
        Self::InvalidFields(fields)
    }
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Record not found: {0}")]
    RecordNotFound(String),
}

pub type AppResult<T> = Result<T, AppError>;

/// Collect `validator::ValidationErrors` into `field -> [message, ...]`.
///
/// Nested structs and lists are flattened into dotted paths such as
/// `questions[1].options`.
pub fn field_errors(errors: &validator::ValidationErrors) -> HashMap<String, Vec<String>> {
    let mut out = HashMap::new();
    collect_field_errors(errors, "", &mut out);
    out
}

fn collect_field_errors(
    errors: &validator::ValidationErrors,
    prefix: &str,
    out: &mut HashMap<String, Vec<String>>,
) {
    use validator::ValidationErrorsKind;

    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };

        match kind {
            ValidationErrorsKind::Field(errs) => {
                let messages = errs.iter().map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid value for {}", field))
                });
                out.entry(path).or_default().extend(messages);
            }
            ValidationErrorsKind::Struct(inner) => collect_field_errors(inner, &path, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_field_errors(inner, &format!("{}[{}]", path, index), out);
                }
            }
        }
    }
}

/// Convert `validator::ValidationErrors` into a standardized error response.
///
/// Returns a 422 response with
/// `{ "error": "Validation failed", "fieldErrors": { "field": ["..."] } }`.
pub fn validation_error_response(
    errors: &validator::ValidationErrors,
) -> crate::types::AppResponse {
    AppError::InvalidFields(field_errors(errors)).into_response()
}

/// Validate a request body, returning a parsed + validated value or an error response.
pub fn validate_request_body<T>(
    req: &crate::types::AppRequest,
) -> Result<T, crate::types::AppResponse>
where
    T: serde::de::DeserializeOwned + validator::Validate,
{
    let value: T = req.body_as_json().map_err(|e| {
        crate::types::AppResponse::json(
            400,
            &serde_json::json!({
                "error": format!("Invalid JSON: {}", e),
            }),
        )
        .unwrap_or_else(|_| crate::types::AppResponse::text(400, "Invalid JSON"))
    })?;

    value.validate().map_err(|e| validation_error_response(&e))?;

    Ok(value)
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        // Inherent method: renders the framework-independent response.
        let response = AppError::into_response(self);

        let mut builder = axum::http::Response::builder().status(response.status);
        for (name, value) in &response.headers {
            builder = builder.header(name, value);
        }
        builder
            .body(axum::body::Body::from(response.body))
            .unwrap_or_else(|_| {
                axum::response::IntoResponse::into_response(
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::bad_request("x").status_code(), 400);
        assert_eq!(AppError::Unauthenticated.status_code(), 401);
        assert_eq!(AppError::forbidden("no").status_code(), 403);
        assert_eq!(AppError::RateLimited { retry_after: 3 }.status_code(), 429);
        assert_eq!(AppError::internal("boom").status_code(), 500);
    }

    #[test]
    fn test_internal_message_is_hidden() {
        let response = AppError::internal("stack trace here").into_response();
        let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(response.status, 500);
        assert_eq!(body["error"], "Internal server error");
    }

    #[test]
    fn test_database_message_passes_through() {
        let err = AppError::from(DatabaseError::Constraint(
            "duplicate key value violates unique constraint".to_string(),
        ));
        let response = err.into_response();
        let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(
            body["error"],
            "Constraint violation: duplicate key value violates unique constraint"
        );
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = AppError::RateLimited { retry_after: 42 }.into_response();
        assert_eq!(response.status, 429);
        assert_eq!(response.headers.get("Retry-After").unwrap(), "42");
    }

    #[test]
    fn test_invalid_field_response() {
        let response = AppError::invalid_field("score", "Score exceeds maximum").into_response();
        let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(response.status, 422);
        assert_eq!(body["error"], "Validation failed");
        assert_eq!(body["fieldErrors"]["score"][0], "Score exceeds maximum");
    }

    #[test]
    fn test_fixed_status_override() {
        let response = AppError::not_found("Student not found").into_response_with_status(403);
        let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(response.status, 403);
        assert_eq!(body["error"], "Student not found");
    }
}
