use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

/// Failures reported by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("seats already taken: {}", .0.join(", "))]
    SeatsTaken(Vec<String>),
    #[error("email already registered")]
    DuplicateEmail,
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("stored record is malformed: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

/// Outcome of a failed ledger operation, scoped to one request.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{0}")]
    Validation(String),
    #[error("seats already taken: {}", .seats.join(", "))]
    SeatsTaken { seats: Vec<String> },
    #[error("Email already registered!")]
    DuplicateEmail,
    #[error("Invalid Login!")]
    InvalidCredentials,
    #[error("storage temporarily unavailable: {0}")]
    Unavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    pub fn validation(message: impl Into<String>) -> Self {
        LedgerError::Validation(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::Validation(_) => "validation",
            LedgerError::SeatsTaken { .. } => "seat_taken",
            LedgerError::DuplicateEmail => "duplicate",
            LedgerError::InvalidCredentials => "invalid_credentials",
            LedgerError::Unavailable(_) => "unavailable",
            LedgerError::Internal(_) => "other",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
            LedgerError::SeatsTaken { .. } | LedgerError::DuplicateEmail => StatusCode::CONFLICT,
            LedgerError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            LedgerError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            LedgerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Callers may resubmit the same request later.
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Unavailable(_))
    }
}

impl From<StoreError> for LedgerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::SeatsTaken(seats) => LedgerError::SeatsTaken { seats },
            StoreError::DuplicateEmail => LedgerError::DuplicateEmail,
            StoreError::Unavailable(msg) => LedgerError::Unavailable(msg),
            StoreError::Corrupt(msg) => LedgerError::Internal(msg),
        }
    }
}

impl From<ValidationErrors> for LedgerError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));

        let message = fields
            .into_iter()
            .filter_map(|(field, errs)| {
                errs.first().map(|e| match &e.message {
                    Some(msg) => msg.to_string(),
                    None => format!("{} is invalid", field),
                })
            })
            .collect::<Vec<_>>()
            .join("; ");
        LedgerError::Validation(message)
    }
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }

        let mut body = json!({
            "status": "error",
            "code": self.code(),
            "message": self.to_string(),
        });
        if let LedgerError::SeatsTaken { seats } = &self {
            body["seats"] = json!(seats);
        }

        (status, Json(body)).into_response()
    }
}
