use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CustomError {
    #[error("Validation Error: {0}")]
    ValidationError(String),

    #[error("Not Found: {0}")]
    NotFoundError(String),

    #[error("Conflict Error: {message}")]
    ConflictError { field: String, message: String },

    #[error("{0}")]
    DomainError(String),

    #[error("Authentication Error: {0}")]
    AuthenticationError(#[from] AuthError),

    #[error("Forbidden Error: {0}")]
    ForbiddenError(String),

    #[error("Database Error: {0}")]
    DatabaseError(#[from] DbError),

    #[error("Hashing Error: {0}")]
    HashingError(String),
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Connection Error: {0}")]
    ConnectionError(String),

    #[error("Query Error: {0}")]
    QueryBuilderError(String),

    #[error("Insertion Error: {0}")]
    InsertionError(String),

    #[error("Updation Error: {0}")]
    UpdationError(String),

    #[error("Transaction timed out: {0}")]
    Timeout(String),

    #[error("Serialization Failure: {0}")]
    SerializationFailure(String),

    #[error("Other Database Error: {0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("JWT Authentication Error: {0}")]
    JwtAuthenticationError(String),

    #[error("Missing Token: {0}")]
    MissingToken(String),

    #[error("Invalid Credentials: {0}")]
    InvalidCredentials(String),

    #[error("Other Authentication Error: {0}")]
    OtherAuthenticationError(String),
}

impl CustomError {
    pub fn not_found(entity: &str) -> Self {
        CustomError::NotFoundError(format!("{} not found", entity))
    }

    pub fn conflict(field: &str, message: &str) -> Self {
        CustomError::ConflictError {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    pub fn domain(message: impl Into<String>) -> Self {
        CustomError::DomainError(message.into())
    }

    /// Storage faults the caller may retry (lock wait exceeded, serialization conflict).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CustomError::DatabaseError(DbError::Timeout(_))
                | CustomError::DatabaseError(DbError::SerializationFailure(_))
        )
    }

    pub fn is_serialization_failure(&self) -> bool {
        matches!(self, CustomError::DatabaseError(DbError::SerializationFailure(_)))
    }

    pub fn is_infrastructure(&self) -> bool {
        matches!(self, CustomError::DatabaseError(_) | CustomError::HashingError(_))
    }
}

impl ResponseError for CustomError {
    fn status_code(&self) -> StatusCode {
        match self {
            CustomError::ValidationError(_) => StatusCode::BAD_REQUEST,
            CustomError::NotFoundError(_) => StatusCode::NOT_FOUND,
            CustomError::ConflictError { .. } => StatusCode::CONFLICT,
            CustomError::DomainError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CustomError::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            CustomError::ForbiddenError(_) => StatusCode::FORBIDDEN,
            CustomError::HashingError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CustomError::DatabaseError(err) => match err {
                DbError::Timeout(_) | DbError::SerializationFailure(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            CustomError::ConflictError { field, message } => json!({
                "message": self.to_string(),
                "errors": [{ "field": field, "message": message }]
            }),
            // Storage details stay in the logs.
            _ if self.is_infrastructure() => {
                tracing::error!(error = %self, "request failed with infrastructure error");
                json!({ "message": "Internal server error" })
            }
            _ => json!({ "message": self.to_string() }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}
