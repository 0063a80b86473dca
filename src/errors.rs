use crate::providers::Provider;
use crate::scope::ScopeEnd;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::error::Error as StdError;
use std::fmt;

/// Failure of a single enrichment attempt.
///
/// Every variant is terminal: the coordinator never retries and never returns a partial person.
#[derive(Debug)]
pub enum EnrichmentError {
    /// The request could not be sent, or the body could not be read.
    ProviderUnavailable {
        provider: Provider,
        source: reqwest::Error,
    },
    /// The provider answered with anything other than 200.
    ProviderBadStatus {
        provider: Provider,
        status: reqwest::StatusCode,
    },
    /// The body was not the JSON shape the provider promises.
    ProviderDecodeFailure {
        provider: Provider,
        source: serde_json::Error,
    },
    /// The body decoded, but a value does not fit the person record.
    ProviderInvalidValue { provider: Provider, value: String },
    /// The nationality provider returned zero candidates.
    NoNationality,
    /// The caller's scope ended before an outcome was reached.
    Cancelled(ScopeEnd),
    /// A lookup task panicked or could not be built.
    Internal(String),
}

/// Kind-only view of [`EnrichmentError`], handy for matching and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentErrorKind {
    ProviderUnavailable,
    ProviderBadStatus,
    ProviderDecodeFailure,
    NoNationality,
    Cancelled,
    Internal,
}

impl EnrichmentError {
    pub fn kind(&self) -> EnrichmentErrorKind {
        match self {
            EnrichmentError::ProviderUnavailable { .. } => EnrichmentErrorKind::ProviderUnavailable,
            EnrichmentError::ProviderBadStatus { .. } => EnrichmentErrorKind::ProviderBadStatus,
            EnrichmentError::ProviderDecodeFailure { .. }
            | EnrichmentError::ProviderInvalidValue { .. } => {
                EnrichmentErrorKind::ProviderDecodeFailure
            }
            EnrichmentError::NoNationality => EnrichmentErrorKind::NoNationality,
            EnrichmentError::Cancelled(_) => EnrichmentErrorKind::Cancelled,
            EnrichmentError::Internal(_) => EnrichmentErrorKind::Internal,
        }
    }

    /// Provider the failure came from, when there is one.
    pub fn provider(&self) -> Option<Provider> {
        match self {
            EnrichmentError::ProviderUnavailable { provider, .. }
            | EnrichmentError::ProviderBadStatus { provider, .. }
            | EnrichmentError::ProviderDecodeFailure { provider, .. }
            | EnrichmentError::ProviderInvalidValue { provider, .. } => Some(*provider),
            EnrichmentError::NoNationality => Some(Provider::Nationality),
            EnrichmentError::Cancelled(_) | EnrichmentError::Internal(_) => None,
        }
    }
}

impl fmt::Display for EnrichmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnrichmentError::ProviderUnavailable { provider, source } => {
                write!(f, "{} provider unavailable: {}", provider, source)
            }
            EnrichmentError::ProviderBadStatus { provider, status } => {
                write!(f, "{} provider returned {}", provider, status)
            }
            EnrichmentError::ProviderDecodeFailure { provider, source } => {
                write!(f, "failed to decode {} provider response: {}", provider, source)
            }
            EnrichmentError::ProviderInvalidValue { provider, value } => {
                write!(f, "{} provider returned unusable value '{}'", provider, value)
            }
            EnrichmentError::NoNationality => write!(f, "no nationality"),
            EnrichmentError::Cancelled(reason) => write!(f, "enrichment cancelled: {}", reason),
            EnrichmentError::Internal(msg) => write!(f, "enrichment failed: {}", msg),
        }
    }
}

impl StdError for EnrichmentError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            EnrichmentError::ProviderUnavailable { source, .. } => Some(source),
            EnrichmentError::ProviderDecodeFailure { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ScopeEnd> for EnrichmentError {
    fn from(reason: ScopeEnd) -> Self {
        EnrichmentError::Cancelled(reason)
    }
}

/// Input that failed validation before reaching the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: &'static str,
}

impl ValidationError {
    pub const BLANK: &'static str = "cannot be blank";
    pub const FORMAT: &'static str = "must be in a valid format";
    pub const VALUE: &'static str = "must be a valid value";

    pub fn new(field: &'static str, reason: &'static str) -> Self {
        Self { field, reason }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

impl StdError for ValidationError {}

/// Application-specific error types.
#[derive(Debug)]
pub enum AppError {
    /// Database-related errors.
    DatabaseError(sqlx::Error),
    /// Resource not found error.
    NotFound(String),
    /// Bad request error (malformed input).
    BadRequest(String),
    /// Input rejected by the validator.
    Validation(ValidationError),
    /// The enrichment coordinator could not produce a person.
    Enrichment(EnrichmentError),
    /// Internal server error.
    InternalError(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl AppError {
    /// Innermost error with all context layers peeled off.
    pub fn root(&self) -> &AppError {
        match self {
            AppError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AppError::DatabaseError(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            AppError::Enrichment(e) => match e.kind() {
                EnrichmentErrorKind::Cancelled => {
                    tracing::warn!("Enrichment did not finish in time: {}", e);
                    (
                        StatusCode::GATEWAY_TIMEOUT,
                        "Enrichment timed out".to_string(),
                    )
                }
                EnrichmentErrorKind::Internal => {
                    tracing::error!("Enrichment internal error: {}", e);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal server error".to_string(),
                    )
                }
                _ => {
                    tracing::error!("Enrichment provider error: {}", e);
                    (StatusCode::BAD_GATEWAY, e.to_string())
                }
            },
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::WithContext { source, context } => {
                tracing::error!("Error with context: {} -> {}", context, source);
                source.status_and_message()
            }
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::DatabaseError(e) => write!(f, "Database error: {}", e),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Validation(e) => write!(f, "Invalid input: {}", e),
            AppError::Enrichment(e) => write!(f, "Enrichment error: {}", e),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl StdError for AppError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            AppError::DatabaseError(e) => Some(e),
            AppError::Validation(e) => Some(e),
            AppError::Enrichment(e) => Some(e),
            AppError::WithContext { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    /// Maps each error variant to an HTTP status code and a JSON body.
    fn into_response(self) -> Response {
        let (status, error_message) = self.status_and_message();

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err)
    }
}

impl From<EnrichmentError> for AppError {
    fn from(err: EnrichmentError) -> Self {
        AppError::Enrichment(err)
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

/// Extension for sqlx::Error to add context
impl<T> ResultExt<T> for Result<T, sqlx::Error> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::DatabaseError(e)),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::DatabaseError(e)),
            context: f(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_nationality_is_attributed_to_nationality_provider() {
        let err = EnrichmentError::NoNationality;
        assert_eq!(err.kind(), EnrichmentErrorKind::NoNationality);
        assert_eq!(err.provider(), Some(Provider::Nationality));
    }

    #[test]
    fn test_bad_status_maps_to_bad_gateway() {
        let err = AppError::from(EnrichmentError::ProviderBadStatus {
            provider: Provider::Gender,
            status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_invalid_value_maps_to_bad_gateway() {
        let err = EnrichmentError::ProviderInvalidValue {
            provider: Provider::Nationality,
            value: "UKR".to_string(),
        };
        assert_eq!(err.kind(), EnrichmentErrorKind::ProviderDecodeFailure);
        assert_eq!(err.to_string(), "nationality provider returned unusable value 'UKR'");

        let response = AppError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_cancelled_maps_to_gateway_timeout() {
        let err = AppError::from(EnrichmentError::Cancelled(ScopeEnd::DeadlineExceeded));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_context_keeps_underlying_status() {
        let err: Result<(), AppError> = Err(AppError::NotFound("person 3".to_string()));
        let err = err.context("loading person").unwrap_err();

        assert!(matches!(err.root(), AppError::NotFound(_)));
        assert_eq!(err.to_string(), "loading person: Not found: person 3");
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_validation_maps_to_bad_request() {
        let err = AppError::from(ValidationError::new("name", ValidationError::FORMAT));
        assert_eq!(err.to_string(), "Invalid input: name: must be in a valid format");
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
