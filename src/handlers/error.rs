use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use barberbook::i18n::{t, DEFAULT_LANGUAGE};
use serde_json::json;

use crate::observability::METRICS;
use crate::services::ServiceError;

/// A `ServiceError` on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    error: ServiceError,
    language: String,
}

impl ApiError {
    pub fn internal(msg: impl Into<String>) -> Self {
        ServiceError::Internal(msg.into()).into()
    }

    /// Language used for client-facing messages.
    pub fn in_language(mut self, language: &str) -> Self {
        self.language = language.to_string();
        self
    }
}

impl From<ServiceError> for ApiError {
    fn from(error: ServiceError) -> Self {
        Self {
            error,
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.error {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Blocked => StatusCode::FORBIDDEN,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Store(_) | ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match &self.error {
            ServiceError::Validation(msg)
            | ServiceError::Unauthorized(msg)
            | ServiceError::Conflict(msg)
            | ServiceError::NotFound(msg) => json!({ "error": msg }),
            ServiceError::Blocked => json!({
                "error": "blocked",
                "message": t(&self.language, "booking.blocked"),
            }),
            ServiceError::Store(_) | ServiceError::Internal(_) => {
                tracing::error!("Request failed: {}", self.error);
                METRICS.increment_errors();
                json!({ "error": "Internal server error" })
            }
        };

        HttpResponse::build(self.status_code()).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use barberbook::db::DbError;
    use serde_json::Value;

    async fn body_of(error: ApiError) -> (StatusCode, Value) {
        let response = error.error_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body()).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[actix_web::test]
    async fn test_client_errors_carry_their_message() {
        let (status, body) = body_of(ServiceError::Conflict("Slot already taken".into()).into()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Slot already taken");

        let (status, body) = body_of(ServiceError::Validation("Invalid time slot".into()).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid time slot");

        let (status, _) = body_of(ServiceError::NotFound("Appointment not found".into()).into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = body_of(ServiceError::Unauthorized("Unauthorized".into()).into()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Unauthorized");
    }

    #[actix_web::test]
    async fn test_blocked_message_is_localized() {
        let (status, body) = body_of(ApiError::from(ServiceError::Blocked)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "blocked");
        assert_eq!(body["message"], t("bg", "booking.blocked"));

        let (_, body) = body_of(ApiError::from(ServiceError::Blocked).in_language("en")).await;
        assert_eq!(body["message"], t("en", "booking.blocked"));
    }

    #[actix_web::test]
    async fn test_store_failures_hide_details() {
        let error = ServiceError::Store(DbError::MigrationError("relation missing".into()));
        let (status, body) = body_of(error.into()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "Internal server error" }));
    }
}
