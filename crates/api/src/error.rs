use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::DomainError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Subscription inactive: {0}")]
    SubscriptionInactive(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg.clone()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            ApiError::InvalidTransition(msg) => {
                (StatusCode::CONFLICT, "invalid_transition", msg.clone())
            }
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg.clone()),
            ApiError::QuotaExceeded(msg) => {
                (StatusCode::TOO_MANY_REQUESTS, "quota_exceeded", msg.clone())
            }
            ApiError::SubscriptionInactive(msg) => (
                StatusCode::PAYMENT_REQUIRED,
                "subscription_inactive",
                msg.clone(),
            ),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".into(),
                )
            }
            ApiError::ServiceUnavailable(msg) => {
                tracing::error!("Dependency failure: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "service_unavailable",
                    "The service is temporarily unavailable, please try again".into(),
                )
            }
        };

        let body = ErrorBody {
            error: error_code.into(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => ApiError::Validation(msg),
            err @ DomainError::InvalidTransition { .. } => {
                ApiError::InvalidTransition(err.to_string())
            }
            DomainError::Authorization(msg) => ApiError::Forbidden(msg),
            err @ DomainError::QuotaExceeded { .. } => ApiError::QuotaExceeded(err.to_string()),
            DomainError::SubscriptionInactive(msg) => ApiError::SubscriptionInactive(msg),
            DomainError::NotFound(msg) => ApiError::NotFound(msg),
            DomainError::Conflict(msg) => ApiError::Conflict(msg),
            DomainError::Infrastructure(msg) => ApiError::ServiceUnavailable(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::emergency_request::RequestStatus;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_api_error_unauthorized() {
        let response = ApiError::Unauthorized("missing token".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_domain_error_status_mapping() {
        let cases = [
            (DomainError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (
                DomainError::InvalidTransition {
                    from: RequestStatus::Completed,
                    to: RequestStatus::Cancelled,
                },
                StatusCode::CONFLICT,
            ),
            (DomainError::Authorization("no".into()), StatusCode::FORBIDDEN),
            (
                DomainError::QuotaExceeded { used: 2, limit: 2 },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                DomainError::SubscriptionInactive("Subscription expired".into()),
                StatusCode::PAYMENT_REQUIRED,
            ),
            (DomainError::NotFound("request".into()), StatusCode::NOT_FOUND),
            (DomainError::Conflict("raced".into()), StatusCode::CONFLICT),
            (
                DomainError::Infrastructure("pool timed out".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];

        for (err, expected) in cases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[tokio::test]
    async fn test_quota_message_is_specific() {
        let response =
            ApiError::from(DomainError::QuotaExceeded { used: 2, limit: 2 }).into_response();
        let body = body_json(response).await;
        assert_eq!(body["error"], "quota_exceeded");
        assert_eq!(body["message"], "Monthly request limit exceeded (2/2)");
    }

    #[tokio::test]
    async fn test_infrastructure_detail_is_not_leaked() {
        let response = ApiError::from(DomainError::Infrastructure(
            "connection refused at 10.0.0.3".into(),
        ))
        .into_response();
        let body = body_json(response).await;
        assert_eq!(body["error"], "service_unavailable");
        assert!(!body["message"].as_str().unwrap().contains("10.0.0.3"));
    }

    #[tokio::test]
    async fn test_invalid_transition_code() {
        let response = ApiError::from(DomainError::InvalidTransition {
            from: RequestStatus::Pending,
            to: RequestStatus::Completed,
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_json(response).await;
        assert_eq!(body["error"], "invalid_transition");
    }
}
