//! Maps `DomainError` onto the HTTP/WS error surface, using the category ->
//! status table in `clipforge_core::error::ErrorCategory::http_status`.

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use clipforge_core::error::DomainError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
    pub message: String,
}

pub struct ApiError(DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self.0 {
            DomainError::NotFound(msg) => (StatusCode::NOT_FOUND, "not-found".to_string(), msg.clone()),
            DomainError::InvalidTransition(msg) => {
                (StatusCode::CONFLICT, "invalid-transition".to_string(), msg.clone())
            }
            DomainError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "validation".to_string(), msg.clone())
            }
            DomainError::Gone(msg) => (StatusCode::GONE, "gone".to_string(), msg.clone()),
            DomainError::RateLimited { state } => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate-limited".to_string(),
                format!("rate limit exceeded, resets at {}", state.reset_at),
            ),
            DomainError::Categorized { category, message, .. } => {
                let status = StatusCode::from_u16(category.http_status())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (status, category.to_string(), message.clone())
            }
            DomainError::Transport(err) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "system-error".to_string(), err.to_string())
            }
        };

        let mut response = (
            status,
            Json(ApiErrorBody {
                error: code,
                message,
            }),
        )
            .into_response();

        if let DomainError::RateLimited { state } = &self.0 {
            let headers = response.headers_mut();
            insert_header(headers, "x-ratelimit-limit", state.limit);
            insert_header(headers, "x-ratelimit-remaining", state.remaining);
            insert_header(headers, "x-ratelimit-reset", state.reset_at.timestamp());
        }

        response
    }
}

fn insert_header(headers: &mut axum::http::HeaderMap, name: &'static str, value: impl ToString) {
    if let Ok(value) = HeaderValue::from_str(&value.to_string()) {
        headers.insert(name, value);
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status_for(err: DomainError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    fn exceeded_state() -> clipforge_core::ratelimit::RateLimitState {
        clipforge_core::ratelimit::RateLimitState {
            limit_type: clipforge_core::ratelimit::LimitType::DownloadsPerMinute,
            limit: 5,
            remaining: 0,
            reset_at: chrono::Utc::now() + chrono::Duration::seconds(30),
        }
    }

    #[test]
    fn maps_domain_errors_to_expected_statuses() {
        assert_eq!(status_for(DomainError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(DomainError::InvalidTransition("x".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(status_for(DomainError::Validation("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(DomainError::Gone("x".into())), StatusCode::GONE);
        assert_eq!(
            status_for(DomainError::RateLimited { state: exceeded_state() }),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn rate_limited_response_carries_the_three_headers() {
        let response = ApiError::from(DomainError::RateLimited { state: exceeded_state() }).into_response();
        let headers = response.headers();
        assert_eq!(headers.get("x-ratelimit-limit").unwrap(), "5");
        assert_eq!(headers.get("x-ratelimit-remaining").unwrap(), "0");
        assert!(headers.get("x-ratelimit-reset").is_some());
    }

    #[test]
    fn categorized_errors_use_the_category_http_status_table() {
        use clipforge_core::error::ErrorCategory;
        assert_eq!(
            status_for(DomainError::categorized(ErrorCategory::FormatNotFound, "x")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(DomainError::categorized(ErrorCategory::GeoBlocked, "x")),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_for(DomainError::categorized(ErrorCategory::Timeout, "x")),
            StatusCode::GATEWAY_TIMEOUT
        );
    }
}
