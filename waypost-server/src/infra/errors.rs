use std::fmt;

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value, json};
use waypost_core::{CoordinatorError, Ineligibility};
use waypost_model::ModelError;

pub type AppResult<T> = Result<T, AppError>;

/// Seconds a client should wait before retrying after a store outage.
const RETRY_AFTER_SECS: u64 = 1;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub reason: Option<Ineligibility>,
    pub retry_after: Option<u64>,
}

impl AppError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            reason: None,
            retry_after: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthenticated", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut error = Map::new();
        error.insert("code".into(), json!(self.code));
        error.insert("message".into(), json!(self.message));
        error.insert("status".into(), json!(self.status.as_u16()));
        if let Some(reason) = self.reason
            && let Ok(Value::Object(fields)) = serde_json::to_value(reason)
        {
            error.extend(fields);
        }

        let mut response = (self.status, Json(json!({ "error": error }))).into_response();
        if let Some(secs) = self.retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

impl From<CoordinatorError> for AppError {
    fn from(err: CoordinatorError) -> Self {
        let code = err.code();
        let message = err.to_string();
        match err {
            CoordinatorError::AlreadyActive { .. }
            | CoordinatorError::TripEnded(_)
            | CoordinatorError::NotAtStop(_)
            | CoordinatorError::AlreadyAbsent { .. } => {
                Self::new(StatusCode::CONFLICT, code, message)
            }
            CoordinatorError::NotEligible(reason) => Self {
                reason: Some(reason),
                ..Self::new(StatusCode::UNPROCESSABLE_ENTITY, code, message)
            },
            CoordinatorError::Unauthorized(_) => Self::new(StatusCode::FORBIDDEN, code, message),
            CoordinatorError::NotFound { .. } => Self::new(StatusCode::NOT_FOUND, code, message),
            CoordinatorError::StoreUnavailable(_) => {
                tracing::warn!(error = %message, "store unavailable");
                Self {
                    retry_after: Some(RETRY_AFTER_SECS),
                    ..Self::new(StatusCode::SERVICE_UNAVAILABLE, code, message)
                }
            }
            CoordinatorError::Internal(_) => {
                tracing::error!(error = %message, "coordinator operation failed");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    code,
                    "internal error",
                )
            }
        }
    }
}

impl From<ModelError> for AppError {
    fn from(err: ModelError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use waypost_model::TripId;

    async fn body_of(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn ineligibility_reason_is_flattened_into_the_body() {
        let err = AppError::from(CoordinatorError::NotEligible(
            Ineligibility::WindowClosed {
                elapsed_secs: 421,
                limit_secs: 420,
            },
        ));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = body_of(response).await;
        assert_eq!(body["error"]["code"], "not_eligible");
        assert_eq!(body["error"]["reason"], "window_closed");
        assert_eq!(body["error"]["elapsed_secs"], 421);
        assert_eq!(body["error"]["status"], 422);
    }

    #[tokio::test]
    async fn store_outage_asks_for_a_retry() {
        let response =
            AppError::from(CoordinatorError::StoreUnavailable("pool timed out".into()))
                .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER),
            Some(&HeaderValue::from_static("1"))
        );
    }

    #[test]
    fn lifecycle_conflicts_map_to_409() {
        let trip = TripId::new();
        for err in [
            CoordinatorError::TripEnded(trip),
            CoordinatorError::NotAtStop(trip),
        ] {
            assert_eq!(AppError::from(err).status, StatusCode::CONFLICT);
        }
    }

    #[test]
    fn internal_details_are_not_leaked() {
        let err = AppError::from(CoordinatorError::Internal("constraint xyz".into()));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "internal error");
    }
}
