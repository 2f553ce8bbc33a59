//! Mapping of engine errors onto HTTP responses.
//!
//! Every failure body is `{"detail": "<message>"}`. Server faults are logged
//! and reported with a generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::error;
use serde_json::json;
use thiserror::Error;

use crate::game::GameError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Game(#[from] GameError),

    /// Body or path could not be decoded into the request type.
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Forbidden(String),

    /// Telegram or toncenter could not be reached or refused the call.
    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    Internal(String),
}

pub fn game_status(err: &GameError) -> StatusCode {
    match err {
        e if e.is_internal() => StatusCode::INTERNAL_SERVER_ERROR,
        GameError::NotFound(_) => StatusCode::NOT_FOUND,
        GameError::Unauthorized | GameError::NotLeader(_) | GameError::VipRequired => StatusCode::FORBIDDEN,
        GameError::OnCooldown { .. } | GameError::AdCooldown { .. } => StatusCode::TOO_MANY_REQUESTS,
        GameError::ListingGone => StatusCode::CONFLICT,
        GameError::PaymentUnverified(_) => StatusCode::PAYMENT_REQUIRED,
        _ => StatusCode::BAD_REQUEST,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::Game(err) => {
                let status = game_status(&err);
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    error!("api: {}", err);
                    (status, "Internal server error".to_string())
                } else {
                    (status, err.to_string())
                }
            }
            ApiError::BadRequest(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::Internal(msg) => {
                error!("api: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_are_client_errors() {
        assert_eq!(game_status(&GameError::InsufficientFunds), StatusCode::BAD_REQUEST);
        assert_eq!(game_status(&GameError::NotFound("player 1".into())), StatusCode::NOT_FOUND);
        assert_eq!(
            game_status(&GameError::OnCooldown { remaining_secs: 3 }),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(game_status(&GameError::Unauthorized), StatusCode::FORBIDDEN);
    }

    #[test]
    fn invariant_violation_is_a_server_error() {
        assert_eq!(
            game_status(&GameError::InvariantViolation("cash below zero".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
