use super::handler::ApiResponse;
use super::transport::{CookiePolicy, with_cleared_session, with_session_headers};
use crate::application_port::*;
use crate::domain_model::TokenPair;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::{error, warn};
use warp::http::StatusCode;
use warp::reply::{Json, WithStatus};
use warp::{Rejection, Reply, reject};

pub async fn recover_error(err: Rejection) -> Result<warp::reply::Response, Infallible> {
    if let Some(failure) = err.find::<RotatedFailure>() {
        // The old refresh token is already consumed; the client must still
        // receive its replacement or its next request reads as reuse.
        let reply = error_reply(&failure.code);
        Ok(with_session_headers(reply, Some(&failure.rotated), &failure.policy)
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()))
    } else if let Some(code) = err.find::<ApiErrorCode>() {
        let reply = error_reply(code);
        if code.ends_session() {
            return Ok(with_cleared_session(reply)
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()));
        }
        Ok(reply.into_response())
    } else if err.is_not_found() {
        Ok(StatusCode::NOT_FOUND.into_response())
    } else if err.find::<reject::MethodNotAllowed>().is_some() {
        Ok(StatusCode::METHOD_NOT_ALLOWED.into_response())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        let json = warp::reply::json(&ApiResponse::<()>::err(
            ApiErrorCode::BadRequest,
            e.to_string(),
        ));
        Ok(warp::reply::with_status(json, StatusCode::BAD_REQUEST).into_response())
    } else {
        error!("unhandled rejection: {:?}", err);
        Ok(error_reply(&ApiErrorCode::InternalError).into_response())
    }
}

fn error_reply(code: &ApiErrorCode) -> WithStatus<Json> {
    let json = warp::reply::json(&ApiResponse::<()>::err(code.clone(), code.to_string()));
    warp::reply::with_status(json, code.status())
}

/// A handler failure on a request that was authenticated by rotating its
/// refresh token. Carries the new pair so the error response can hand it over.
#[derive(Debug)]
pub struct RotatedFailure {
    pub code: ApiErrorCode,
    pub rotated: TokenPair,
    pub policy: CookiePolicy,
}

impl reject::Reject for RotatedFailure {}

impl RotatedFailure {
    pub fn reject(
        code: ApiErrorCode,
        rotated: Option<&TokenPair>,
        policy: &CookiePolicy,
    ) -> Rejection {
        match rotated {
            Some(tokens) => reject::custom(RotatedFailure {
                code,
                rotated: tokens.clone(),
                policy: policy.clone(),
            }),
            None => reject::custom(code),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Error, Serialize, PartialEq, Eq)]
pub enum ApiErrorCode {
    #[error("Authentication required")]
    Unauthenticated,
    #[error("Refresh token reuse detected")]
    ReuseDetected,
    #[error("Permission denied")]
    Forbidden,
    #[error("Malformed request")]
    BadRequest,
    #[error("Service temporarily unavailable")]
    ServiceUnavailable,
    #[error("Internal error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn internal<E: std::fmt::Display>(error: E) -> ApiErrorCode {
        warn!("Internal error: {}", error);
        ApiErrorCode::InternalError
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::Unauthenticated | ApiErrorCode::ReuseDetected => StatusCode::UNAUTHORIZED,
            ApiErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ApiErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ApiErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the client's refresh cookie should be dropped.
    fn ends_session(&self) -> bool {
        matches!(self, ApiErrorCode::ReuseDetected)
    }
}

impl reject::Reject for ApiErrorCode {}

impl From<AuthError> for ApiErrorCode {
    fn from(error: AuthError) -> Self {
        match error {
            // Collapsed so the client cannot tell which factor failed.
            AuthError::MissingCredentials | AuthError::InvalidToken | AuthError::ExpiredToken => {
                ApiErrorCode::Unauthenticated
            }
            AuthError::ReuseDetected => ApiErrorCode::ReuseDetected,
            AuthError::Infrastructure(e) => {
                warn!("Infrastructure error: {}", e);
                ApiErrorCode::ServiceUnavailable
            }
            AuthError::InternalError(e) => ApiErrorCode::internal(e),
        }
    }
}

impl From<AccessError> for ApiErrorCode {
    fn from(error: AccessError) -> Self {
        warn!("Access denied: {}", error);
        ApiErrorCode::Forbidden
    }
}
