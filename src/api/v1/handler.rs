use super::error::*;
use super::transport::*;
use crate::application_impl::RoleGuard;
use crate::application_port::*;
use crate::domain_model::*;
use crate::logger::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::reject;
use warp::reply::Response;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct AccessTokenResponse {
    access_token: AccessToken,
    access_token_expires_at: DateTime<Utc>,
}

impl From<&TokenPair> for AccessTokenResponse {
    fn from(tokens: &TokenPair) -> Self {
        AccessTokenResponse {
            access_token: tokens.access_token.clone(),
            access_token_expires_at: tokens.access_token_expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct RevokedResponse {
    revoked: u64,
}

pub async fn me(auth: Authenticated, policy: CookiePolicy) -> Result<Response, warp::Rejection> {
    let reply = warp::reply::json(&ApiResponse::ok(&auth.principal));
    with_session_headers(reply, auth.rotated.as_ref(), &policy).map_err(reject::custom)
}

pub async fn refresh(
    refresh_cookie: Option<String>,
    gate: Arc<dyn AuthenticationGate>,
    policy: CookiePolicy,
) -> Result<Response, warp::Rejection> {
    let token = refresh_cookie
        .map(RefreshToken)
        .ok_or_else(|| reject::custom(ApiErrorCode::Unauthenticated))?;

    let auth = gate
        .refresh(&token)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;
    let tokens = auth
        .rotated
        .as_ref()
        .ok_or_else(|| reject::custom(ApiErrorCode::internal("refresh returned no tokens")))?;

    let reply = warp::reply::json(&ApiResponse::ok(AccessTokenResponse::from(tokens)));
    with_session_headers(reply, Some(tokens), &policy).map_err(reject::custom)
}

pub async fn logout(
    refresh_cookie: Option<String>,
    gate: Arc<dyn AuthenticationGate>,
) -> Result<Response, warp::Rejection> {
    let token = refresh_cookie.map(RefreshToken);
    gate.logout(token.as_ref())
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    with_cleared_session(warp::reply::json(&ApiResponse::ok(()))).map_err(reject::custom)
}

pub async fn logout_all(
    auth: Authenticated,
    gate: Arc<dyn AuthenticationGate>,
    policy: CookiePolicy,
) -> Result<Response, warp::Rejection> {
    let revoked = gate
        .logout_all(&auth.principal.subject_id)
        .await
        .map_err(|e| RotatedFailure::reject(e.into(), auth.rotated.as_ref(), &policy))?;

    with_cleared_session(warp::reply::json(&ApiResponse::ok(RevokedResponse { revoked })))
        .map_err(reject::custom)
}

pub async fn revoke_subject(
    subject_id: String,
    auth: Authenticated,
    gate: Arc<dyn AuthenticationGate>,
    policy: CookiePolicy,
) -> Result<Response, warp::Rejection> {
    RoleGuard::check(&auth.principal, Role::Admin)
        .map_err(|e| RotatedFailure::reject(e.into(), auth.rotated.as_ref(), &policy))?;

    let subject_id = SubjectId(subject_id);
    let revoked = gate
        .logout_all(&subject_id)
        .await
        .map_err(|e| RotatedFailure::reject(e.into(), auth.rotated.as_ref(), &policy))?;
    info!(admin = %auth.principal.subject_id, subject = %subject_id, revoked, "sessions revoked by admin");

    let reply = warp::reply::json(&ApiResponse::ok(RevokedResponse { revoked }));
    with_session_headers(reply, auth.rotated.as_ref(), &policy).map_err(reject::custom)
}

#[derive(Debug, Deserialize)]
pub struct DevLoginRequest {
    pub subject_id: String,
    pub email: String,
    #[serde(default = "default_role")]
    pub role: Role,
}

fn default_role() -> Role {
    Role::User
}

/// Stands in for an external identity provider: whoever calls this is
/// trusted to be the subject they name.
pub async fn dev_login(
    request: DevLoginRequest,
    gate: Arc<dyn AuthenticationGate>,
    policy: CookiePolicy,
) -> Result<Response, warp::Rejection> {
    let principal = Principal::new(request.subject_id, request.email, request.role);
    let tokens = gate
        .start_session(&principal)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    let reply = warp::reply::json(&ApiResponse::ok(AccessTokenResponse::from(&tokens)));
    with_session_headers(reply, Some(&tokens), &policy).map_err(reject::custom)
}
