use super::error::*;
use super::handler;
use super::transport::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::server::*;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{Instrument, info_span};
use warp::{Filter, http, reject};

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let gate = server.authentication_gate.clone();
    let policy = CookiePolicy {
        max_age: server.refresh_ttl,
        secure: server.secure_cookie,
    };

    let me = warp::path("me")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_authentication(gate.clone()))
        .and(with_policy(policy.clone()))
        .and_then(handler::me);

    let refresh = warp::path!("auth" / "refresh")
        .and(warp::post())
        .and(warp::cookie::optional::<String>(REFRESH_COOKIE))
        .and(with(gate.clone()))
        .and(with_policy(policy.clone()))
        .and_then(handler::refresh);

    let logout = warp::path!("auth" / "logout")
        .and(warp::post())
        .and(warp::cookie::optional::<String>(REFRESH_COOKIE))
        .and(with(gate.clone()))
        .and_then(handler::logout);

    let logout_all = warp::path!("auth" / "logout_all")
        .and(warp::post())
        .and(with_authentication(gate.clone()))
        .and(with(gate.clone()))
        .and(with_policy(policy.clone()))
        .and_then(handler::logout_all);

    let revoke_subject = warp::path!("admin" / "subjects" / String / "revoke")
        .and(warp::post())
        .and(with_authentication(gate.clone()))
        .and(with(gate.clone()))
        .and(with_policy(policy.clone()))
        .and_then(handler::revoke_subject);

    let dev_login = warp::path!("auth" / "dev_login")
        .and(warp::post())
        .and(enabled(server.dev_login))
        .and(warp::body::json())
        .and(with(gate.clone()))
        .and(with_policy(policy))
        .and_then(handler::dev_login);

    me.or(refresh)
        .or(logout)
        .or(logout_all)
        .or(revoke_subject)
        .or(dev_login)
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

fn with_policy(
    policy: CookiePolicy,
) -> impl Filter<Extract = (CookiePolicy,), Error = Infallible> + Clone {
    warp::any().map(move || policy.clone())
}

fn enabled(flag: bool) -> impl Filter<Extract = (), Error = warp::Rejection> + Clone {
    warp::any()
        .and_then(move || async move {
            if flag {
                Ok(())
            } else {
                Err(reject::not_found())
            }
        })
        .untuple_one()
}

/// Resolves the caller from the bearer header, falling back to the refresh
/// cookie. Rotated credentials ride along in [`Authenticated::rotated`] for the
/// handler to attach.
fn with_authentication(
    gate: Arc<dyn AuthenticationGate>,
) -> impl Filter<Extract = (Authenticated,), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>(http::header::AUTHORIZATION.as_ref())
        .and(warp::cookie::optional::<String>(REFRESH_COOKIE))
        .and_then(move |authorization: Option<String>, refresh: Option<String>| {
            let gate = gate.clone();
            async move {
                let access = match authorization {
                    Some(header) => Some(
                        bearer_token(&header)
                            .ok_or_else(|| reject::custom(ApiErrorCode::Unauthenticated))?,
                    ),
                    None => None,
                };
                let credentials = Credentials {
                    access,
                    refresh: refresh.map(RefreshToken),
                };
                let request_id = nanoid::nanoid!(10);
                gate.authenticate(credentials)
                    .instrument(info_span!("authenticate", %request_id))
                    .await
                    .map_err(ApiErrorCode::from)
                    .map_err(reject::custom)
            }
        })
}
