use refreshgate::api;
use refreshgate::application_impl::ManualClock;
use refreshgate::server::Server;
use refreshgate::settings::{Auth, Http, Log, Secrets, SessionStore, Settings};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use warp::Filter;
use warp::http::StatusCode;
use warp::http::header::SET_COOKIE;

fn settings(dev_login: bool) -> Settings {
    Settings {
        auth: Auth {
            issuer: "refreshgate".to_string(),
            audience: "refreshgate-clients".to_string(),
            access_ttl: "15m".to_string(),
            refresh_ttl: "7d".to_string(),
            leeway_secs: 0,
        },
        session_store: SessionStore {
            backend: "memory".to_string(),
            redis_url: None,
            key_prefix: "refreshgate".to_string(),
            timeout_ms: 1000,
            sweep_interval_secs: 60,
        },
        http: Http {
            address: "127.0.0.1:0".to_string(),
            secure_cookie: true,
            dev_login,
            cert_path: None,
            key_path: None,
        },
        log: Log {
            filter: "info".to_string(),
        },
    }
}

fn secrets() -> Secrets {
    Secrets {
        access_secret: b"access-secret-for-api-tests".to_vec(),
        refresh_secret: b"refresh-secret-for-api-tests".to_vec(),
    }
}

async fn server(dev_login: bool) -> (Arc<Server>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::starting_now());
    let server = Server::with_clock(&settings(dev_login), secrets(), clock.clone())
        .await
        .unwrap();
    (Arc::new(server), clock)
}

fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = std::convert::Infallible> + Clone {
    warp::path("api")
        .and(warp::path("v1"))
        .and(api::v1::routes(server))
        .recover(api::v1::recover_error)
}

fn body(response: &warp::http::Response<warp::hyper::body::Bytes>) -> Value {
    serde_json::from_slice(response.body()).unwrap()
}

fn set_cookie(response: &warp::http::Response<warp::hyper::body::Bytes>) -> String {
    response
        .headers()
        .get(SET_COOKIE)
        .expect("missing Set-Cookie")
        .to_str()
        .unwrap()
        .to_string()
}

fn refresh_from_cookie(cookie: &str) -> String {
    cookie
        .strip_prefix("refresh_token=")
        .and_then(|rest| rest.split(';').next())
        .unwrap()
        .to_string()
}

struct Login {
    access: String,
    refresh: String,
}

async fn login<F>(api: &F, subject_id: &str, role: &str) -> Login
where
    F: Filter + Clone + Send + Sync + 'static,
    F::Extract: warp::Reply + Send,
{
    let response = warp::test::request()
        .method("POST")
        .path("/api/v1/auth/dev_login")
        .json(&json!({
            "subject_id": subject_id,
            "email": format!("{subject_id}@example.com"),
            "role": role,
        }))
        .reply(api)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = set_cookie(&response);
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Strict"));
    assert!(cookie.contains("Secure"));

    let access = body(&response)["data"]["access_token"]
        .as_str()
        .unwrap()
        .to_string();
    assert_eq!(
        response.headers()[api::v1::ACCESS_TOKEN_HEADER].to_str().unwrap(),
        access
    );
    Login {
        access,
        refresh: refresh_from_cookie(&cookie),
    }
}

#[tokio::test]
async fn test_me_with_bearer_token() {
    let (server, _clock) = server(true).await;
    let api = routes(server);
    let alice = login(&api, "alice", "user").await;

    let response = warp::test::request()
        .path("/api/v1/me")
        .header("authorization", format!("Bearer {}", alice.access))
        .reply(&api)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(api::v1::ACCESS_TOKEN_HEADER).is_none());
    let body = body(&response);
    assert_eq!(body["data"]["subject_id"], "alice");
    assert_eq!(body["data"]["role"], "user");
}

#[tokio::test]
async fn test_me_without_credentials_is_unauthenticated() {
    let (server, _clock) = server(true).await;
    let api = routes(server);

    let response = warp::test::request().path("/api/v1/me").reply(&api).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body(&response)["error"]["code"], "Unauthenticated");
}

#[tokio::test]
async fn test_tampered_access_token_is_rejected_without_refresh() {
    let (server, _clock) = server(true).await;
    let api = routes(server);
    let alice = login(&api, "alice", "user").await;

    let response = warp::test::request()
        .path("/api/v1/me")
        .header("authorization", format!("Bearer {}x", alice.access))
        .header("cookie", format!("refresh_token={}", alice.refresh))
        .reply(&api)
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get(SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_expired_access_token_rotates_silently() {
    let (server, clock) = server(true).await;
    let api = routes(server);
    let alice = login(&api, "alice", "user").await;

    clock.advance(Duration::from_secs(15 * 60));

    let response = warp::test::request()
        .path("/api/v1/me")
        .header("authorization", format!("Bearer {}", alice.access))
        .header("cookie", format!("refresh_token={}", alice.refresh))
        .reply(&api)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let new_access = response.headers()[api::v1::ACCESS_TOKEN_HEADER]
        .to_str()
        .unwrap()
        .to_string();
    assert_ne!(new_access, alice.access);
    let new_refresh = refresh_from_cookie(&set_cookie(&response));
    assert_ne!(new_refresh, alice.refresh);

    // The new access token is good on its own.
    let response = warp::test::request()
        .path("/api/v1/me")
        .header("authorization", format!("Bearer {new_access}"))
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_replay_clears_cookie_and_revokes_all() {
    let (server, _clock) = server(true).await;
    let api = routes(server);
    let alice = login(&api, "alice", "user").await;

    let response = warp::test::request()
        .method("POST")
        .path("/api/v1/auth/refresh")
        .header("cookie", format!("refresh_token={}", alice.refresh))
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let rotated = refresh_from_cookie(&set_cookie(&response));
    assert!(body(&response)["data"]["access_token"].is_string());

    let response = warp::test::request()
        .method("POST")
        .path("/api/v1/auth/refresh")
        .header("cookie", format!("refresh_token={}", alice.refresh))
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body(&response)["error"]["code"], "ReuseDetected");
    assert!(set_cookie(&response).contains("Max-Age=0"));

    let response = warp::test::request()
        .method("POST")
        .path("/api/v1/auth/refresh")
        .header("cookie", format!("refresh_token={rotated}"))
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_clears_cookie_and_session() {
    let (server, _clock) = server(true).await;
    let api = routes(server);
    let alice = login(&api, "alice", "user").await;

    let response = warp::test::request()
        .method("POST")
        .path("/api/v1/auth/logout")
        .header("cookie", format!("refresh_token={}", alice.refresh))
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie(&response).contains("Max-Age=0"));

    let response = warp::test::request()
        .method("POST")
        .path("/api/v1/auth/refresh")
        .header("cookie", format!("refresh_token={}", alice.refresh))
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_revoke_requires_admin_role() {
    let (server, _clock) = server(true).await;
    let api = routes(server);
    let alice = login(&api, "alice", "user").await;
    let root = login(&api, "root", "admin").await;

    let response = warp::test::request()
        .method("POST")
        .path("/api/v1/admin/subjects/root/revoke")
        .header("authorization", format!("Bearer {}", alice.access))
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body(&response)["error"]["code"], "Forbidden");

    let response = warp::test::request()
        .method("POST")
        .path("/api/v1/admin/subjects/alice/revoke")
        .header("authorization", format!("Bearer {}", root.access))
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(&response)["data"]["revoked"], 1);

    let response = warp::test::request()
        .method("POST")
        .path("/api/v1/auth/refresh")
        .header("cookie", format!("refresh_token={}", alice.refresh))
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_forbidden_after_rotation_still_hands_over_new_tokens() {
    let (server, clock) = server(true).await;
    let api = routes(server);
    let alice = login(&api, "alice", "user").await;

    clock.advance(Duration::from_secs(15 * 60));

    // Rotation happens while authenticating, before the role check fails.
    let response = warp::test::request()
        .method("POST")
        .path("/api/v1/admin/subjects/bob/revoke")
        .header("authorization", format!("Bearer {}", alice.access))
        .header("cookie", format!("refresh_token={}", alice.refresh))
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body(&response)["error"]["code"], "Forbidden");
    let new_access = response.headers()[api::v1::ACCESS_TOKEN_HEADER]
        .to_str()
        .unwrap()
        .to_string();
    assert_ne!(new_access, alice.access);
    let new_refresh = refresh_from_cookie(&set_cookie(&response));
    assert_ne!(new_refresh, alice.refresh);

    // The client carries on with what it was handed; no reuse is detected.
    let response = warp::test::request()
        .path("/api/v1/me")
        .header("authorization", format!("Bearer {new_access}"))
        .header("cookie", format!("refresh_token={new_refresh}"))
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = warp::test::request()
        .method("POST")
        .path("/api/v1/auth/refresh")
        .header("cookie", format!("refresh_token={new_refresh}"))
        .reply(&api)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_dev_login_disabled_is_not_found() {
    let (server, _clock) = server(false).await;
    let api = routes(server);

    let response = warp::test::request()
        .method("POST")
        .path("/api/v1/auth/dev_login")
        .json(&json!({ "subject_id": "alice", "email": "alice@example.com" }))
        .reply(&api)
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
