use super::error::ApiErrorCode;
use crate::domain_model::*;
use std::time::Duration;
use warp::Reply;
use warp::http::HeaderValue;
use warp::http::header::SET_COOKIE;
use warp::reply::Response;

/// Response header carrying a freshly rotated access token.
pub const ACCESS_TOKEN_HEADER: &str = "x-access-token";
pub const REFRESH_COOKIE: &str = "refresh_token";

pub fn bearer_token(authorization: &str) -> Option<AccessToken> {
    authorization
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| AccessToken(token.to_string()))
}

#[derive(Debug, Clone)]
pub struct CookiePolicy {
    pub max_age: Duration,
    pub secure: bool,
}

impl CookiePolicy {
    pub fn refresh_cookie(&self, token: &RefreshToken) -> String {
        let mut cookie = format!(
            "{REFRESH_COOKIE}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
            token.0,
            self.max_age.as_secs()
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    pub fn cleared_cookie() -> String {
        format!("{REFRESH_COOKIE}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0")
    }
}

fn header_value(value: &str) -> Result<HeaderValue, ApiErrorCode> {
    HeaderValue::from_str(value).map_err(ApiErrorCode::internal)
}

/// Attaches freshly issued credentials: the refresh token replaces the cookie
/// and the access token travels in [`ACCESS_TOKEN_HEADER`], leaving the body
/// to the handler.
pub fn with_session_headers(
    reply: impl Reply,
    issued: Option<&TokenPair>,
    policy: &CookiePolicy,
) -> Result<Response, ApiErrorCode> {
    let mut response = reply.into_response();
    if let Some(tokens) = issued {
        let headers = response.headers_mut();
        headers.append(
            SET_COOKIE,
            header_value(&policy.refresh_cookie(&tokens.refresh_token))?,
        );
        headers.insert(ACCESS_TOKEN_HEADER, header_value(&tokens.access_token.0)?);
    }
    Ok(response)
}

pub fn with_cleared_session(reply: impl Reply) -> Result<Response, ApiErrorCode> {
    let mut response = reply.into_response();
    response
        .headers_mut()
        .append(SET_COOKIE, header_value(&CookiePolicy::cleared_cookie())?);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token() {
        assert_eq!(
            bearer_token("Bearer abc.def.ghi").map(|t| t.0),
            Some("abc.def.ghi".to_string())
        );
        assert!(bearer_token("Basic dXNlcjpwYXNz").is_none());
        assert!(bearer_token("Bearer ").is_none());
    }

    #[test]
    fn test_refresh_cookie_attributes() {
        let policy = CookiePolicy {
            max_age: Duration::from_secs(7 * 24 * 60 * 60),
            secure: true,
        };
        let cookie = policy.refresh_cookie(&RefreshToken("tok".to_string()));

        assert!(cookie.starts_with("refresh_token=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Max-Age=604800"));
        assert!(cookie.ends_with("; Secure"));
    }
}
