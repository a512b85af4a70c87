use crate::domain_model::*;
use crate::domain_port::SessionStoreError;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("authentication required")]
    MissingCredentials,
    #[error("token invalid")]
    InvalidToken,
    #[error("token expired")]
    ExpiredToken,
    #[error("refresh token reuse detected")]
    ReuseDetected,
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl From<SessionStoreError> for AuthError {
    fn from(error: SessionStoreError) -> Self {
        AuthError::Infrastructure(error.to_string())
    }
}

/// Credentials as they arrive at the transport boundary.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub access: Option<AccessToken>,
    pub refresh: Option<RefreshToken>,
}

#[derive(Debug, Clone)]
pub struct Authenticated {
    pub principal: Principal,
    /// Set when the request was authenticated through refresh-token rotation.
    /// The new refresh token must replace the old one at the transport boundary
    /// and the new access token must reach the caller out-of-band.
    pub rotated: Option<TokenPair>,
}

#[async_trait::async_trait]
pub trait AuthenticationGate: Send + Sync {
    /// Per-request authentication: access fast path, else refresh-and-rotate.
    async fn authenticate(&self, credentials: Credentials) -> Result<Authenticated, AuthError>;

    /// Mint a token pair for a freshly resolved identity and register its session.
    async fn start_session(&self, principal: &Principal) -> Result<TokenPair, AuthError>;

    /// Consume a refresh token and rotate it, without an access token attempt.
    async fn refresh(&self, refresh_token: &RefreshToken) -> Result<Authenticated, AuthError>;

    /// Revoke the session behind a refresh token. Unverifiable tokens are ignored.
    async fn logout(&self, refresh_token: Option<&RefreshToken>) -> Result<(), AuthError>;

    /// Revoke every session of a subject, returning how many were live.
    async fn logout_all(&self, subject_id: &SubjectId) -> Result<u64, AuthError>;
}
