use super::AuthError;
use crate::domain_model::*;
use chrono::{DateTime, Utc};

#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("{0} must be set")]
    MissingSecret(&'static str),
    #[error("access and refresh secrets must differ")]
    SharedSecret,
    #[error("{0} must be greater than zero")]
    InvalidTtl(&'static str),
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct IssuedRefreshToken {
    pub token: RefreshToken,
    pub jti: Jti,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct VerifiedRefresh {
    pub principal: Principal,
    pub jti: Jti,
    pub expires_at: DateTime<Utc>,
}

/// Mints signed tokens. Never touches session storage.
pub trait TokenIssuer: Send + Sync {
    fn issue_access_token(
        &self,
        principal: &Principal,
    ) -> Result<(AccessToken, DateTime<Utc>), AuthError>;

    fn issue_refresh_token(&self, principal: &Principal)
    -> Result<IssuedRefreshToken, AuthError>;

    fn issue_token_pair(&self, principal: &Principal) -> Result<TokenPair, AuthError> {
        let (access_token, access_token_expires_at) = self.issue_access_token(principal)?;
        let refresh = self.issue_refresh_token(principal)?;
        Ok(TokenPair {
            access_token,
            access_token_expires_at,
            refresh_token: refresh.token,
            refresh_token_expires_at: refresh.expires_at,
            jti: refresh.jti,
        })
    }
}

pub trait TokenVerifier: Send + Sync {
    fn verify_access(&self, token: &AccessToken) -> Result<Principal, AuthError>;
    fn verify_refresh(&self, token: &RefreshToken) -> Result<VerifiedRefresh, AuthError>;
}
