use super::Clock;
use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub leeway: Duration,
    pub access_secret: Vec<u8>,
    pub refresh_secret: Vec<u8>,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("leeway", &self.leeway)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct AccessClaims {
    sub: String,
    email: String,
    role: Role,
    exp: i64,
    iat: i64,
    iss: String,
    aud: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct RefreshClaims {
    sub: String,
    email: String,
    role: Role,
    exp: i64,
    iat: i64,
    iss: String,
    aud: String,
    jti: String,
}

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKeys {
    fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// HS256 issuer and verifier for both token classes.
///
/// Access and refresh tokens are signed with different secrets, so a token of
/// one class never verifies as the other. Expiry is checked against the
/// injected [`Clock`] after the signature has been verified.
pub struct JwtTokenCodec {
    issuer: String,
    audience: String,
    access_ttl: TimeDelta,
    refresh_ttl: TimeDelta,
    leeway: TimeDelta,
    access_keys: SigningKeys,
    refresh_keys: SigningKeys,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl JwtTokenCodec {
    pub fn try_new(cfg: JwtConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigurationError> {
        if cfg.access_secret.is_empty() {
            return Err(ConfigurationError::MissingSecret("ACCESS_SECRET"));
        }
        if cfg.refresh_secret.is_empty() {
            return Err(ConfigurationError::MissingSecret("REFRESH_SECRET"));
        }
        if cfg.access_secret == cfg.refresh_secret {
            return Err(ConfigurationError::SharedSecret);
        }
        if cfg.access_ttl.is_zero() {
            return Err(ConfigurationError::InvalidTtl("ACCESS_TTL"));
        }
        if cfg.refresh_ttl.is_zero() {
            return Err(ConfigurationError::InvalidTtl("REFRESH_TTL"));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_issuer(&[cfg.issuer.clone()]);
        validation.set_audience(&[cfg.audience.clone()]);

        let now = clock.now();
        Ok(JwtTokenCodec {
            access_ttl: to_time_delta("ACCESS_TTL", cfg.access_ttl, now)?,
            refresh_ttl: to_time_delta("REFRESH_TTL", cfg.refresh_ttl, now)?,
            leeway: to_time_delta("leeway", cfg.leeway, now)?,
            access_keys: SigningKeys::from_secret(&cfg.access_secret),
            refresh_keys: SigningKeys::from_secret(&cfg.refresh_secret),
            issuer: cfg.issuer,
            audience: cfg.audience,
            validation,
            clock,
        })
    }

    fn sign<T: Serialize>(&self, claims: &T, key: &EncodingKey) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, key)
            .map_err(|e| AuthError::InternalError(e.to_string()))
    }

    fn decode_claims<T: DeserializeOwned>(
        &self,
        token: &str,
        key: &DecodingKey,
    ) -> Result<T, AuthError> {
        decode::<T>(token, key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "token rejected");
                AuthError::InvalidToken
            })
    }

    fn check_expiry(&self, exp: i64) -> Result<DateTime<Utc>, AuthError> {
        let expires_at = DateTime::from_timestamp(exp, 0).ok_or(AuthError::InvalidToken)?;
        let deadline = expires_at
            .checked_add_signed(self.leeway)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        if self.clock.now() >= deadline {
            return Err(AuthError::ExpiredToken);
        }
        Ok(expires_at)
    }

    #[inline]
    fn principal(sub: String, email: String, role: Role) -> Result<Principal, AuthError> {
        if sub.is_empty() {
            return Err(AuthError::InvalidToken);
        }
        Ok(Principal {
            subject_id: SubjectId(sub),
            email,
            role,
        })
    }
}

/// Converts a configured duration, rejecting any that cannot be added to the
/// current time.
fn to_time_delta(
    key: &'static str,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<TimeDelta, ConfigurationError> {
    let invalid = |reason: String| ConfigurationError::InvalidValue {
        key: key.to_string(),
        reason,
    };
    let delta = TimeDelta::from_std(ttl).map_err(|e| invalid(e.to_string()))?;
    now.checked_add_signed(delta)
        .ok_or_else(|| invalid(format!("{}s is out of range", ttl.as_secs())))?;
    Ok(delta)
}

fn expiry(issued_at: DateTime<Utc>, ttl: TimeDelta) -> Result<DateTime<Utc>, AuthError> {
    issued_at
        .checked_add_signed(ttl)
        .ok_or_else(|| AuthError::InternalError("token expiry out of range".to_string()))
}

impl TokenIssuer for JwtTokenCodec {
    fn issue_access_token(
        &self,
        principal: &Principal,
    ) -> Result<(AccessToken, DateTime<Utc>), AuthError> {
        let iat_dt = self.clock.now();
        let exp_dt = expiry(iat_dt, self.access_ttl)?;
        let claims = AccessClaims {
            sub: principal.subject_id.0.clone(),
            email: principal.email.clone(),
            role: principal.role,
            exp: exp_dt.timestamp(),
            iat: iat_dt.timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = self.sign(&claims, &self.access_keys.encoding)?;
        Ok((AccessToken(token), exp_dt))
    }

    fn issue_refresh_token(
        &self,
        principal: &Principal,
    ) -> Result<IssuedRefreshToken, AuthError> {
        let jti = Jti::generate();
        let iat_dt = self.clock.now();
        let exp_dt = expiry(iat_dt, self.refresh_ttl)?;
        let claims = RefreshClaims {
            sub: principal.subject_id.0.clone(),
            email: principal.email.clone(),
            role: principal.role,
            exp: exp_dt.timestamp(),
            iat: iat_dt.timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            jti: jti.0.clone(),
        };
        let token = self.sign(&claims, &self.refresh_keys.encoding)?;
        Ok(IssuedRefreshToken {
            token: RefreshToken(token),
            jti,
            expires_at: exp_dt,
        })
    }
}

impl TokenVerifier for JwtTokenCodec {
    fn verify_access(&self, token: &AccessToken) -> Result<Principal, AuthError> {
        let claims: AccessClaims = self.decode_claims(&token.0, &self.access_keys.decoding)?;
        self.check_expiry(claims.exp)?;
        Self::principal(claims.sub, claims.email, claims.role)
    }

    fn verify_refresh(&self, token: &RefreshToken) -> Result<VerifiedRefresh, AuthError> {
        let claims: RefreshClaims = self.decode_claims(&token.0, &self.refresh_keys.decoding)?;
        let expires_at = self.check_expiry(claims.exp)?;
        if claims.jti.is_empty() {
            return Err(AuthError::InvalidToken);
        }
        Ok(VerifiedRefresh {
            principal: Self::principal(claims.sub, claims.email, claims.role)?,
            jti: Jti(claims.jti),
            expires_at,
        })
    }
}
