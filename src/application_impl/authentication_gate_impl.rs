use super::Clock;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub struct RealAuthenticationGate {
    token_issuer: Arc<dyn TokenIssuer>,
    token_verifier: Arc<dyn TokenVerifier>,
    session_store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    refresh_ttl: Duration,
    store_timeout: Duration,
}

impl RealAuthenticationGate {
    pub fn new(
        token_issuer: Arc<dyn TokenIssuer>,
        token_verifier: Arc<dyn TokenVerifier>,
        session_store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
        refresh_ttl: Duration,
        store_timeout: Duration,
    ) -> Self {
        Self {
            token_issuer,
            token_verifier,
            session_store,
            clock,
            refresh_ttl,
            store_timeout,
        }
    }

    /// Runs a store call under the store timeout. Any failure is an
    /// infrastructure error and never an authenticated fallback.
    async fn bounded<T, F>(&self, op: &'static str, call: F) -> Result<T, AuthError>
    where
        F: Future<Output = Result<T, SessionStoreError>>,
    {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                error!(op, error = %e, "session store call failed");
                Err(AuthError::from(e))
            }
            Err(_) => {
                error!(op, timeout = ?self.store_timeout, "session store call timed out");
                Err(AuthError::Infrastructure(format!(
                    "session store {op} timed out"
                )))
            }
        }
    }

    async fn register(&self, principal: &Principal) -> Result<TokenPair, AuthError> {
        let tokens = self.token_issuer.issue_token_pair(principal)?;
        let record = SessionRecord::new(
            tokens.jti.clone(),
            principal.subject_id.clone(),
            self.clock.now(),
        );
        self.bounded("save", self.session_store.save(&record, self.refresh_ttl))
            .await?;
        Ok(tokens)
    }

    /// TRY_REFRESH: verify, consume the old session, mint and register a new one.
    ///
    /// The old record is deleted before the new one is saved, so a failure in
    /// between leaves the subject logged out rather than holding two sessions.
    async fn rotate(&self, refresh_token: &RefreshToken) -> Result<Authenticated, AuthError> {
        let verified = self.token_verifier.verify_refresh(refresh_token).map_err(|e| {
            debug!(error = %e, "refresh token rejected");
            e
        })?;
        let subject = &verified.principal.subject_id;

        let consumed = self
            .bounded("revoke", self.session_store.revoke(&verified.jti))
            .await?;
        if !consumed {
            let revoked = self
                .bounded(
                    "revoke_all_for_subject",
                    self.session_store.revoke_all_for_subject(subject),
                )
                .await?;
            warn!(
                %subject,
                jti = %verified.jti,
                revoked,
                "refresh token reuse detected, all sessions revoked"
            );
            return Err(AuthError::ReuseDetected);
        }

        let tokens = self.register(&verified.principal).await?;
        info!(
            %subject,
            old_jti = %verified.jti,
            new_jti = %tokens.jti,
            "refresh token rotated"
        );

        Ok(Authenticated {
            principal: verified.principal,
            rotated: Some(tokens),
        })
    }
}

#[async_trait::async_trait]
impl AuthenticationGate for RealAuthenticationGate {
    async fn authenticate(&self, credentials: Credentials) -> Result<Authenticated, AuthError> {
        let Credentials { access, refresh } = credentials;

        if let Some(access) = access {
            match self.token_verifier.verify_access(&access) {
                Ok(principal) => {
                    return Ok(Authenticated {
                        principal,
                        rotated: None,
                    });
                }
                Err(AuthError::ExpiredToken) => {
                    debug!("access token expired, trying refresh token");
                }
                Err(e) => {
                    debug!(error = %e, "access token rejected");
                    return Err(e);
                }
            }
        }

        let refresh = refresh.ok_or(AuthError::MissingCredentials)?;
        self.rotate(&refresh).await
    }

    async fn start_session(&self, principal: &Principal) -> Result<TokenPair, AuthError> {
        let tokens = self.register(principal).await?;
        info!(subject = %principal.subject_id, jti = %tokens.jti, "session started");
        Ok(tokens)
    }

    async fn refresh(&self, refresh_token: &RefreshToken) -> Result<Authenticated, AuthError> {
        self.rotate(refresh_token).await
    }

    async fn logout(&self, refresh_token: Option<&RefreshToken>) -> Result<(), AuthError> {
        let Some(refresh_token) = refresh_token else {
            return Ok(());
        };

        match self.token_verifier.verify_refresh(refresh_token) {
            Ok(verified) => {
                let revoked = self
                    .bounded("revoke", self.session_store.revoke(&verified.jti))
                    .await?;
                info!(
                    subject = %verified.principal.subject_id,
                    jti = %verified.jti,
                    revoked,
                    "session logged out"
                );
            }
            Err(e) => debug!(error = %e, "ignoring unverifiable refresh token on logout"),
        }
        Ok(())
    }

    async fn logout_all(&self, subject_id: &SubjectId) -> Result<u64, AuthError> {
        let revoked = self
            .bounded(
                "revoke_all_for_subject",
                self.session_store.revoke_all_for_subject(subject_id),
            )
            .await?;
        info!(subject = %subject_id, revoked, "all sessions logged out");
        Ok(revoked)
    }
}
