use crate::domain_model::*;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

/// Live refresh-token sessions, keyed by jti.
///
/// `revoke` is the only validity check the rotation path relies on: it must
/// delete-if-present and report whether this call did the delete, atomically
/// with respect to concurrent calls on the same jti.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Register a session. Saving an existing jti overwrites it.
    async fn save(&self, record: &SessionRecord, ttl: Duration) -> Result<(), SessionStoreError>;

    async fn is_valid(&self, jti: &Jti) -> Result<bool, SessionStoreError>;

    /// Returns `true` only if a live record was removed by this call.
    async fn revoke(&self, jti: &Jti) -> Result<bool, SessionStoreError>;

    /// Returns the number of live records removed.
    async fn revoke_all_for_subject(&self, subject_id: &SubjectId)
    -> Result<u64, SessionStoreError>;
}
