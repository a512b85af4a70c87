use crate::application_impl::Clock;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

struct SessionEntry {
    record: SessionRecord,
    expires_at: DateTime<Utc>,
}

impl SessionEntry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// In-process session store.
///
/// Each operation on a single jti goes through one shard lock, which makes
/// `revoke` an atomic delete-if-present. Expired entries read as absent and are
/// purged by [`MemorySessionStore::sweep_expired`].
pub struct MemorySessionStore {
    sessions: DashMap<Jti, SessionEntry>,
    clock: Arc<dyn Clock>,
}

impl MemorySessionStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: DashMap::new(),
            clock,
        }
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.sessions.iter().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops expired entries, returning how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.sessions.len();
        self.sessions.retain(|_, entry| entry.is_live(now));
        before.saturating_sub(self.sessions.len())
    }

    pub fn spawn_sweeper(
        self: Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = self.sweep_expired();
                        if removed > 0 {
                            debug!(removed, "expired sessions swept");
                        }
                    }
                }
            }
            info!("session sweeper stopped");
        })
    }
}

#[async_trait::async_trait]
impl SessionStore for MemorySessionStore {
    async fn save(&self, record: &SessionRecord, ttl: Duration) -> Result<(), SessionStoreError> {
        let expires_at = TimeDelta::from_std(ttl)
            .ok()
            .and_then(|ttl| self.clock.now().checked_add_signed(ttl))
            .ok_or_else(|| SessionStoreError::Unavailable(format!("ttl out of range: {ttl:?}")))?;
        let entry = SessionEntry {
            record: record.clone(),
            expires_at,
        };
        self.sessions.insert(record.jti.clone(), entry);
        Ok(())
    }

    async fn is_valid(&self, jti: &Jti) -> Result<bool, SessionStoreError> {
        let now = self.clock.now();
        Ok(self
            .sessions
            .get(jti)
            .map(|entry| entry.is_live(now))
            .unwrap_or(false))
    }

    async fn revoke(&self, jti: &Jti) -> Result<bool, SessionStoreError> {
        let now = self.clock.now();
        Ok(self
            .sessions
            .remove(jti)
            .map(|(_, entry)| entry.is_live(now))
            .unwrap_or(false))
    }

    async fn revoke_all_for_subject(
        &self,
        subject_id: &SubjectId,
    ) -> Result<u64, SessionStoreError> {
        let now = self.clock.now();
        let mut revoked = 0u64;
        self.sessions.retain(|_, entry| {
            if &entry.record.subject_id != subject_id {
                return true;
            }
            if entry.is_live(now) {
                revoked += 1;
            }
            false
        });
        Ok(revoked)
    }
}
