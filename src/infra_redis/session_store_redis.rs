use crate::domain_model::*;
use crate::domain_port::*;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use std::time::Duration;

const SESSION_SAVE: &str = include_str!("session_save.lua");
const SESSION_REVOKE: &str = include_str!("session_revoke.lua");
const SESSION_REVOKE_ALL: &str = include_str!("session_revoke_all.lua");

/// Redis-backed session store.
///
/// Layout: `{prefix}:session:{jti}` is a hash (`sub`, `created_at`) expiring
/// with the refresh TTL; `{prefix}:subject:{sub}` is the set of that subject's
/// jtis. Multi-key updates run as Lua scripts so each operation is atomic on
/// the server. The scripts derive keys from arguments, so all keys must live
/// on a single node.
pub struct RedisSessionStore {
    conn: ConnectionManager,
    prefix: String,
    save_script: Script,
    revoke_script: Script,
    revoke_all_script: Script,
}

impl RedisSessionStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisSessionStore {
            conn,
            prefix: prefix.into(),
            save_script: Script::new(SESSION_SAVE),
            revoke_script: Script::new(SESSION_REVOKE),
            revoke_all_script: Script::new(SESSION_REVOKE_ALL),
        }
    }

    pub async fn connect(
        url: &str,
        prefix: impl Into<String>,
    ) -> Result<Self, SessionStoreError> {
        let client = redis::Client::open(url).map_err(store_error)?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(store_error)?;
        Ok(Self::new(conn, prefix))
    }

    fn session_prefix(&self) -> String {
        format!("{}:session:", self.prefix)
    }

    fn subject_prefix(&self) -> String {
        format!("{}:subject:", self.prefix)
    }

    fn session_key(&self, jti: &Jti) -> String {
        format!("{}{}", self.session_prefix(), jti)
    }

    fn subject_key(&self, subject_id: &SubjectId) -> String {
        format!("{}{}", self.subject_prefix(), subject_id)
    }
}

fn store_error(e: redis::RedisError) -> SessionStoreError {
    SessionStoreError::Unavailable(e.to_string())
}

#[async_trait::async_trait]
impl SessionStore for RedisSessionStore {
    async fn save(&self, record: &SessionRecord, ttl: Duration) -> Result<(), SessionStoreError> {
        let mut conn = self.conn.clone();
        let _: i64 = self
            .save_script
            .key(self.session_key(&record.jti))
            .key(self.subject_key(&record.subject_id))
            .arg(&record.subject_id.0)
            .arg(record.created_at.timestamp())
            .arg(ttl.as_secs().max(1))
            .arg(&record.jti.0)
            .invoke_async(&mut conn)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn is_valid(&self, jti: &Jti) -> Result<bool, SessionStoreError> {
        let mut conn = self.conn.clone();
        let exists: bool = conn
            .exists(self.session_key(jti))
            .await
            .map_err(store_error)?;
        Ok(exists)
    }

    async fn revoke(&self, jti: &Jti) -> Result<bool, SessionStoreError> {
        let mut conn = self.conn.clone();
        let removed: i64 = self
            .revoke_script
            .key(self.session_key(jti))
            .arg(self.subject_prefix())
            .arg(&jti.0)
            .invoke_async(&mut conn)
            .await
            .map_err(store_error)?;
        Ok(removed == 1)
    }

    async fn revoke_all_for_subject(
        &self,
        subject_id: &SubjectId,
    ) -> Result<u64, SessionStoreError> {
        let mut conn = self.conn.clone();
        let removed: u64 = self
            .revoke_all_script
            .key(self.subject_key(subject_id))
            .arg(self.session_prefix())
            .invoke_async(&mut conn)
            .await
            .map_err(store_error)?;
        Ok(removed)
    }
}
