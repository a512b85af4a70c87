use super::SubjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Session identifier embedded in a refresh token.
#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Jti(pub String);

impl Jti {
    pub fn generate() -> Self {
        Jti(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for Jti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One live, unconsumed refresh token.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SessionRecord {
    pub jti: Jti,
    pub subject_id: SubjectId,
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(jti: Jti, subject_id: SubjectId, created_at: DateTime<Utc>) -> Self {
        Self {
            jti,
            subject_id,
            created_at,
        }
    }
}
