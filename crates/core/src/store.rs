//! Session persistence trait.
//!
//! Implementations: in-memory (for testing), JSON files, SQLite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::session::{Phase, Session, SessionId};

/// Listing row for a stored session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub phase: Phase,
    pub turns: usize,
    pub decisions: usize,
    pub updated_at: DateTime<Utc>,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id().clone(),
            phase: session.phase(),
            turns: session.turns().len(),
            decisions: session.decisions().len(),
            updated_at: session.updated_at(),
        }
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "file", "memory").
    fn name(&self) -> &str;

    /// `Ok(None)` when the session does not exist yet.
    async fn load(&self, id: &SessionId) -> std::result::Result<Option<Session>, StoreError>;

    /// Insert or replace the whole session.
    async fn save(&self, session: &Session) -> std::result::Result<(), StoreError>;

    /// All stored sessions, most recently updated first.
    async fn list(&self) -> std::result::Result<Vec<SessionSummary>, StoreError>;
}
