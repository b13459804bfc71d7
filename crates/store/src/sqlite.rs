//! SQLite session store.
//!
//! One row per session. The full session is kept as a JSON document in
//! `body`; `phase`, `turns`, `decisions` and `updated_at` are denormalized
//! for listing without parsing every body.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use pmos_core::error::StoreError;
use pmos_core::session::{Phase, Session, SessionId};
use pmos_core::store::{SessionStore, SessionSummary};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    /// Open (or create) the database at `path`.
    ///
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Database(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        // A single connection keeps `:memory:` databases shared across calls.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite session store initialized at {path}");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id          TEXT PRIMARY KEY,
                phase       TEXT NOT NULL,
                turns       INTEGER NOT NULL DEFAULT 0,
                decisions   INTEGER NOT NULL DEFAULT 0,
                body        TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("sessions table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_sessions_updated_at ON sessions(updated_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("updated_at index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_summary(row: &sqlx::sqlite::SqliteRow) -> Result<SessionSummary, StoreError> {
        let id: String = row
            .try_get("id")
            .map_err(|e| StoreError::Database(format!("id column: {e}")))?;
        let phase: String = row
            .try_get("phase")
            .map_err(|e| StoreError::Database(format!("phase column: {e}")))?;
        let turns: i64 = row
            .try_get("turns")
            .map_err(|e| StoreError::Database(format!("turns column: {e}")))?;
        let decisions: i64 = row
            .try_get("decisions")
            .map_err(|e| StoreError::Database(format!("decisions column: {e}")))?;
        let updated_at: String = row
            .try_get("updated_at")
            .map_err(|e| StoreError::Database(format!("updated_at column: {e}")))?;

        Ok(SessionSummary {
            phase: Phase::from_str(&phase).map_err(|e| StoreError::Corrupt {
                id: id.clone(),
                reason: e.to_string(),
            })?,
            id: SessionId(id),
            turns: turns.max(0) as usize,
            decisions: decisions.max(0) as usize,
            updated_at: chrono::DateTime::parse_from_rfc3339(&updated_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn load(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query("SELECT body FROM sessions WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("load failed: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let body: String = row
            .try_get("body")
            .map_err(|e| StoreError::Database(format!("body column: {e}")))?;

        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                id: id.to_string(),
                reason: e.to_string(),
            })
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        let body = serde_json::to_string(session)
            .map_err(|e| StoreError::Database(format!("Session serialization: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO sessions (id, phase, turns, decisions, body, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                phase = excluded.phase,
                turns = excluded.turns,
                decisions = excluded.decisions,
                body = excluded.body,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(session.id().as_str())
        .bind(session.phase().as_str())
        .bind(session.turns().len() as i64)
        .bind(session.decisions().len() as i64)
        .bind(body)
        .bind(session.created_at().to_rfc3339())
        .bind(session.updated_at().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(format!("save failed: {e}")))?;

        debug!(session_id = %session.id(), "Session saved");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SessionSummary>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, phase, turns, decisions, updated_at FROM sessions ORDER BY updated_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(format!("list failed: {e}")))?;

        rows.iter().map(Self::row_to_summary).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmos_core::{
        AgentLabel, AgentResult, Artifact, ArtifactKind, Decision, StepRecord, Turn, TurnOutcome,
    };

    async fn test_store() -> SqliteSessionStore {
        SqliteSessionStore::new("sqlite::memory:").await.unwrap()
    }

    fn strategist_session(id: &str) -> Session {
        let mut session = Session::new(SessionId::from(id));
        let artifact = Artifact::new(
            ArtifactKind::DecisionRecord,
            serde_json::json!({"recommendation": "Build onboarding checklist"}),
            AgentLabel::Strategist,
        );
        let mut decision = Decision::new(AgentLabel::Strategist, "Build onboarding checklist");
        decision.impact = Some(8.0);
        decision.effort = Some(3.0);
        session.append_turn(Turn {
            input: "Which fix first?".into(),
            classified: AgentLabel::Strategist,
            confidence: 0.75,
            steps: vec![StepRecord {
                agent: AgentLabel::Strategist,
                result: AgentResult {
                    rendering: "Checklist wins.".into(),
                    artifacts: vec![artifact.clone()],
                    decisions: vec![decision.clone()],
                    ..Default::default()
                },
            }],
            rendering: "Checklist wins.".into(),
            outcome: TurnOutcome::Answered,
            timestamp: Utc::now(),
        });
        session.commit(vec![artifact], vec![decision]);
        session.advance_phase(Phase::Execution);
        session
    }

    #[tokio::test]
    async fn load_missing_is_none() {
        let store = test_store().await;
        assert!(store.load(&SessionId::from("ghost")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn roundtrip_preserves_everything() {
        let store = test_store().await;
        let session = strategist_session("s-1");
        store.save(&session).await.unwrap();

        let loaded = store.load(session.id()).await.unwrap().unwrap();
        assert_eq!(loaded, session);
        assert_eq!(loaded.phase(), Phase::Execution);
        assert_eq!(loaded.turns().len(), 1);
        assert_eq!(loaded.decisions().entries()[0].impact, Some(8.0));
    }

    #[tokio::test]
    async fn save_upserts() {
        let store = test_store().await;
        let mut session = Session::new(SessionId::from("s-1"));
        store.save(&session).await.unwrap();

        session.commit(vec![], vec![Decision::new(AgentLabel::Aligner, "Loop in sales")]);
        store.save(&session).await.unwrap();

        let list = store.list().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].decisions, 1);
    }

    #[tokio::test]
    async fn list_orders_by_recency() {
        let store = test_store().await;
        store.save(&Session::new(SessionId::from("old"))).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.save(&strategist_session("new")).await.unwrap();

        let list = store.list().await.unwrap();
        assert_eq!(list[0].id.as_str(), "new");
        assert_eq!(list[0].phase, Phase::Execution);
        assert_eq!(list[0].turns, 1);
    }
}
