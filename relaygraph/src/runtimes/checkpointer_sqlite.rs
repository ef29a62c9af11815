/*!
SQLite checkpointer (feature `sqlite`).

Durable implementation of the [`Checkpointer`] trait. Serialization goes
through the persistence models (`runtimes::persistence`); this module is
database I/O only. The schema is created on connect:

- `checkpoints.session_id`: thread id (primary key; latest wins)
- `checkpoints.step`: step number of the stored checkpoint
- `checkpoints.payload`: JSON-encoded `PersistedCheckpoint`
- `checkpoints.created_at`: RFC3339 creation time
*/

use async_trait::async_trait;
use miette::Diagnostic;
use sqlx::{Row, SqlitePool, sqlite::SqliteConnectOptions};
use std::str::FromStr;
use thiserror::Error;
use tracing::instrument;

use crate::runtimes::checkpointer::{Checkpoint, Checkpointer, CheckpointerError, Result};
use crate::runtimes::persistence::PersistedCheckpoint;

#[derive(Debug, Error, Diagnostic)]
pub enum SQLiteCheckpointerError {
    #[error("sqlx error: {0}")]
    #[diagnostic(
        code(relaygraph::sqlite::sqlx),
        help("Ensure the SQLite database path is valid and writable.")
    )]
    Sqlx(#[from] sqlx::Error),
}

impl From<SQLiteCheckpointerError> for CheckpointerError {
    fn from(e: SQLiteCheckpointerError) -> Self {
        CheckpointerError::Backend(e.to_string())
    }
}

/// Durable SQLite-backed checkpoint store.
pub struct SQLiteCheckpointer {
    pool: SqlitePool,
}

impl SQLiteCheckpointer {
    /// Connect to (and if necessary create) the database file, then
    /// ensure the schema exists.
    #[instrument(err)]
    pub async fn connect(db_name: &str) -> std::result::Result<Self, SQLiteCheckpointerError> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{db_name}"))
            .map_err(SQLiteCheckpointerError::Sqlx)?
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS checkpoints (
                session_id TEXT PRIMARY KEY,
                step INTEGER NOT NULL,
                payload TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl Checkpointer for SQLiteCheckpointer {
    async fn save(&self, checkpoint: Checkpoint) -> Result<()> {
        let persisted = PersistedCheckpoint::from(&checkpoint);
        let payload = serde_json::to_string(&persisted)?;
        sqlx::query(
            "INSERT INTO checkpoints (session_id, step, payload, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(session_id) DO UPDATE SET
                step = excluded.step,
                payload = excluded.payload,
                created_at = excluded.created_at",
        )
        .bind(&persisted.session_id)
        .bind(persisted.step as i64)
        .bind(&payload)
        .bind(&persisted.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| CheckpointerError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn load_latest(&self, session_id: &str) -> Result<Option<Checkpoint>> {
        let row = sqlx::query("SELECT payload FROM checkpoints WHERE session_id = ?1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CheckpointerError::Backend(e.to_string()))?;
        let Some(row) = row else {
            return Ok(None);
        };
        let payload: String = row
            .try_get("payload")
            .map_err(|e| CheckpointerError::Backend(e.to_string()))?;
        let persisted: PersistedCheckpoint = serde_json::from_str(&payload)?;
        Ok(Some(Checkpoint::from(persisted)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtimes::runner::SessionState;
    use crate::state::VersionedState;
    use crate::types::NodeKind;

    #[tokio::test]
    async fn sqlite_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("checkpoints.db");
        let store = SQLiteCheckpointer::connect(db.to_str().unwrap())
            .await
            .unwrap();

        let session = SessionState {
            state: VersionedState::new_with_user_message("hello"),
            step: 5,
            frontier: vec![NodeKind::Custom("router".into())],
            pending_interrupt: None,
            resume: None,
        };
        store
            .save(Checkpoint::from_session("t1", &session))
            .await
            .unwrap();

        let loaded = store.load_latest("t1").await.unwrap().unwrap();
        assert_eq!(loaded.step, 5);
        assert_eq!(loaded.frontier, session.frontier);
    }
}
