//! SQLite storage backend.
//!
//! The database backend used when a database URL is configured. Goals are
//! stored as JSON documents keyed by id with the owner broken out for
//! filtering; snapshots get their own table so pruning stays a single query.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use goalsync_core::{Goal, GoalId, GoalStatus, OwnerId, ProgressHistoryEntry, Time};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;

use super::trait_::{GoalStore, HistoryStore, StoreError, Result};

/// SQLite storage implementation.
#[derive(Clone)]
pub struct SqliteStore {
    /// Database connection pool
    pool: sqlx::SqlitePool,
}

fn db_err(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

impl SqliteStore {
    /// Connect to `url` (e.g. `sqlite://goals.db`), creating the file if missing.
    pub async fn new(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let store = Self { pool };
        store.init_schema().await?;

        Ok(store)
    }

    /// Create an in-memory SQLite storage for testing.
    pub async fn in_memory() -> Result<Self> {
        // Every connection to :memory: is a separate database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let store = Self { pool };
        store.init_schema().await?;

        Ok(store)
    }

    /// Initialize the database schema.
    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS goals (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                data TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS progress_history (
                id TEXT PRIMARY KEY,
                goal_id TEXT NOT NULL,
                owner_id TEXT NOT NULL,
                progress_value REAL NOT NULL,
                progress_percentage INTEGER NOT NULL,
                recorded_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_goals_owner ON goals(owner_id)")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_history_goal ON progress_history(goal_id, recorded_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn modify_goal(&self, id: GoalId, apply: impl FnOnce(&mut Goal) + Send) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let row = sqlx::query("SELECT data FROM goals WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?
            .ok_or_else(|| StoreError::NotFound(format!("goal {}", id)))?;

        let data: String = row.try_get("data").map_err(db_err)?;
        let mut goal: Goal = serde_json::from_str(&data)?;
        apply(&mut goal);
        goal.updated_at = Utc::now();

        sqlx::query("UPDATE goals SET data = ?, updated_at = ? WHERE id = ?")
            .bind(serde_json::to_string(&goal)?)
            .bind(fmt_time(goal.updated_at))
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }
}

// Fixed precision keeps the TEXT columns ordered chronologically.
fn fmt_time(time: Time) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(raw: &str) -> Result<Time> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Other(format!("bad timestamp {raw:?}: {e}")))
}

fn entry_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ProgressHistoryEntry> {
    let id: String = row.try_get("id").map_err(db_err)?;
    let goal_id: String = row.try_get("goal_id").map_err(db_err)?;
    let owner_id: String = row.try_get("owner_id").map_err(db_err)?;
    let percentage: i64 = row.try_get("progress_percentage").map_err(db_err)?;
    let recorded_at: String = row.try_get("recorded_at").map_err(db_err)?;

    Ok(ProgressHistoryEntry {
        id: id
            .parse()
            .map_err(|e| StoreError::Other(format!("bad entry id {id:?}: {e}")))?,
        goal_id: goal_id
            .parse()
            .map_err(|e| StoreError::Other(format!("bad goal id {goal_id:?}: {e}")))?,
        owner_id: OwnerId::new(owner_id),
        progress_value: row.try_get("progress_value").map_err(db_err)?,
        progress_percentage: percentage.clamp(0, 100) as u8,
        recorded_at: parse_time(&recorded_at)?,
    })
}

#[async_trait]
impl GoalStore for SqliteStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn fetch(&self, owner: &OwnerId) -> Result<Vec<Goal>> {
        let rows = sqlx::query("SELECT data FROM goals WHERE owner_id = ? ORDER BY created_at ASC")
            .bind(owner.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.into_iter()
            .map(|row| {
                let data: String = row.try_get("data").map_err(db_err)?;
                Ok(serde_json::from_str(&data)?)
            })
            .collect()
    }

    async fn create(&self, goal: &Goal) -> Result<()> {
        sqlx::query(
            "INSERT INTO goals (id, owner_id, data, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)",
        )
        .bind(goal.id.to_string())
        .bind(goal.owner_id.as_str())
        .bind(serde_json::to_string(goal)?)
        .bind(fmt_time(goal.created_at))
        .bind(fmt_time(goal.updated_at))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn update_progress(&self, id: GoalId, value: f64) -> Result<()> {
        self.modify_goal(id, move |goal| goal.current_value = value).await
    }

    async fn update_status(
        &self,
        id: GoalId,
        status: GoalStatus,
        completed_at: Option<Time>,
    ) -> Result<()> {
        self.modify_goal(id, move |goal| {
            goal.status = status;
            goal.completed_at = completed_at;
        })
        .await
    }

    async fn delete(&self, id: GoalId) -> Result<()> {
        sqlx::query("DELETE FROM goals WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for SqliteStore {
    async fn append_snapshot(&self, entry: &ProgressHistoryEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO progress_history
                (id, goal_id, owner_id, progress_value, progress_percentage, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.id.to_string())
        .bind(entry.goal_id.to_string())
        .bind(entry.owner_id.as_str())
        .bind(entry.progress_value)
        .bind(entry.progress_percentage as i64)
        .bind(fmt_time(entry.recorded_at))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn list_snapshots(&self, owner: &OwnerId, since: Time) -> Result<Vec<ProgressHistoryEntry>> {
        let rows = sqlx::query(
            "SELECT id, goal_id, owner_id, progress_value, progress_percentage, recorded_at
            FROM progress_history
            WHERE owner_id = ? AND recorded_at >= ?
            ORDER BY recorded_at ASC",
        )
        .bind(owner.as_str())
        .bind(fmt_time(since))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(entry_from_row).collect()
    }

    async fn prune_snapshots(&self, goal_id: GoalId, keep: usize) -> Result<usize> {
        let result = sqlx::query(
            "DELETE FROM progress_history
            WHERE goal_id = ?1 AND id NOT IN (
                SELECT id FROM progress_history
                WHERE goal_id = ?1
                ORDER BY recorded_at DESC
                LIMIT ?2
            )",
        )
        .bind(goal_id.to_string())
        .bind(keep as i64)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected() as usize)
    }

    async fn delete_snapshots(&self, goal_id: GoalId) -> Result<()> {
        sqlx::query("DELETE FROM progress_history WHERE goal_id = ?")
            .bind(goal_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}
