use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::manager::DatabaseError;

const SYNC_RUN_COLUMNS: &str = r#"
    id, company_id, full_resync, status, fetched, changed, written, error, started_at, finished_at
"#;

/// One delta-sync pass for a company
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SyncRun {
    pub id: Uuid,
    pub company_id: Uuid,
    pub full_resync: bool,
    pub status: String,
    pub fetched: i32,
    pub changed: i32,
    pub written: i32,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

fn clamp(n: u64) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

impl SyncRun {
    pub async fn start(pool: &PgPool, company_id: Uuid, full_resync: bool) -> Result<Self, DatabaseError> {
        let sql = format!(
            "INSERT INTO sync_runs (company_id, full_resync) VALUES ($1, $2) RETURNING {SYNC_RUN_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Self>(&sql)
            .bind(company_id)
            .bind(full_resync)
            .fetch_one(pool)
            .await?)
    }

    pub async fn finish(
        pool: &PgPool,
        id: Uuid,
        fetched: u64,
        changed: u64,
        written: u64,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            "UPDATE sync_runs
             SET status = 'succeeded', fetched = $2, changed = $3, written = $4, finished_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(clamp(fetched))
        .bind(clamp(changed))
        .bind(clamp(written))
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn fail(pool: &PgPool, id: Uuid, error: &str) -> Result<(), DatabaseError> {
        sqlx::query(
            "UPDATE sync_runs SET status = 'failed', error = $2, finished_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn latest_for_company(pool: &PgPool, company_id: Uuid) -> Result<Option<Self>, DatabaseError> {
        let sql = format!(
            "SELECT {SYNC_RUN_COLUMNS} FROM sync_runs WHERE company_id = $1 ORDER BY started_at DESC LIMIT 1"
        );
        Ok(sqlx::query_as::<_, Self>(&sql)
            .bind(company_id)
            .fetch_optional(pool)
            .await?)
    }

    /// Runs left in `running` by a crashed process
    pub async fn abandon_stale(pool: &PgPool) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            "UPDATE sync_runs
             SET status = 'failed', error = 'abandoned on restart', finished_at = NOW()
             WHERE status = 'running'",
        )
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
