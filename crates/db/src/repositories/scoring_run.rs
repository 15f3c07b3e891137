use sqlx::{sqlite::SqliteRow, Row};

use prodscore_core::domain::run::{ScoringRun, ScoringRunId, ScoringRunStatus};

use super::{decode_timestamp, encode_timestamp, RepositoryError, ScoringRunRepository};
use crate::DbPool;

pub struct SqlScoringRunRepository {
    pool: DbPool,
}

impl SqlScoringRunRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn run_from_row(row: &SqliteRow) -> Result<ScoringRun, RepositoryError> {
    let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());
    let id: String = row.try_get("id").map_err(decode)?;
    let status: String = row.try_get("status").map_err(decode)?;
    let as_of: String = row.try_get("as_of").map_err(decode)?;
    let started_at: String = row.try_get("started_at").map_err(decode)?;
    let finished_at: Option<String> = row.try_get("finished_at").map_err(decode)?;
    let products_seeded: i64 = row.try_get("products_seeded").map_err(decode)?;
    let products_scored: i64 = row.try_get("products_scored").map_err(decode)?;
    let batches: i64 = row.try_get("batches").map_err(decode)?;
    let error: Option<String> = row.try_get("error").map_err(decode)?;

    let status = ScoringRunStatus::parse(&status)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown scoring run status `{status}`")))?;

    Ok(ScoringRun {
        id: ScoringRunId(id),
        status,
        as_of: decode_timestamp(&as_of)?,
        started_at: decode_timestamp(&started_at)?,
        finished_at: finished_at.as_deref().map(decode_timestamp).transpose()?,
        products_seeded: products_seeded.max(0) as u64,
        products_scored: products_scored.max(0) as u64,
        batches: batches.max(0) as u64,
        error,
    })
}

#[async_trait::async_trait]
impl ScoringRunRepository for SqlScoringRunRepository {
    async fn save_run(&self, run: &ScoringRun) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO scoring_run
                (id, status, as_of, started_at, finished_at,
                 products_seeded, products_scored, batches, error)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                finished_at = excluded.finished_at,
                products_seeded = excluded.products_seeded,
                products_scored = excluded.products_scored,
                batches = excluded.batches,
                error = excluded.error",
        )
        .bind(&run.id.0)
        .bind(run.status.as_str())
        .bind(encode_timestamp(&run.as_of))
        .bind(encode_timestamp(&run.started_at))
        .bind(run.finished_at.as_ref().map(encode_timestamp))
        .bind(run.products_seeded as i64)
        .bind(run.products_scored as i64)
        .bind(run.batches as i64)
        .bind(&run.error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_run(&self, id: &ScoringRunId) -> Result<Option<ScoringRun>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, status, as_of, started_at, finished_at,
                    products_seeded, products_scored, batches, error
             FROM scoring_run
             WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(run_from_row).transpose()
    }

    async fn recent_runs(&self, limit: u32) -> Result<Vec<ScoringRun>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, status, as_of, started_at, finished_at,
                    products_seeded, products_scored, batches, error
             FROM scoring_run
             ORDER BY started_at DESC, rowid DESC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(run_from_row).collect::<Result<Vec<_>, _>>()
    }
}
