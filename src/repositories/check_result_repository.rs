use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::{AppError, Result};
use crate::models::CheckResult;

/// Repository for the append-only check-result log.
pub struct CheckResultRepository {
    pool: PgPool,
}

impl CheckResultRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn append(&self, record: &CheckResult) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO check_results (target_id, checked_at, status_code, latency_ms, error)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&record.target_id)
        .bind(record.checked_at)
        .bind(record.status_code)
        .bind(record.latency_ms)
        .bind(&record.error)
        .execute(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(())
    }

    pub async fn list(
        &self,
        target_id: &str,
        since: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<CheckResult>> {
        let rows = sqlx::query_as::<_, CheckResult>(
            r#"
            SELECT target_id, checked_at, status_code, latency_ms, error
            FROM check_results
            WHERE target_id = $1
              AND ($2::timestamptz IS NULL OR checked_at >= $2)
            ORDER BY checked_at DESC
            LIMIT $3
            "#,
        )
        .bind(target_id)
        .bind(since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows)
    }
}
