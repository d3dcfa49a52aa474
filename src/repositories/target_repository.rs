use chrono::Utc;
use sqlx::PgPool;

use crate::error::{AppError, Result};
use crate::models::{Cursor, Target};

/// Repository for the target registry.
pub struct TargetRepository {
    pool: PgPool,
}

impl TargetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts the target unless the canonical URL is already registered,
    /// then reads back whichever row owns the URL. The caller learns which
    /// path was taken by comparing ids.
    pub async fn create_or_get(&self, id: &str, url: &str, host: &str) -> Result<(Target, bool)> {
        sqlx::query(
            r#"
            INSERT INTO targets (id, url, host, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (url) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(url)
        .bind(host)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(AppError::Database)?;

        let target = sqlx::query_as::<_, Target>(
            r#"
            SELECT id, url, host, created_at
            FROM targets
            WHERE url = $1
            "#,
        )
        .bind(url)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)?;

        let created = target.id == id;
        Ok((target, created))
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Target>> {
        let row = sqlx::query_as::<_, Target>(
            r#"
            SELECT id, url, host, created_at
            FROM targets
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    /// Keyset pagination over `(created_at ASC, id ASC)`. Fetches one row
    /// past `limit` to decide whether a next-page cursor is needed.
    pub async fn list(
        &self,
        host: Option<&str>,
        after: Option<&Cursor>,
        limit: i64,
    ) -> Result<(Vec<Target>, Option<Cursor>)> {
        let mut rows = sqlx::query_as::<_, Target>(
            r#"
            SELECT id, url, host, created_at
            FROM targets
            WHERE ($1::text IS NULL OR host = $1)
              AND ($2::timestamptz IS NULL OR (created_at, id) > ($2, $3))
            ORDER BY created_at ASC, id ASC
            LIMIT $4
            "#,
        )
        .bind(host)
        .bind(after.map(|c| c.created_at))
        .bind(after.map(|c| c.id.as_str()))
        .bind(limit + 1)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        let next = if rows.len() > limit as usize {
            rows.truncate(limit as usize);
            rows.last().map(|t| Cursor {
                created_at: t.created_at,
                id: t.id.clone(),
            })
        } else {
            None
        };

        Ok((rows, next))
    }
}
