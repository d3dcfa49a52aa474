use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};

use crate::error::{AppError, Result};

/// Repository for the durable idempotency-key map.
pub struct IdempotencyRepository {
    pool: PgPool,
}

impl IdempotencyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Resolves `key` to a target id inside a single transaction.
    ///
    /// An existing key with a matching hash returns its target; a mismatching
    /// hash is a conflict. Otherwise the target is upserted by canonical URL,
    /// its id read back, and the key mapping inserted. A concurrent insert of
    /// the same key surfaces as a unique violation and is recovered by
    /// re-reading the winning row.
    pub async fn upsert(
        &self,
        key: &str,
        request_hash: &str,
        new_id: &str,
        url: &str,
        host: &str,
    ) -> Result<(String, bool)> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        if let Some((target_id, existed)) = Self::find_existing(&mut tx, key, request_hash).await? {
            tx.commit().await.map_err(AppError::Database)?;
            return Ok((target_id, existed));
        }

        let target_id = Self::upsert_target(&mut tx, new_id, url, host).await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO idempotency_keys (key, request_hash, target_id)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(key)
        .bind(request_hash)
        .bind(&target_id)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {
                tx.commit().await.map_err(AppError::Database)?;
                Ok((target_id, false))
            }
            Err(e) if is_unique_violation(&e) => {
                // Lost the race: another request inserted the key first.
                match Self::find_existing(&mut tx, key, request_hash).await? {
                    Some((winner, existed)) => {
                        tx.commit().await.map_err(AppError::Database)?;
                        Ok((winner, existed))
                    }
                    None => Err(AppError::Database(e)),
                }
            }
            Err(e) => Err(AppError::Database(e)),
        }
    }

    async fn find_existing(
        tx: &mut Transaction<'_, Postgres>,
        key: &str,
        request_hash: &str,
    ) -> Result<Option<(String, bool)>> {
        let row: Option<(String, String)> = sqlx::query_as(
            r#"
            SELECT request_hash, target_id
            FROM idempotency_keys
            WHERE key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&mut **tx)
        .await
        .map_err(AppError::Database)?;

        match row {
            Some((existing_hash, target_id)) => {
                if existing_hash != request_hash {
                    return Err(AppError::IdempotencyConflict);
                }
                Ok(Some((target_id, true)))
            }
            None => Ok(None),
        }
    }

    async fn upsert_target(
        tx: &mut Transaction<'_, Postgres>,
        new_id: &str,
        url: &str,
        host: &str,
    ) -> Result<String> {
        sqlx::query(
            r#"
            INSERT INTO targets (id, url, host, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (url) DO NOTHING
            "#,
        )
        .bind(new_id)
        .bind(url)
        .bind(host)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await
        .map_err(AppError::Database)?;

        let (target_id,): (String,) = sqlx::query_as(
            r#"
            SELECT id FROM targets WHERE url = $1
            "#,
        )
        .bind(url)
        .fetch_one(&mut **tx)
        .await
        .map_err(AppError::Database)?;

        Ok(target_id)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map_or(false, |db| db.is_unique_violation())
}
