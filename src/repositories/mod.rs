pub mod check_result_repository;
pub mod idempotency_repository;
pub mod target_repository;

pub use check_result_repository::CheckResultRepository;
pub use idempotency_repository::IdempotencyRepository;
pub use target_repository::TargetRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::{AppError, Result};
use crate::models::{CheckResult, Cursor, Target};

/// Durable state consumed by the registration protocol and the checker.
///
/// The relational backend is the reference implementation; anything that
/// honors these contracts (unique canonical URLs, atomic idempotency upsert,
/// stable `(created_at, id)` ordering) works.
#[async_trait]
pub trait Store: Send + Sync {
    /// Connectivity probe used by health checks.
    async fn ping(&self) -> Result<()>;

    /// Inserts a target if `url` is absent, otherwise returns the existing
    /// row. The boolean reports which path was taken.
    async fn create_or_get_target(&self, id: &str, url: &str, host: &str)
        -> Result<(Target, bool)>;

    async fn find_target(&self, id: &str) -> Result<Option<Target>>;

    /// Atomically resolves an idempotency key to a target id, creating the
    /// target and the key mapping as needed. Returns the target id and
    /// whether the key already existed; a key reused with a different
    /// `request_hash` is an `IdempotencyConflict`.
    async fn upsert_idempotency_key(
        &self,
        key: &str,
        request_hash: &str,
        new_id: &str,
        url: &str,
        host: &str,
    ) -> Result<(String, bool)>;

    /// Returns up to `limit` targets ordered by `(created_at ASC, id ASC)`,
    /// optionally filtered by host equality, plus a cursor when more remain.
    async fn list_targets(
        &self,
        host: Option<&str>,
        after: Option<&Cursor>,
        limit: i64,
    ) -> Result<(Vec<Target>, Option<Cursor>)>;

    /// Unconditional append to the result log.
    async fn append_check_result(&self, record: &CheckResult) -> Result<()>;

    /// Newest-first results for a target, optionally bounded below by
    /// `since`.
    async fn list_results(
        &self,
        target_id: &str,
        since: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<CheckResult>>;
}

/// `Store` backed by PostgreSQL through the per-entity repositories.
pub struct PostgresStore {
    pool: PgPool,
    targets: TargetRepository,
    results: CheckResultRepository,
    idempotency: IdempotencyRepository,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            targets: TargetRepository::new(pool.clone()),
            results: CheckResultRepository::new(pool.clone()),
            idempotency: IdempotencyRepository::new(pool.clone()),
            pool,
        }
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(())
    }

    async fn create_or_get_target(
        &self,
        id: &str,
        url: &str,
        host: &str,
    ) -> Result<(Target, bool)> {
        self.targets.create_or_get(id, url, host).await
    }

    async fn find_target(&self, id: &str) -> Result<Option<Target>> {
        self.targets.find_by_id(id).await
    }

    async fn upsert_idempotency_key(
        &self,
        key: &str,
        request_hash: &str,
        new_id: &str,
        url: &str,
        host: &str,
    ) -> Result<(String, bool)> {
        self.idempotency
            .upsert(key, request_hash, new_id, url, host)
            .await
    }

    async fn list_targets(
        &self,
        host: Option<&str>,
        after: Option<&Cursor>,
        limit: i64,
    ) -> Result<(Vec<Target>, Option<Cursor>)> {
        self.targets.list(host, after, limit).await
    }

    async fn append_check_result(&self, record: &CheckResult) -> Result<()> {
        self.results.append(record).await
    }

    async fn list_results(
        &self,
        target_id: &str,
        since: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<CheckResult>> {
        self.results.list(target_id, since, limit).await
    }
}
