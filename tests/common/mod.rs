use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use linkwatch::core;
use linkwatch::error::{AppError, Result};
use linkwatch::models::{CheckResult, Cursor, Target};
use linkwatch::repositories::Store;

/// Connects to the test database, running migrations. Returns `None` when
/// `DATABASE_URL` is unset so Postgres-backed tests can skip cleanly.
pub async fn try_connect() -> Option<PgPool> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").ok()?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&database_url)
        .await
        .expect("failed to connect to test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("failed to run migrations");

    Some(pool)
}

/// In-memory `Store` mirroring the Postgres semantics: unique canonical
/// URLs, atomic idempotency upsert, `(created_at, id)` listing order,
/// newest-first results.
#[derive(Default)]
pub struct MemoryStore {
    targets: Mutex<Vec<Target>>,
    results: Mutex<Vec<CheckResult>>,
    keys: Mutex<HashMap<String, (String, String)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a raw URL directly, bypassing the service layer. Handy for
    /// seeding checker tests.
    pub fn seed_target(&self, raw_url: &str) -> Target {
        let (url, host) = core::canonicalize(raw_url).expect("seed url must canonicalize");
        let target = Target::new(core::new_id("t"), url, host);
        self.insert_target(target.clone());
        target
    }

    /// Inserts a fully-formed target, e.g. with a controlled `created_at`.
    pub fn insert_target(&self, target: Target) {
        self.targets.lock().unwrap().push(target);
    }

    pub fn result_count(&self) -> usize {
        self.results.lock().unwrap().len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn create_or_get_target(
        &self,
        id: &str,
        url: &str,
        host: &str,
    ) -> Result<(Target, bool)> {
        let mut targets = self.targets.lock().unwrap();
        if let Some(existing) = targets.iter().find(|t| t.url == url) {
            return Ok((existing.clone(), false));
        }
        let target = Target::new(id.to_string(), url.to_string(), host.to_string());
        targets.push(target.clone());
        Ok((target, true))
    }

    async fn find_target(&self, id: &str) -> Result<Option<Target>> {
        Ok(self
            .targets
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == id)
            .cloned())
    }

    async fn upsert_idempotency_key(
        &self,
        key: &str,
        request_hash: &str,
        new_id: &str,
        url: &str,
        host: &str,
    ) -> Result<(String, bool)> {
        let mut keys = self.keys.lock().unwrap();
        if let Some((existing_hash, target_id)) = keys.get(key) {
            if existing_hash != request_hash {
                return Err(AppError::IdempotencyConflict);
            }
            return Ok((target_id.clone(), true));
        }

        let mut targets = self.targets.lock().unwrap();
        let target_id = match targets.iter().find(|t| t.url == url) {
            Some(existing) => existing.id.clone(),
            None => {
                let target = Target::new(new_id.to_string(), url.to_string(), host.to_string());
                let id = target.id.clone();
                targets.push(target);
                id
            }
        };

        keys.insert(
            key.to_string(),
            (request_hash.to_string(), target_id.clone()),
        );
        Ok((target_id, false))
    }

    async fn list_targets(
        &self,
        host: Option<&str>,
        after: Option<&Cursor>,
        limit: i64,
    ) -> Result<(Vec<Target>, Option<Cursor>)> {
        let mut items: Vec<Target> = self
            .targets
            .lock()
            .unwrap()
            .iter()
            .filter(|t| host.map_or(true, |h| t.host == h))
            .filter(|t| {
                after.map_or(true, |c| {
                    (t.created_at, t.id.as_str()) > (c.created_at, c.id.as_str())
                })
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));

        let next = if items.len() > limit as usize {
            items.truncate(limit as usize);
            items.last().map(|t| Cursor {
                created_at: t.created_at,
                id: t.id.clone(),
            })
        } else {
            None
        };
        Ok((items, next))
    }

    async fn append_check_result(&self, record: &CheckResult) -> Result<()> {
        self.results.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn list_results(
        &self,
        target_id: &str,
        since: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<CheckResult>> {
        let mut items: Vec<CheckResult> = self
            .results
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.target_id == target_id)
            .filter(|r| since.map_or(true, |s| r.checked_at >= s))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.checked_at.cmp(&a.checked_at));
        items.truncate(limit as usize);
        Ok(items)
    }
}
