use std::sync::Arc;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::core;
use crate::error::Result;
use crate::models::{CheckResult, Cursor, Target};
use crate::observability::get_metrics;
use crate::repositories::Store;

/// Registration protocol and read paths over the store.
pub struct TargetService {
    store: Arc<dyn Store>,
}

impl TargetService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Registers a URL, returning the owning target and whether this call
    /// created it.
    ///
    /// Without a key this is create-or-get on the canonical URL. With a key,
    /// the store resolves the `(key, request_hash)` pair atomically: a
    /// matching replay returns the original target, a mismatched replay is an
    /// `IdempotencyConflict`, and a lost insert race is retried internally.
    pub async fn register(
        &self,
        raw_url: &str,
        idempotency_key: Option<&str>,
    ) -> Result<(Target, bool)> {
        let (canonical_url, host) = core::canonicalize(raw_url)?;
        let new_id = core::new_id("t");

        let (target, created) = match idempotency_key {
            None => {
                self.store
                    .create_or_get_target(&new_id, &canonical_url, &host)
                    .await?
            }
            Some(key) => {
                let request_hash = hex::encode(Sha256::digest(canonical_url.as_bytes()));
                let (target_id, existed) = self
                    .store
                    .upsert_idempotency_key(key, &request_hash, &new_id, &canonical_url, &host)
                    .await?;
                let target = self.store.find_target(&target_id).await?.ok_or_else(|| {
                    anyhow::anyhow!("target {target_id} missing after idempotent upsert")
                })?;
                (target, !existed)
            }
        };

        get_metrics().record_registration(created);
        Ok((target, created))
    }

    pub async fn list_targets(
        &self,
        host: Option<&str>,
        after: Option<&Cursor>,
        limit: i64,
    ) -> Result<(Vec<Target>, Option<Cursor>)> {
        self.store.list_targets(host, after, limit).await
    }

    pub async fn list_results(
        &self,
        target_id: &str,
        since: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<CheckResult>> {
        self.store.list_results(target_id, since, limit).await
    }
}
