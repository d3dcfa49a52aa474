use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A registered URL under periodic observation.
///
/// `url` is the canonical form and the identity key; `host` is derived from
/// it at registration time. Targets are created exactly once and never
/// mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Target {
    pub id: String,
    pub url: String,
    pub host: String,
    pub created_at: DateTime<Utc>,
}

impl Target {
    pub fn new(id: String, url: String, host: String) -> Self {
        Self {
            id,
            url,
            host,
            created_at: Utc::now(),
        }
    }
}
