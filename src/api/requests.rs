use serde::{Deserialize, Serialize};

/// Body of `POST /v1/targets`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTargetRequest {
    pub url: String,
}

impl CreateTargetRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.url.trim().is_empty() {
            return Err("url cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Query parameters of `GET /v1/targets`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListTargetsQuery {
    pub host: Option<String>,
    pub limit: Option<i64>,
    pub page_token: Option<String>,
}

/// Query parameters of `GET /v1/targets/{id}/results`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListResultsQuery {
    pub limit: Option<i64>,
    pub since: Option<String>,
}

/// Clamps a requested page size into `1..=max`, falling back to `default`.
pub fn clamp_limit(requested: Option<i64>, default: i64, max: i64) -> i64 {
    match requested {
        Some(n) if n >= 1 && n <= max => n,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_clamping() {
        assert_eq!(clamp_limit(None, 20, 100), 20);
        assert_eq!(clamp_limit(Some(0), 20, 100), 20);
        assert_eq!(clamp_limit(Some(101), 20, 100), 20);
        assert_eq!(clamp_limit(Some(1), 20, 100), 1);
        assert_eq!(clamp_limit(Some(100), 20, 100), 100);
    }
}
