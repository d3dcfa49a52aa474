use serde::{Deserialize, Serialize};

use crate::models::{CheckResult, Target};

/// Error payload shared by all endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// One page of targets plus an opaque continuation token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetListResponse {
    pub items: Vec<Target>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// Recent results for one target, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultListResponse {
    pub items: Vec<CheckResult>,
}
