use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Keyset-pagination position over the `(created_at, id)` target order.
///
/// The wire form is base64url (no padding) of the JSON object; clients treat
/// it as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub created_at: DateTime<Utc>,
    pub id: String,
}

impl Cursor {
    pub fn encode(&self) -> String {
        let json = serde_json::to_vec(self).expect("cursor serialization cannot fail");
        URL_SAFE_NO_PAD.encode(json)
    }

    pub fn decode(token: &str) -> Result<Self> {
        if token.is_empty() {
            return Err(AppError::Validation("empty page_token".to_string()));
        }
        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|e| AppError::Validation(format!("bad page_token: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| AppError::Validation(format!("bad page_token: {e}")))
    }
}
