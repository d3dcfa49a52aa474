use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::Result;

/// Runtime settings, loaded from environment variables with code defaults.
///
/// Durations accept Go-style strings (`500ms`, `15s`, `5m`, `1h`) or a bare
/// number of seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database_url: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: String,
    #[serde(deserialize_with = "de_duration")]
    pub check_interval: Duration,
    #[serde(deserialize_with = "de_duration")]
    pub http_timeout: Duration,
    pub max_concurrency: usize,
    #[serde(deserialize_with = "de_duration")]
    pub shutdown_grace: Duration,
}

impl Settings {
    pub fn new() -> Result<Self> {
        let builder = config::Config::builder()
            .set_default("port", 8080)?
            .set_default("log_level", "info")?
            .set_default("log_format", "pretty")?
            .set_default("check_interval", "15s")?
            .set_default("http_timeout", "5s")?
            .set_default("max_concurrency", 8)?
            .set_default("shutdown_grace", "10s")?
            .add_source(config::Environment::default().try_parsing(true));

        Ok(builder.build()?.try_deserialize()?)
    }
}

/// Parses `500ms` / `15s` / `5m` / `1h`; a bare number means seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let (value, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => s.split_at(idx),
        None => (s, "s"),
    };
    let value: u64 = value.parse().ok()?;
    match unit {
        "ms" => Some(Duration::from_millis(value)),
        "s" => Some(Duration::from_secs(value)),
        "m" => Some(Duration::from_secs(value * 60)),
        "h" => Some(Duration::from_secs(value * 3600)),
        _ => None,
    }
}

fn de_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
        Raw::Text(s) => parse_duration(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid duration: {s:?}"))),
    }
}
