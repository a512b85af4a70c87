use crate::application_port::ConfigurationError;
use anyhow::{Result, anyhow};
use config::{Config, File};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub auth: Auth,
    pub session_store: SessionStore,
    pub http: Http,
    pub log: Log,
}

#[derive(Debug, Deserialize)]
pub struct Auth {
    pub issuer: String,
    pub audience: String,
    pub access_ttl: String,
    pub refresh_ttl: String,
    #[serde(default)]
    pub leeway_secs: u64,
}

impl Auth {
    pub fn access_ttl(&self) -> Result<Duration, ConfigurationError> {
        parse_ttl("ACCESS_TTL", &self.access_ttl)
    }

    pub fn refresh_ttl(&self) -> Result<Duration, ConfigurationError> {
        parse_ttl("REFRESH_TTL", &self.refresh_ttl)
    }

    pub fn leeway(&self) -> Duration {
        Duration::from_secs(self.leeway_secs)
    }
}

#[derive(Debug, Deserialize)]
pub struct SessionStore {
    pub backend: String, // "memory" or "redis"
    pub redis_url: Option<String>,
    pub key_prefix: String,
    pub timeout_ms: u64,
    pub sweep_interval_secs: u64,
}

impl SessionStore {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub address: String,
    #[serde(default = "default_true")]
    pub secure_cookie: bool,
    #[serde(default)]
    pub dev_login: bool,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

fn default_true() -> bool {
    true
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .set_override_option("auth.access_ttl", std::env::var("ACCESS_TTL").ok())
        .map_err(|e| anyhow!(e))?
        .set_override_option("auth.refresh_ttl", std::env::var("REFRESH_TTL").ok())
        .map_err(|e| anyhow!(e))?
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}

/// Token signing secrets. Both are required; the process must not start without them.
#[derive(Clone)]
pub struct Secrets {
    pub access_secret: Vec<u8>,
    pub refresh_secret: Vec<u8>,
}

impl Secrets {
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Ok(Self {
            access_secret: required_env("ACCESS_SECRET")?,
            refresh_secret: required_env("REFRESH_SECRET")?,
        })
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secrets(..)")
    }
}

fn required_env(key: &'static str) -> Result<Vec<u8>, ConfigurationError> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value.into_bytes()),
        _ => Err(ConfigurationError::MissingSecret(key)),
    }
}

/// Parses `900`, `900s`, `15m`, `12h` or `7d`.
pub fn parse_ttl(key: &str, raw: &str) -> Result<Duration, ConfigurationError> {
    let raw = raw.trim();
    let invalid = |reason: &str| ConfigurationError::InvalidValue {
        key: key.to_string(),
        reason: format!("{reason}: {raw:?}"),
    };

    let (digits, unit) = match raw.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => raw.split_at(idx),
        None => (raw, "s"),
    };
    let amount: u64 = digits
        .parse()
        .map_err(|_| invalid("expected a number with an optional s/m/h/d suffix"))?;
    let unit_secs: u64 = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        _ => return Err(invalid("unknown unit")),
    };
    let secs = amount
        .checked_mul(unit_secs)
        .ok_or_else(|| invalid("out of range"))?;
    if secs == 0 {
        return Err(invalid("must be greater than zero"));
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ttl_units() {
        assert_eq!(parse_ttl("T", "900").unwrap(), Duration::from_secs(900));
        assert_eq!(parse_ttl("T", "45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_ttl("T", "15m").unwrap(), Duration::from_secs(15 * 60));
        assert_eq!(parse_ttl("T", "12h").unwrap(), Duration::from_secs(12 * 3600));
        assert_eq!(parse_ttl("T", " 7d ").unwrap(), Duration::from_secs(7 * 86400));
    }

    #[test]
    fn test_parse_ttl_rejects_garbage() {
        assert!(parse_ttl("T", "").is_err());
        assert!(parse_ttl("T", "0").is_err());
        assert!(parse_ttl("T", "15 minutes").is_err());
        assert!(parse_ttl("T", "m").is_err());
        assert!(parse_ttl("T", "7w").is_err());
    }

    #[test]
    fn test_parse_dev_settings() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/settings/dev.toml");
        let settings = parse_settings(Some(path)).unwrap();

        assert_eq!(settings.session_store.backend, "memory");
        assert!(settings.auth.refresh_ttl().unwrap() > settings.auth.access_ttl().unwrap());
    }
}
