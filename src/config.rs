use std::env;
use std::time::Duration;

use crate::error::SyncError;

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_REFRESH_SECS: u64 = 21_600;
const DEFAULT_BATCH_SIZE: usize = 25;

/// Settings for talking to the upstream catalog and pacing sync runs.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    pub api_base_url: String,
    pub api_token: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Log routine fetch details at info level instead of debug.
    pub verbose: bool,
    pub refresh_interval: Duration,
    pub notify_email: Option<String>,
    pub batch_size: usize,
    pub probe_before_fetch: bool,
}

impl SyncConfig {
    pub fn new_from_env() -> Result<Self, SyncError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, SyncError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_base_url = non_empty("CATALOG_API_BASE_URL")
            .ok_or_else(|| SyncError::Config("CATALOG_API_BASE_URL is not set".to_string()))?
            .trim_end_matches('/')
            .to_string();
        if !api_base_url.starts_with("http://") && !api_base_url.starts_with("https://") {
            return Err(SyncError::Config(format!(
                "CATALOG_API_BASE_URL must be an http(s) url, got {}",
                api_base_url
            )));
        }

        let api_token = non_empty("CATALOG_API_TOKEN")
            .ok_or_else(|| SyncError::Config("CATALOG_API_TOKEN is not set".to_string()))?;

        let timeout = parse_number(&non_empty, "CATALOG_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        let connect_timeout = parse_number(
            &non_empty,
            "CATALOG_CONNECT_TIMEOUT_SECS",
            DEFAULT_CONNECT_TIMEOUT_SECS,
        )?;
        let refresh_secs = parse_number(&non_empty, "SYNC_REFRESH_SECS", DEFAULT_REFRESH_SECS)?;
        let batch_size = parse_number(&non_empty, "SYNC_BATCH_SIZE", DEFAULT_BATCH_SIZE as u64)?;

        if timeout == 0 || connect_timeout == 0 {
            return Err(SyncError::Config("timeouts must be greater than zero".to_string()));
        }
        if refresh_secs == 0 {
            return Err(SyncError::Config("SYNC_REFRESH_SECS must be greater than zero".to_string()));
        }
        if batch_size == 0 {
            return Err(SyncError::Config("SYNC_BATCH_SIZE must be greater than zero".to_string()));
        }

        let notify_email = non_empty("SYNC_NOTIFY_EMAIL");
        if let Some(email) = &notify_email {
            if !is_plausible_email(email) {
                return Err(SyncError::Config(format!("SYNC_NOTIFY_EMAIL is not a valid address: {}", email)));
            }
        }

        Ok(Self {
            api_base_url,
            api_token,
            timeout: Duration::from_secs(timeout),
            connect_timeout: Duration::from_secs(connect_timeout),
            verbose: parse_flag(&non_empty, "SYNC_LOG_VERBOSE", false)?,
            refresh_interval: Duration::from_secs(refresh_secs),
            notify_email,
            batch_size: batch_size as usize,
            probe_before_fetch: parse_flag(&non_empty, "SYNC_PROBE", true)?,
        })
    }

    pub fn courses_url(&self) -> String {
        format!("{}/courses", self.api_base_url)
    }

    pub fn availability_url(&self, course_id: &str) -> String {
        format!("{}/course_section_availability/{}", self.api_base_url, course_id)
    }
}

fn parse_number<F>(lookup: &F, key: &str, default: u64) -> Result<u64, SyncError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|_| SyncError::Config(format!("{} must be a non-negative integer, got {}", key, raw))),
        None => Ok(default),
    }
}

fn parse_flag<F>(lookup: &F, key: &str, default: bool) -> Result<bool, SyncError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(SyncError::Config(format!("{} must be a boolean, got {}", key, v))),
    }
}

fn is_plausible_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !value.contains(' '),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_applied() {
        let config = SyncConfig::from_lookup(lookup(&[
            ("CATALOG_API_BASE_URL", "https://catalog.example.com/v2/"),
            ("CATALOG_API_TOKEN", "secret"),
        ]))
        .expect("config should load");

        assert_eq!(config.api_base_url, "https://catalog.example.com/v2");
        assert_eq!(config.courses_url(), "https://catalog.example.com/v2/courses");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.connect_timeout, Duration::from_secs(15));
        assert_eq!(config.refresh_interval, Duration::from_secs(21_600));
        assert_eq!(config.batch_size, 25);
        assert!(!config.verbose);
        assert!(config.probe_before_fetch);
        assert!(config.notify_email.is_none());
    }

    #[test]
    fn test_missing_token_is_config_error() {
        let err = SyncConfig::from_lookup(lookup(&[("CATALOG_API_BASE_URL", "https://x.example.com")]))
            .unwrap_err();
        assert!(matches!(err, SyncError::Config(msg) if msg.contains("CATALOG_API_TOKEN")));
    }

    #[test]
    fn test_missing_base_url_is_config_error() {
        let err = SyncConfig::from_lookup(lookup(&[("CATALOG_API_TOKEN", "secret")])).unwrap_err();
        assert!(matches!(err, SyncError::Config(msg) if msg.contains("CATALOG_API_BASE_URL")));
    }

    #[test]
    fn test_rejects_invalid_values() {
        let base = [
            ("CATALOG_API_BASE_URL", "https://x.example.com"),
            ("CATALOG_API_TOKEN", "secret"),
        ];

        let mut pairs = base.to_vec();
        pairs.push(("SYNC_REFRESH_SECS", "0"));
        assert!(SyncConfig::from_lookup(lookup(&pairs)).is_err());

        let mut pairs = base.to_vec();
        pairs.push(("SYNC_NOTIFY_EMAIL", "not-an-email"));
        assert!(SyncConfig::from_lookup(lookup(&pairs)).is_err());

        let mut pairs = base.to_vec();
        pairs.push(("SYNC_LOG_VERBOSE", "maybe"));
        assert!(SyncConfig::from_lookup(lookup(&pairs)).is_err());

        assert!(SyncConfig::from_lookup(lookup(&[
            ("CATALOG_API_BASE_URL", "ftp://x.example.com"),
            ("CATALOG_API_TOKEN", "secret"),
        ]))
        .is_err());
    }
}
