//! Environment-driven configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;
use crate::task::sweep::DeliveryFailurePolicy;

#[derive(Clone, Debug)]
pub struct Config {
    pub sweep_interval: Duration,
    pub probe_timeout: Duration,
    pub max_concurrent_probes: Option<usize>,
    pub delivery_failure_policy: DeliveryFailurePolicy,
    pub db_url: String,
    pub db_path: String,
    pub logs_path: PathBuf,
    pub bot_token: String,
    pub telegram_api_url: String,
    pub registration_url: String,
    pub registration_term: String,
    pub probes_per_minute: u32,
}

impl Config {
    /// Creates a config populated with defaults. `bot_token` stays empty until [`Config::load`].
    pub fn new() -> Self {
        Self {
            sweep_interval: Duration::from_secs(180),
            probe_timeout: Duration::from_secs(90),
            max_concurrent_probes: None,
            delivery_failure_policy: DeliveryFailurePolicy::default(),
            db_url: "sqlite://data/data.db".to_string(),
            db_path: "data/data.db".to_string(),
            logs_path: PathBuf::from("logs"),
            bot_token: String::new(),
            telegram_api_url: "https://api.telegram.org".to_string(),
            registration_url: "https://bxeregprod.oit.nd.edu/StudentRegistration/ssb".to_string(),
            registration_term: "202510".to_string(),
            probes_per_minute: 30,
        }
    }

    /// Loads values from the process environment.
    pub fn load(&mut self) -> Result<(), AppError> {
        self.load_from(|key| std::env::var(key).ok())
    }

    /// Loads values through `lookup`, keeping defaults for absent optional keys.
    pub fn load_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), AppError> {
        if let Some(secs) = parse_nonzero::<u64>(&lookup, "SWEEP_INTERVAL")? {
            self.sweep_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_nonzero::<u64>(&lookup, "PROBE_TIMEOUT")? {
            self.probe_timeout = Duration::from_secs(secs);
        }
        if let Some(max) = parse_var::<usize>(&lookup, "MAX_CONCURRENT_PROBES")? {
            self.max_concurrent_probes = (max > 0).then_some(max);
        }
        if let Some(policy) = parse_var(&lookup, "DELIVERY_FAILURE_POLICY")? {
            self.delivery_failure_policy = policy;
        }
        if let Some(per_minute) = parse_nonzero::<u32>(&lookup, "PROBES_PER_MINUTE")? {
            self.probes_per_minute = per_minute;
        }

        if let Some(v) = lookup("DB_URL") {
            self.db_url = v;
        }
        if let Some(v) = lookup("DB_PATH") {
            self.db_path = v;
        }
        if let Some(v) = lookup("LOGS_PATH") {
            self.logs_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("TELEGRAM_API_URL") {
            self.telegram_api_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = lookup("REGISTRATION_URL") {
            self.registration_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = lookup("REGISTRATION_TERM") {
            self.registration_term = v;
        }

        self.bot_token = lookup("BOT_TOKEN")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::MissingConfig {
                key: "BOT_TOKEN".to_string(),
            })?;

        Ok(())
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, AppError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| AppError::InvalidConfig {
                key: key.to_string(),
                value: raw,
            }),
    }
}

/// Like [`parse_var`], but zero is rejected.
fn parse_nonzero<T: FromStr + Default + PartialEq + ToString>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, AppError> {
    match parse_var::<T>(lookup, key)? {
        Some(value) if value == T::default() => Err(AppError::InvalidConfig {
            key: key.to_string(),
            value: value.to_string(),
        }),
        parsed => Ok(parsed),
    }
}
