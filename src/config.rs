use chrono::Duration;
use std::net::SocketAddr;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_DATABASE: &str = "wk";
const DEFAULT_MAX_AGE_DAYS: i64 = 180;
const DEFAULT_MAX_FUTURE_SECS: i64 = 60 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub mongodb_uri: String,
    pub mongodb_database: String,
    pub listen_addr: SocketAddr,
    pub use_ansi: bool,
    pub heartbeats: HeartBeatLimits,
}

/// Window of event times accepted relative to receipt time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartBeatLimits {
    pub max_age: Duration,
    /// Tolerated client clock skew.
    pub max_future: Duration,
}

impl Default for HeartBeatLimits {
    fn default() -> Self {
        Self {
            max_age: Duration::days(DEFAULT_MAX_AGE_DAYS),
            max_future: Duration::seconds(DEFAULT_MAX_FUTURE_SECS),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to get \"{0}\" environment variable")]
    Missing(&'static str),

    #[error("invalid value {value:?} for \"{key}\"")]
    Invalid { key: &'static str, value: String },
}

impl Config {
    /// Reads the configuration from the environment, after loading `.env`
    /// if there is one.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mongodb_uri = lookup("MONGODB_URI").ok_or(ConfigError::Missing("MONGODB_URI"))?;
        let mongodb_database =
            lookup("MONGODB_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string());
        let listen_addr =
            parse_or::<_, SocketAddr>(&lookup, "LISTEN_ADDR", DEFAULT_LISTEN_ADDR.parse().ok())?;
        let max_age_days =
            parse_or::<_, i64>(&lookup, "HEARTBEATS_MAX_AGE_DAYS", Some(DEFAULT_MAX_AGE_DAYS))?;
        let max_future_secs =
            parse_or::<_, i64>(&lookup, "HEARTBEATS_MAX_FUTURE_SECS", Some(DEFAULT_MAX_FUTURE_SECS))?;
        let max_age = window("HEARTBEATS_MAX_AGE_DAYS", max_age_days, Duration::try_days)?;
        let max_future =
            window("HEARTBEATS_MAX_FUTURE_SECS", max_future_secs, Duration::try_seconds)?;

        Ok(Self {
            mongodb_uri,
            mongodb_database,
            listen_addr,
            use_ansi: lookup("NO_COLOR").is_none(),
            heartbeats: HeartBeatLimits {
                max_age,
                max_future,
            },
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: Option<T>) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => default.ok_or(ConfigError::Missing(key)),
    }
}

/// Non-negative amount that fits a `Duration`.
fn window(
    key: &'static str,
    amount: i64,
    to_duration: fn(i64) -> Option<Duration>,
) -> Result<Duration, ConfigError> {
    if amount < 0 {
        return Err(ConfigError::Invalid {
            key,
            value: amount.to_string(),
        });
    }
    to_duration(amount).ok_or(ConfigError::Invalid {
        key,
        value: amount.to_string(),
    })
}
