use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub engine: EngineConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            engine: EngineConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Knobs for the lending engine itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// When set, counters persist to this JSON file instead of process memory.
    pub sequence_file: Option<PathBuf>,
    /// Timezone in which a reporting "day" is measured.
    pub reporting_offset: FixedOffset,
    /// New loans start `approved` when true, `pending` otherwise.
    pub loan_auto_approve: bool,
    /// Optimistic-write attempts before contention is reported as unavailability.
    pub ledger_max_retries: u32,
    pub read_retry_attempts: u32,
    pub read_retry_backoff: Duration,
    pub document_base_url: String,
    /// Orphaned loans younger than this are left alone by the sweep.
    pub orphan_grace: Duration,
    /// Period of the background orphan sweep; zero disables it.
    pub orphan_sweep_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sequence_file: None,
            reporting_offset: Utc.fix(),
            loan_auto_approve: true,
            ledger_max_retries: 16,
            read_retry_attempts: 3,
            read_retry_backoff: Duration::from_millis(25),
            document_base_url: "http://127.0.0.1:3000/documents".to_string(),
            orphan_grace: Duration::from_secs(300),
            orphan_sweep_interval: Duration::from_secs(300),
        }
    }
}

impl EngineConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let sequence_file = env::var("APP_SEQUENCE_FILE")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        let reporting_offset = match env::var("APP_REPORTING_UTC_OFFSET") {
            Ok(value) => parse_utc_offset(&value)?,
            Err(_) => defaults.reporting_offset,
        };

        let loan_auto_approve = match env::var("APP_LOAN_AUTO_APPROVE") {
            Ok(value) => parse_flag("APP_LOAN_AUTO_APPROVE", &value)?,
            Err(_) => defaults.loan_auto_approve,
        };

        let ledger_max_retries =
            number_or("APP_LEDGER_MAX_RETRIES", defaults.ledger_max_retries)?;
        let read_retry_attempts =
            number_or("APP_READ_RETRY_ATTEMPTS", defaults.read_retry_attempts)?;
        let read_retry_backoff = Duration::from_millis(number_or(
            "APP_READ_RETRY_BACKOFF_MS",
            defaults.read_retry_backoff.as_millis() as u64,
        )?);

        let document_base_url =
            env::var("APP_DOCUMENT_BASE_URL").unwrap_or(defaults.document_base_url);
        let orphan_grace = Duration::from_secs(number_or(
            "APP_ORPHAN_GRACE_SECS",
            defaults.orphan_grace.as_secs(),
        )?);
        let orphan_sweep_interval = Duration::from_secs(number_or(
            "APP_ORPHAN_SWEEP_SECS",
            defaults.orphan_sweep_interval.as_secs(),
        )?);

        Ok(Self {
            sequence_file,
            reporting_offset,
            loan_auto_approve,
            ledger_max_retries,
            read_retry_attempts,
            read_retry_backoff,
            document_base_url,
            orphan_grace,
            orphan_sweep_interval,
        })
    }
}

/// Accepts `Z`, `UTC`, `+HH:MM`, `-HH:MM`, and `+HHMM`.
pub fn parse_utc_offset(value: &str) -> Result<FixedOffset, ConfigError> {
    let invalid = || ConfigError::InvalidUtcOffset {
        value: value.to_string(),
    };
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
        return Ok(Utc.fix());
    }

    let (sign, rest) = match trimmed.as_bytes().first() {
        Some(b'+') => (1, &trimmed[1..]),
        Some(b'-') => (-1, &trimmed[1..]),
        _ => return Err(invalid()),
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let hours: i32 = digits[..2].parse().map_err(|_| invalid())?;
    let minutes: i32 = digits[2..].parse().map_err(|_| invalid())?;
    if hours > 14 || minutes > 59 {
        return Err(invalid());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            name,
            value: value.to_string(),
        }),
    }
}

fn number_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    let Ok(value) = env::var(name) else {
        return Ok(default);
    };
    match value.trim().parse::<T>() {
        Ok(parsed) => Ok(parsed),
        Err(_) => Err(ConfigError::InvalidNumber { name, value }),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidUtcOffset { value: String },
    InvalidFlag { name: &'static str, value: String },
    InvalidNumber { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidUtcOffset { value } => write!(
                f,
                "APP_REPORTING_UTC_OFFSET '{}' must look like +05:30, -04:00, or UTC",
                value
            ),
            ConfigError::InvalidFlag { name, value } => {
                write!(f, "{} '{}' must be true or false", name, value)
            }
            ConfigError::InvalidNumber { name, value } => {
                write!(f, "{} '{}' must be a non-negative integer", name, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidUtcOffset { .. }
            | ConfigError::InvalidFlag { .. }
            | ConfigError::InvalidNumber { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for name in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "APP_SEQUENCE_FILE",
            "APP_REPORTING_UTC_OFFSET",
            "APP_LOAN_AUTO_APPROVE",
            "APP_LEDGER_MAX_RETRIES",
            "APP_READ_RETRY_ATTEMPTS",
            "APP_READ_RETRY_BACKOFF_MS",
            "APP_DOCUMENT_BASE_URL",
            "APP_ORPHAN_GRACE_SECS",
            "APP_ORPHAN_SWEEP_SECS",
        ] {
            env::remove_var(name);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.engine, EngineConfig::default());
        assert_eq!(config.engine.reporting_offset.local_minus_utc(), 0);
        assert!(config.engine.loan_auto_approve);
        assert_eq!(config.engine.ledger_max_retries, 16);
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
    }

    #[test]
    fn engine_settings_come_from_env() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_SEQUENCE_FILE", "/var/lib/microfin/counters.json");
        env::set_var("APP_REPORTING_UTC_OFFSET", "+05:30");
        env::set_var("APP_LOAN_AUTO_APPROVE", "false");
        env::set_var("APP_LEDGER_MAX_RETRIES", "4");
        env::set_var("APP_READ_RETRY_BACKOFF_MS", "0");
        env::set_var("APP_ORPHAN_GRACE_SECS", "60");
        env::set_var("APP_ORPHAN_SWEEP_SECS", "0");

        let config = AppConfig::load().expect("config loads");
        reset_env();

        assert_eq!(
            config.engine.sequence_file,
            Some(PathBuf::from("/var/lib/microfin/counters.json"))
        );
        assert_eq!(config.engine.reporting_offset.local_minus_utc(), 19_800);
        assert!(!config.engine.loan_auto_approve);
        assert_eq!(config.engine.ledger_max_retries, 4);
        assert_eq!(config.engine.read_retry_backoff, Duration::ZERO);
        assert_eq!(config.engine.orphan_grace, Duration::from_secs(60));
        assert!(config.engine.orphan_sweep_interval.is_zero());
    }

    #[test]
    fn rejects_malformed_engine_settings() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_LOAN_AUTO_APPROVE", "sometimes");
        let err = AppConfig::load().expect_err("flag rejected");
        assert!(matches!(err, ConfigError::InvalidFlag { .. }));

        reset_env();
        env::set_var("APP_LEDGER_MAX_RETRIES", "-1");
        let err = AppConfig::load().expect_err("negative rejected");
        assert!(err.to_string().contains("APP_LEDGER_MAX_RETRIES"));
        reset_env();
    }

    #[test]
    fn parses_offset_forms() {
        assert_eq!(parse_utc_offset("UTC").expect("utc").local_minus_utc(), 0);
        assert_eq!(
            parse_utc_offset("-0400").expect("compact").local_minus_utc(),
            -4 * 3600
        );
        assert!(parse_utc_offset("+25:00").is_err());
        assert!(parse_utc_offset("05:30").is_err());
    }
}
