use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::workflows::payouts::{PayoutPolicyConfig, PolicyConfigProvider, SettlementOptions};

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
    pub payouts: PayoutSettings,
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
            payouts: PayoutSettings::from_env()?,
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

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Payout thresholds plus the settlement knobs that stay fixed for the process lifetime.
#[derive(Debug, Clone)]
pub struct PayoutSettings {
    pub policy: PayoutPolicyConfig,
    pub settlement: SettlementOptions,
}

impl PayoutSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let policy = policy_from_env()?;
        let currency = env::var("PAYOUTS_CURRENCY")
            .map(|value| value.trim().to_ascii_lowercase())
            .unwrap_or_else(|_| "eur".to_string());
        let processor_timeout = Duration::from_millis(parse_var(
            "PAYOUTS_PROCESSOR_TIMEOUT_MS",
            10_000u64,
        )?);
        let store_timeout = Duration::from_millis(parse_var("PAYOUTS_STORE_TIMEOUT_MS", 5_000u64)?);

        Ok(Self {
            policy,
            settlement: SettlementOptions {
                currency,
                processor_timeout,
                store_timeout,
            },
        })
    }
}

/// Reads the policy thresholds from the environment.
///
/// Automatic payouts stay disabled unless `PAYOUTS_AUTO_ENABLED` opts in.
pub fn policy_from_env() -> Result<PayoutPolicyConfig, ConfigError> {
    Ok(PayoutPolicyConfig {
        automatic_payouts_enabled: parse_flag("PAYOUTS_AUTO_ENABLED", false)?,
        automatic_approval_ceiling: parse_var(
            "PAYOUTS_AUTO_MAX_AMOUNT",
            Decimal::new(20_000, 2),
        )?,
        minimum_amount: parse_var("PAYOUTS_MIN_AMOUNT", Decimal::new(5_000, 2))?,
        minimum_tenure_days: parse_var("PAYOUTS_MIN_TENURE_DAYS", 30i64)?,
        minimum_completed_transactions: parse_var("PAYOUTS_MIN_COMPLETED_BOOKINGS", 5u32)?,
    })
}

/// Provider that re-reads the environment at the start of every evaluation, so the feature
/// toggle can be flipped without a restart.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvPolicyConfig;

impl PolicyConfigProvider for EnvPolicyConfig {
    fn policy(&self) -> Result<PayoutPolicyConfig, ConfigError> {
        policy_from_env()
    }
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
            key,
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}

fn parse_flag(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue { key, value: raw }),
        },
        Err(_) => Ok(default),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidValue { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidValue { key, value } => {
                write!(f, "{key} has an invalid value '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidValue { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
