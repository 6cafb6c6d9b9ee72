//! Environment-driven configuration. Every setting has a default that works
//! for local development; deployments override through process variables or
//! a `.env` file picked up at startup.

use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

/// Deployment stage, read from `APP_ENV`. Unrecognised values fall back to
/// development rather than refusing to boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            AppEnvironment::Development => "development",
            AppEnvironment::Test => "test",
            AppEnvironment::Production => "production",
        }
    }
}

/// Everything the binaries need to boot, grouped by concern.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub dispatch: DispatchSettings,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            environment: AppEnvironment::parse(&env_string("APP_ENV", "development")),
            server: ServerConfig::from_env()?,
            telemetry: TelemetryConfig::from_env(),
            dispatch: DispatchSettings::from_env()?,
        })
    }
}

/// HTTP bind settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env_string("APP_HOST", "127.0.0.1"),
            port: env_or("APP_PORT", 3000)?,
        })
    }

    /// Resolve host and port into a bindable address. `localhost` is accepted
    /// as a courtesy spelling of loopback; anything else must be an IP
    /// literal.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = if self.host.eq_ignore_ascii_case("localhost") {
            IpAddr::from([127, 0, 0, 1])
        } else {
            self.host
                .parse()
                .map_err(|source| ConfigError::InvalidHost { source })?
        };
        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Log verbosity handed to the tracing subscriber.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl TelemetryConfig {
    fn from_env() -> Self {
        Self {
            log_level: env_string("APP_LOG_LEVEL", "info"),
        }
    }
}

/// Engine dials exposed through the environment.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub expiry_minutes: i64,
    pub sweep_seconds: u64,
    pub match_tolerance_km: f64,
    pub match_top_k: usize,
}

impl DispatchSettings {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            expiry_minutes: env_or("DISPATCH_EXPIRY_MINUTES", 15)?,
            sweep_seconds: env_or("DISPATCH_SWEEP_SECONDS", 60)?,
            match_tolerance_km: env_or("DISPATCH_MATCH_TOLERANCE_KM", 3.0)?,
            match_top_k: env_or("DISPATCH_MATCH_TOP_K", 5)?,
        })
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            expiry_minutes: 15,
            sweep_seconds: 60,
            match_tolerance_km: 3.0,
            match_top_k: 5,
        }
    }
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidSetting { name }),
        Err(_) => Ok(default),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidHost { source: std::net::AddrParseError },
    InvalidSetting { name: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must be an IP literal or 'localhost'")
            }
            ConfigError::InvalidSetting { name } => {
                write!(f, "{name} is set but does not parse as a number")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidSetting { .. } => None,
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
        env::remove_var("APP_ENV");
        env::remove_var("APP_HOST");
        env::remove_var("APP_PORT");
        env::remove_var("APP_LOG_LEVEL");
        env::remove_var("DISPATCH_EXPIRY_MINUTES");
        env::remove_var("DISPATCH_SWEEP_SECONDS");
        env::remove_var("DISPATCH_MATCH_TOLERANCE_KM");
        env::remove_var("DISPATCH_MATCH_TOP_K");
    }

    #[test]
    fn defaults_cover_a_bare_environment() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.environment.label(), "development");
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.dispatch.expiry_minutes, 15);
        assert_eq!(config.dispatch.match_top_k, 5);
    }

    #[test]
    fn explicit_env_overrides_every_default() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_ENV", "production");
        env::set_var("APP_HOST", "0.0.0.0");
        env::set_var("APP_PORT", "8080");
        env::set_var("APP_LOG_LEVEL", "debug");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.environment, AppEnvironment::Production);
        assert_eq!(config.telemetry.log_level, "debug");
        let addr = config.server.socket_addr().expect("address resolves");
        assert_eq!(addr.to_string(), "0.0.0.0:8080");
        reset_env();
    }

    #[test]
    fn localhost_resolves_to_loopback() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn hostnames_other_than_localhost_are_refused() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "dispatch.internal");
        let config = AppConfig::load().expect("load defers host validation");
        let error = config.server.socket_addr().expect_err("not an IP literal");
        assert!(matches!(error, ConfigError::InvalidHost { .. }));
        reset_env();
    }

    #[test]
    fn rejects_an_unparsable_port() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_PORT", "harbor");
        let error = AppConfig::load().expect_err("port must be numeric");
        assert!(matches!(
            error,
            ConfigError::InvalidSetting { name: "APP_PORT" }
        ));
        reset_env();
    }

    #[test]
    fn dispatch_dials_come_from_env() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("DISPATCH_EXPIRY_MINUTES", "30");
        env::set_var("DISPATCH_MATCH_TOLERANCE_KM", "5.5");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.dispatch.expiry_minutes, 30);
        assert_eq!(config.dispatch.match_tolerance_km, 5.5);
        assert_eq!(config.dispatch.sweep_seconds, 60);
        reset_env();
    }

    #[test]
    fn rejects_unparsable_dials() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("DISPATCH_MATCH_TOP_K", "many");
        let error = AppConfig::load().expect_err("top-k must be numeric");
        assert!(matches!(
            error,
            ConfigError::InvalidSetting {
                name: "DISPATCH_MATCH_TOP_K"
            }
        ));
        reset_env();
    }
}
