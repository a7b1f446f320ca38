use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

use crate::jobs::TagMatch;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub jobs: JobsConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub environment: String,
    pub static_dir: PathBuf,
    /// Take the client address from `X-Forwarded-For` instead of the socket
    /// peer. Only safe behind a proxy that overwrites the header.
    pub trust_proxy: bool,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub ttl_secs: u64,
    pub sweep_interval_secs: u64,
    pub keep_alive_secs: u64,
    pub cookie_secure: bool,
}

#[derive(Debug, Clone)]
pub struct JobsConfig {
    /// `None` serves the bundled fixture.
    pub source: Option<PathBuf>,
    pub tag_match: TagMatch,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub per_minute: u32,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub dir: Option<PathBuf>,
}

impl ServerConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.ttl_secs).unwrap_or(i64::MAX))
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn keep_alive(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.keep_alive_secs.max(1))
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(key: &str, default: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var_or(key, default)
        .trim()
        .parse()
        .with_context(|| format!("invalid value for {key}"))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let server = ServerConfig {
            port: parse_var("PORT", "3000")?,
            host: var_or("HOST", "0.0.0.0"),
            environment: var_or("APP_ENV", "development"),
            static_dir: PathBuf::from(var_or("STATIC_DIR", "static")),
            trust_proxy: parse_var("TRUST_PROXY", "false")?,
        };

        let cookie_secure = match env::var("COOKIE_SECURE") {
            Ok(v) => v.trim().parse().context("invalid value for COOKIE_SECURE")?,
            Err(_) => server.is_production(),
        };

        let tag_match = var_or("TAG_MATCH", "exact")
            .parse::<TagMatch>()
            .map_err(anyhow::Error::msg)
            .context("invalid value for TAG_MATCH")?;

        Ok(Self {
            server,
            session: SessionConfig {
                ttl_secs: parse_var("SESSION_TTL_SECS", "3600")?,
                sweep_interval_secs: parse_var("SESSION_SWEEP_SECS", "900")?,
                keep_alive_secs: parse_var("KEEP_ALIVE_SECS", "15")?,
                cookie_secure,
            },
            jobs: JobsConfig {
                source: env::var("JOBS_FILE").ok().filter(|s| !s.is_empty()).map(PathBuf::from),
                tag_match,
            },
            rate_limit: RateLimitConfig {
                per_minute: parse_var("RATE_LIMIT_PER_MINUTE", "120")?,
            },
            logging: LoggingConfig {
                dir: env::var("LOG_DIR").ok().filter(|s| !s.is_empty()).map(PathBuf::from),
            },
        })
    }
}

impl Default for Config {
    /// Development defaults, without reading the environment.
    fn default() -> Self {
        Self {
            server: ServerConfig {
                port: 3000,
                host: "0.0.0.0".to_string(),
                environment: "development".to_string(),
                static_dir: PathBuf::from("static"),
                trust_proxy: false,
            },
            session: SessionConfig {
                ttl_secs: 3600,
                sweep_interval_secs: 900,
                keep_alive_secs: 15,
                cookie_secure: false,
            },
            jobs: JobsConfig {
                source: None,
                tag_match: TagMatch::Exact,
            },
            rate_limit: RateLimitConfig { per_minute: 120 },
            logging: LoggingConfig { dir: None },
        }
    }
}
