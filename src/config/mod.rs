//! Application configuration: TOML file, `TABOO_*` environment overrides,
//! startup validation.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

mod duration;
mod env;

pub use duration::ConfigDuration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// "development" or "production".
    pub environment: String,
    pub server: ServerConfig,
    pub game: GameConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub read_timeout: ConfigDuration,
    pub write_timeout: ConfigDuration,
    pub shutdown_timeout: ConfigDuration,
    pub request_timeout: ConfigDuration,
    pub sse_heartbeat: ConfigDuration,
    /// Sustained requests per second, per client IP.
    pub rate_limit: u32,
    /// Token bucket capacity, per client IP.
    pub rate_burst: u32,
    /// Allowed origins in production. Development echoes any origin.
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Total time to reveal all picks of a round.
    pub draw_duration: ConfigDuration,
    /// Gap between rounds.
    pub wait_duration: ConfigDuration,
    pub pick_count: usize,
    pub max_number: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub driver: String,
    pub dsn: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// "text" or "json".
    pub format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".into(),
            server: ServerConfig::default(),
            game: GameConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            read_timeout: ConfigDuration(Duration::from_secs(30)),
            write_timeout: ConfigDuration(Duration::from_secs(30)),
            shutdown_timeout: ConfigDuration(Duration::from_secs(10)),
            request_timeout: ConfigDuration(Duration::from_secs(30)),
            sse_heartbeat: ConfigDuration(Duration::from_secs(15)),
            rate_limit: 100,
            rate_burst: 20,
            cors_origins: Vec::new(),
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            draw_duration: ConfigDuration(Duration::from_secs(90)),
            wait_duration: ConfigDuration(Duration::from_secs(90)),
            pick_count: 20,
            max_number: 80,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: "sqlite".into(),
            dsn: "taboo.db".into(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Config {
    /// Load configuration: defaults, then the TOML file at `path` (a missing
    /// file is fine), then `TABOO_*` environment overrides, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(path) => match std::fs::read_to_string(path) {
                Ok(raw) => toml::from_str(&raw)
                    .with_context(|| format!("parsing config file {}", path.display()))?,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default(),
                Err(err) => {
                    return Err(err)
                        .with_context(|| format!("reading config file {}", path.display()))
                }
            },
            None => Self::default(),
        };

        env::apply(&mut cfg);
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        match self.environment.as_str() {
            "development" => {}
            "production" => {
                if self.server.cors_origins.is_empty() {
                    bail!("production requires server.cors_origins");
                }
            }
            other => bail!("environment must be development or production, got {other:?}"),
        }

        if self.server.rate_limit == 0 {
            bail!("server.rate_limit must be at least 1");
        }
        if self.server.rate_burst == 0 {
            bail!("server.rate_burst must be at least 1");
        }
        for (name, d) in [
            ("server.shutdown_timeout", self.server.shutdown_timeout),
            ("server.request_timeout", self.server.request_timeout),
            ("server.sse_heartbeat", self.server.sse_heartbeat),
            ("game.draw_duration", self.game.draw_duration),
            ("game.wait_duration", self.game.wait_duration),
        ] {
            if d.0.is_zero() {
                bail!("{name} must be greater than zero");
            }
        }

        if self.game.pick_count == 0 {
            bail!("game.pick_count must be at least 1");
        }
        if self.game.max_number == 0 {
            bail!("game.max_number must be at least 1");
        }
        if (self.game.max_number as usize) < self.game.pick_count {
            bail!(
                "game.max_number ({}) must be at least game.pick_count ({})",
                self.game.max_number,
                self.game.pick_count
            );
        }

        if self.database.driver != "sqlite" {
            bail!("unsupported database.driver {:?}", self.database.driver);
        }

        match self.logging.format.as_str() {
            "text" | "json" => {}
            other => bail!("logging.format must be text or json, got {other:?}"),
        }

        Ok(())
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }
}
