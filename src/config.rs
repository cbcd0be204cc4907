use std::{env::var, io::ErrorKind, net::SocketAddr};

use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;
use tracing::Level;

const DEFAULT_CONFIG_PATH: &str = "lms.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: String,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub grading: GradingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: String,
    /// PEM certificate and key. HTTPS is used only when both are present.
    pub tls_cert: Option<String>,
    pub tls_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GradingConfig {
    /// Upper bound on students whose grades are recomputed at the same time.
    pub parallelism: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            grading: GradingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:9090".into(),
            tls_cert: None,
            tls_key: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            user: "postgres".into(),
            password: String::new(),
            max_connections: 10,
        }
    }
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self { parallelism: 8 }
    }
}

impl DatabaseConfig {
    /// Credentials are passed as-is, so a password may hold `@`, `:` or `/`.
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .username(&self.user)
            .password(&self.password)
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        self.address
            .parse::<SocketAddr>()
            .map_err(|e| format!("Invalid server address '{}': {e}", self.address))
    }

    /// Returns (certificate, key) when HTTPS is configured
    pub fn tls(&self) -> Option<(&str, &str)> {
        match (&self.tls_cert, &self.tls_key) {
            (Some(cert), Some(key)) => Some((cert.as_str(), key.as_str())),
            _ => None,
        }
    }
}

impl Config {
    /// Reads the file named by `LMS_CONFIG` (default `lms.toml`), falling back to defaults when
    /// it does not exist, then applies environment overrides.
    pub fn load() -> Result<Self, String> {
        let path = var("LMS_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());

        let mut config = match std::fs::read_to_string(&path) {
            Ok(contents) => Self::from_toml(&contents)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Self::default(),
            Err(e) => return Err(format!("Could not read {path}: {e}")),
        };

        config.apply_overrides(|name| var(name).ok());
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, String> {
        let config = toml::from_str::<Config>(contents)
            .map_err(|e| format!("Invalid configuration: {e}"))?;
        config.log_level()?;
        Ok(config)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(user) = lookup("PSQL_NAME") {
            self.database.user = user;
        }
        if let Some(password) = lookup("PSQL_PASS") {
            self.database.password = password;
        }
        if let Some(host) = lookup("PSQL_HOST") {
            self.database.host = host;
        }
        if let Some(n) = lookup("NTHREADS").and_then(|f| f.parse::<usize>().ok()) {
            self.grading.parallelism = n;
        }
    }

    pub fn log_level(&self) -> Result<Level, String> {
        self.log_level
            .parse::<Level>()
            .map_err(|_| format!("Unknown log level '{}'", self.log_level))
    }

    pub fn grading_parallelism(&self) -> usize {
        self.grading.parallelism.max(1)
    }
}
