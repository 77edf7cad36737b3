//! Ingestion Configuration
//!
//! Everything the driver needs is carried by [`IngestConfig`]. Values come
//! from built-in defaults, then an optional JSON file, then environment
//! variables, in increasing precedence.

use crate::constants::{DEFAULT_BASE_URL, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_REQUEST_DELAY_MS, DEFAULT_WINDOWS};
use crate::error::{AppError, Result};
use crate::models::LookbackWindow;
use crate::utils::{env_opt, is_sql_identifier, parse_flag};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Calendar used when turning an aligned epoch into a stored timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimeBasis {
    /// Wall-clock time of the host
    #[default]
    Local,
    Utc,
}

impl TimeBasis {
    pub fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(TimeBasis::Local),
            "utc" => Ok(TimeBasis::Utc),
            _ => Err(format!("Invalid time basis: {}. Valid options: local, utc", s)),
        }
    }
}

/// One target table and the lookback window that feeds it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowTable {
    pub table: String,
    pub window: LookbackWindow,
}

impl WindowTable {
    pub fn new(table: impl Into<String>, window: LookbackWindow) -> Self {
        Self {
            table: table.into(),
            window,
        }
    }
}

/// Database connection parameters
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Full connection URL; wins over the individual parts when set
    pub url: Option<String>,
    pub scheme: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: String,
    pub port: u16,
    pub name: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            scheme: "postgresql".to_string(),
            user: None,
            password: None,
            host: "localhost".to_string(),
            port: 5432,
            name: None,
        }
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url.as_ref().map(|_| "<set>"))
            .field("scheme", &self.scheme)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .finish()
    }
}

impl DatabaseConfig {
    /// `{scheme}://{user}:{password}@{host}:{port}/{database}`, or `url` as given
    pub fn connection_string(&self) -> Result<String> {
        if let Some(ref url) = self.url {
            return Ok(url.clone());
        }

        let user = self
            .user
            .as_deref()
            .ok_or_else(|| AppError::Config("database user is not set".to_string()))?;
        let name = self
            .name
            .as_deref()
            .ok_or_else(|| AppError::Config("database name is not set".to_string()))?;

        Ok(format!(
            "{}://{}:{}@{}:{}/{}",
            self.scheme,
            user,
            self.password.as_deref().unwrap_or(""),
            self.host,
            self.port,
            name
        ))
    }

    /// Connection target safe to print
    pub fn display_target(&self) -> String {
        match self.url {
            Some(ref url) => match url.split_once('@') {
                Some((_, rest)) => format!("{}://…@{}", self.scheme_of(url), rest),
                None => url.clone(),
            },
            None => format!(
                "{}://{}@{}:{}/{}",
                self.scheme,
                self.user.as_deref().unwrap_or("?"),
                self.host,
                self.port,
                self.name.as_deref().unwrap_or("?")
            ),
        }
    }

    fn scheme_of<'a>(&self, url: &'a str) -> &'a str {
        url.split_once("://").map(|(scheme, _)| scheme).unwrap_or(url)
    }
}

/// Spacing between upstream requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingPolicy {
    pub request_delay_ms: u64,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            request_delay_ms: DEFAULT_REQUEST_DELAY_MS,
        }
    }
}

impl PacingPolicy {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

/// Upstream HTTP settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

/// Configuration for an ingestion pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Asset identifier on the upstream API (e.g. "ripple")
    pub asset_id: String,

    /// Quote currency (e.g. "usd")
    pub currency: String,

    /// Tables to fill, processed in this order
    pub windows: Vec<WindowTable>,

    pub database: DatabaseConfig,

    pub pacing: PacingPolicy,

    pub http: HttpConfig,

    pub time_basis: TimeBasis,

    /// Abort the pass on the first failing window
    pub fail_fast: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            asset_id: "ripple".to_string(),
            currency: "usd".to_string(),
            windows: DEFAULT_WINDOWS
                .iter()
                .filter_map(|(table, token)| {
                    LookbackWindow::from_str(token)
                        .ok()
                        .map(|window| WindowTable::new(*table, window))
                })
                .collect(),
            database: DatabaseConfig::default(),
            pacing: PacingPolicy::default(),
            http: HttpConfig::default(),
            time_basis: TimeBasis::default(),
            fail_fast: true,
        }
    }
}

impl IngestConfig {
    /// Load from an optional JSON file plus process environment, then validate
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(env_opt)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config file; missing keys fall back to defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| AppError::Io(format!("Failed to read config {:?}: {}", path, e)))?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        serde_json::from_str(contents).map_err(|e| AppError::Config(format!("Invalid config JSON: {}", e)))
    }

    /// Apply `NAME=value` overrides from `lookup` (the environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("ASSET_ID") {
            self.asset_id = v;
        }
        if let Some(v) = lookup("VS_CURRENCY") {
            self.currency = v;
        }

        let db = &mut self.database;
        if let Some(v) = lookup("DATABASE_URL") {
            db.url = Some(v);
        }
        if let Some(v) = lookup("DB_SCHEME") {
            db.scheme = v;
        }
        if let Some(v) = lookup("DB_USER") {
            db.user = Some(v);
        }
        if let Some(v) = lookup("DB_PASSWORD") {
            db.password = Some(v);
        }
        if let Some(v) = lookup("DB_HOST") {
            db.host = v;
        }
        if let Some(v) = lookup("DB_PORT") {
            db.port = parse_number("DB_PORT", &v)?;
        }
        if let Some(v) = lookup("DB_NAME") {
            db.name = Some(v);
        }

        if let Some(v) = lookup("REQUEST_DELAY_MS") {
            self.pacing.request_delay_ms = parse_number("REQUEST_DELAY_MS", &v)?;
        }
        if let Some(v) = lookup("COINGECKO_BASE_URL") {
            self.http.base_url = v;
        }
        if let Some(v) = lookup("HTTP_TIMEOUT_SECS") {
            self.http.timeout_secs = parse_number("HTTP_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("ALIGN_TIMEZONE") {
            self.time_basis = TimeBasis::from_str(&v).map_err(AppError::Config)?;
        }
        if let Some(v) = lookup("FAIL_FAST") {
            self.fail_fast = parse_flag(&v)
                .ok_or_else(|| AppError::Config(format!("FAIL_FAST: not a boolean: {}", v)))?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.asset_id.trim().is_empty() {
            return Err(AppError::Config("asset_id must not be empty".to_string()));
        }
        if self.currency.trim().is_empty() {
            return Err(AppError::Config("currency must not be empty".to_string()));
        }
        if self.windows.is_empty() {
            return Err(AppError::Config("at least one window must be configured".to_string()));
        }

        if self.http.timeout_secs == 0 {
            return Err(AppError::Config("http.timeout_secs must be greater than 0".to_string()));
        }

        let mut seen = HashSet::new();
        for entry in &self.windows {
            if !is_sql_identifier(&entry.table) {
                return Err(AppError::Config(format!("invalid table name: {:?}", entry.table)));
            }
            if !seen.insert(entry.table.as_str()) {
                return Err(AppError::Config(format!("table {} configured twice", entry.table)));
            }
        }

        self.database.connection_string()?;
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::Config(format!("{}: not a valid number: {}", name, value)))
}
