//! Configuration Module
//!
//! Settings are layered: built-in defaults, then an optional `config.yaml`,
//! then `DC_`-prefixed environment variables, each layer overriding the
//! previous one.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::duration::parse_duration;

/// Directories searched for `config.yaml` (or `config.yml`), in order.
pub const CONFIG_SEARCH_PATHS: &[&str] = &[".", "./config", "/etc/distributed-cache"];

const CONFIG_FILE_NAMES: &[&str] = &["config.yaml", "config.yml"];

/// Errors raised while loading configuration.
///
/// Only the file layer can fail; bad environment values are ignored.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

/// Server configuration parameters.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub logger: LoggerConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Deadline applied to every cache call made while serving a request
    pub request_timeout: Duration,
    /// Limit for receiving a request body
    pub read_timeout: Duration,
    /// Limit for producing a response; the request fails with 408 after it
    pub write_timeout: Duration,
    /// How long open connections may drain after a shutdown signal
    pub idle_timeout: Duration,
}

/// Which backing store the server fronts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Redis,
    Memory,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(BackendKind::Redis),
            "memory" => Ok(BackendKind::Memory),
            other => Err(format!("unknown cache backend: {}", other)),
        }
    }
}

/// Backing store connection settings.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub backend: BackendKind,
    /// `host:port` endpoints
    pub addresses: Vec<String>,
    pub password: String,
    /// Logical database index
    pub database: i64,
    pub max_retries: u32,
    pub pool_size: usize,
    pub min_idle_conns: usize,
    pub dial_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub pool_timeout: Duration,
    /// Sweep interval for the in-memory backend
    pub cleanup_interval: Duration,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" | "console" => Ok(LogFormat::Pretty),
            other => Err(format!("unknown log format: {}", other)),
        }
    }
}

/// Where log lines are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    File(PathBuf),
}

impl FromStr for LogOutput {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err("empty log output path".to_string()),
            "stdout" => Ok(LogOutput::Stdout),
            "stderr" => Ok(LogOutput::Stderr),
            path => Ok(LogOutput::File(PathBuf::from(path))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub level: String,
    pub format: LogFormat,
    /// `stdout`, `stderr` or a file path
    pub output: LogOutput,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(120),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Redis,
            addresses: vec!["localhost:6379".to_string()],
            password: String::new(),
            database: 0,
            max_retries: 3,
            pool_size: 10,
            min_idle_conns: 5,
            dial_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(3),
            write_timeout: Duration::from_secs(3),
            pool_timeout: Duration::from_secs(4),
            cleanup_interval: Duration::from_secs(1),
        }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
            output: LogOutput::Stdout,
        }
    }
}

// == Config File ==
// Every field is optional; absent ones keep the value from the layer below.

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    server: ServerFile,
    cache: CacheFile,
    logger: LoggerFile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ServerFile {
    host: Option<String>,
    port: Option<u16>,
    request_timeout: Option<String>,
    read_timeout: Option<String>,
    write_timeout: Option<String>,
    idle_timeout: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CacheFile {
    backend: Option<String>,
    addresses: Option<AddressList>,
    password: Option<String>,
    database: Option<i64>,
    max_retries: Option<u32>,
    pool_size: Option<usize>,
    min_idle_conns: Option<usize>,
    dial_timeout: Option<String>,
    read_timeout: Option<String>,
    write_timeout: Option<String>,
    pool_timeout: Option<String>,
    cleanup_interval: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoggerFile {
    level: Option<String>,
    format: Option<String>,
    output_path: Option<String>,
}

/// `addresses` may be a YAML list or a comma separated string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AddressList {
    List(Vec<String>),
    Joined(String),
}

impl Config {
    /// Loads defaults, then the config file, then environment overrides.
    ///
    /// `DC_CONFIG_FILE` names the file explicitly and it must exist.
    /// Otherwise [`CONFIG_SEARCH_PATHS`] are searched and a missing file is
    /// not an error.
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = env::var("DC_CONFIG_FILE")
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);
        let path = explicit.or_else(|| find_config_file(CONFIG_SEARCH_PATHS));

        let config = match path {
            Some(path) => Self::default().with_file(&path)?,
            None => Self::default(),
        };
        Ok(config.with_env_overrides(|name| env::var(name).ok()))
    }

    /// Applies the YAML file at `path` on top of `self`.
    pub fn with_file(self, path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.with_yaml(&contents).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Applies YAML `contents` on top of `self`.
    pub fn with_yaml(self, contents: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes as null
        if contents.trim().is_empty() {
            return Ok(self);
        }
        let file: Option<FileConfig> =
            serde_yaml::from_str(contents).map_err(|source| ConfigError::Parse {
                path: PathBuf::new(),
                source,
            })?;
        self.apply_file(file.unwrap_or_default())
    }

    fn apply_file(mut self, file: FileConfig) -> Result<Self, ConfigError> {
        let FileConfig {
            server,
            cache,
            logger,
        } = file;

        set(&mut self.server.host, server.host);
        set(&mut self.server.port, server.port);
        set(
            &mut self.server.request_timeout,
            file_duration("server.request_timeout", server.request_timeout)?,
        );
        set(
            &mut self.server.read_timeout,
            file_duration("server.read_timeout", server.read_timeout)?,
        );
        set(
            &mut self.server.write_timeout,
            file_duration("server.write_timeout", server.write_timeout)?,
        );
        set(
            &mut self.server.idle_timeout,
            file_duration("server.idle_timeout", server.idle_timeout)?,
        );

        set(&mut self.cache.backend, file_parse("cache.backend", cache.backend)?);
        if let Some(addresses) = cache.addresses {
            let addresses = match addresses {
                AddressList::List(list) => list
                    .iter()
                    .map(|addr| addr.trim().to_string())
                    .filter(|addr| !addr.is_empty())
                    .collect(),
                AddressList::Joined(raw) => parse_addresses(&raw),
            };
            if addresses.is_empty() {
                return Err(ConfigError::Invalid {
                    field: "cache.addresses",
                    message: "no addresses given".to_string(),
                });
            }
            self.cache.addresses = addresses;
        }
        set(&mut self.cache.password, cache.password);
        set(&mut self.cache.database, cache.database);
        set(&mut self.cache.max_retries, cache.max_retries);
        set(&mut self.cache.pool_size, cache.pool_size);
        set(&mut self.cache.min_idle_conns, cache.min_idle_conns);
        set(
            &mut self.cache.dial_timeout,
            file_duration("cache.dial_timeout", cache.dial_timeout)?,
        );
        set(
            &mut self.cache.read_timeout,
            file_duration("cache.read_timeout", cache.read_timeout)?,
        );
        set(
            &mut self.cache.write_timeout,
            file_duration("cache.write_timeout", cache.write_timeout)?,
        );
        set(
            &mut self.cache.pool_timeout,
            file_duration("cache.pool_timeout", cache.pool_timeout)?,
        );
        set(
            &mut self.cache.cleanup_interval,
            file_duration("cache.cleanup_interval", cache.cleanup_interval)?,
        );

        set(&mut self.logger.level, logger.level);
        set(&mut self.logger.format, file_parse("logger.format", logger.format)?);
        set(&mut self.logger.output, file_parse("logger.output_path", logger.output_path)?);

        Ok(self)
    }

    /// Overrides fields from `DC_*` variables resolved through `lookup`.
    ///
    /// # Environment Variables
    /// - `DC_SERVER_HOST` / `DC_SERVER_PORT` (default: 0.0.0.0:8080)
    /// - `DC_SERVER_REQUEST_TIMEOUT` (default: 30s)
    /// - `DC_SERVER_READ_TIMEOUT`, `DC_SERVER_WRITE_TIMEOUT` (default: 30s)
    /// - `DC_SERVER_IDLE_TIMEOUT` (default: 120s)
    /// - `DC_CACHE_BACKEND` - `redis` or `memory` (default: redis)
    /// - `DC_CACHE_ADDRESSES` - comma separated (default: localhost:6379)
    /// - `DC_CACHE_PASSWORD`, `DC_CACHE_DATABASE`, `DC_CACHE_MAX_RETRIES`
    /// - `DC_CACHE_POOL_SIZE`, `DC_CACHE_MIN_IDLE_CONNS`
    /// - `DC_CACHE_DIAL_TIMEOUT`, `DC_CACHE_READ_TIMEOUT`,
    ///   `DC_CACHE_WRITE_TIMEOUT`, `DC_CACHE_POOL_TIMEOUT`
    /// - `DC_CACHE_CLEANUP_INTERVAL` (default: 1s)
    /// - `DC_LOG_LEVEL` (default: info), `DC_LOG_FORMAT` (default: json)
    /// - `DC_LOG_OUTPUT_PATH` - `stdout`, `stderr` or a file (default: stdout)
    ///
    /// A missing or unparsable variable leaves the field unchanged.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let duration = |name: &str| lookup(name).and_then(|v| parse_duration(&v).ok());

        set(&mut self.server.host, lookup("DC_SERVER_HOST"));
        set(&mut self.server.port, env_parse(&lookup, "DC_SERVER_PORT"));
        set(&mut self.server.request_timeout, duration("DC_SERVER_REQUEST_TIMEOUT"));
        set(&mut self.server.read_timeout, duration("DC_SERVER_READ_TIMEOUT"));
        set(&mut self.server.write_timeout, duration("DC_SERVER_WRITE_TIMEOUT"));
        set(&mut self.server.idle_timeout, duration("DC_SERVER_IDLE_TIMEOUT"));

        set(&mut self.cache.backend, env_parse(&lookup, "DC_CACHE_BACKEND"));
        set(
            &mut self.cache.addresses,
            lookup("DC_CACHE_ADDRESSES")
                .map(|raw| parse_addresses(&raw))
                .filter(|addrs| !addrs.is_empty()),
        );
        set(&mut self.cache.password, lookup("DC_CACHE_PASSWORD"));
        set(&mut self.cache.database, env_parse(&lookup, "DC_CACHE_DATABASE"));
        set(&mut self.cache.max_retries, env_parse(&lookup, "DC_CACHE_MAX_RETRIES"));
        set(&mut self.cache.pool_size, env_parse(&lookup, "DC_CACHE_POOL_SIZE"));
        set(&mut self.cache.min_idle_conns, env_parse(&lookup, "DC_CACHE_MIN_IDLE_CONNS"));
        set(&mut self.cache.dial_timeout, duration("DC_CACHE_DIAL_TIMEOUT"));
        set(&mut self.cache.read_timeout, duration("DC_CACHE_READ_TIMEOUT"));
        set(&mut self.cache.write_timeout, duration("DC_CACHE_WRITE_TIMEOUT"));
        set(&mut self.cache.pool_timeout, duration("DC_CACHE_POOL_TIMEOUT"));
        set(&mut self.cache.cleanup_interval, duration("DC_CACHE_CLEANUP_INTERVAL"));

        set(&mut self.logger.level, lookup("DC_LOG_LEVEL"));
        set(&mut self.logger.format, env_parse(&lookup, "DC_LOG_FORMAT"));
        set(&mut self.logger.output, env_parse(&lookup, "DC_LOG_OUTPUT_PATH"));

        self
    }
}

impl ServerConfig {
    /// Returns the `host:port` the server binds to.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Returns the first `config.yaml` or `config.yml` found under `dirs`.
pub fn find_config_file<P: AsRef<Path>>(dirs: &[P]) -> Option<PathBuf> {
    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.as_ref().join(name)))
        .find(|path| path.is_file())
}

/// Splits a comma separated address list, dropping empty entries.
pub fn parse_addresses(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .map(str::to_string)
        .collect()
}

fn set<T>(field: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *field = value;
    }
}

fn env_parse<T: FromStr, F: Fn(&str) -> Option<String>>(lookup: &F, name: &str) -> Option<T> {
    lookup(name).and_then(|v| v.parse().ok())
}

fn file_duration(field: &'static str, raw: Option<String>) -> Result<Option<Duration>, ConfigError> {
    raw.map(|raw| {
        parse_duration(&raw).map_err(|err| ConfigError::Invalid {
            field,
            message: err.to_string(),
        })
    })
    .transpose()
}

fn file_parse<T>(field: &'static str, raw: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: FromStr<Err = String>,
{
    raw.map(|raw| raw.parse().map_err(|message| ConfigError::Invalid { field, message }))
        .transpose()
}
