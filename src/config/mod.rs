//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

pub use cli::{CliArgs, Command, DatabaseOverride, MigrateArgs, ServeArgs, ServeOverrides};

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroU64, NonZeroUsize},
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "bannerflow";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 16;
const DEFAULT_CACHE_LOCAL_CAPACITY: u64 = 100;
const DEFAULT_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_SERVICE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_DELETION_QUEUE_CAPACITY: u64 = 100;
const DEFAULT_ADMISSION_CEILING: u64 = 200;
const DEFAULT_ADMISSION_POLL_INTERVAL_MS: u64 = 2_000;
const DEFAULT_CACHE_FILL_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_CACHE_READ_TIMEOUT_MS: u64 = 1_000;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub redis: RedisSettings,
    pub cache: CacheSettings,
    pub service: ServiceSettings,
    pub auth: AuthSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

/// Remote cache tier. Without a URL the cache runs in-process only.
#[derive(Debug, Clone)]
pub struct RedisSettings {
    pub url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub local_capacity: NonZeroUsize,
    pub ttl_secs: NonZeroU64,
}

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub timeout_ms: NonZeroU64,
    pub deletion_queue_capacity: NonZeroUsize,
    pub admission_ceiling: NonZeroUsize,
    pub admission_poll_interval_ms: NonZeroU64,
    pub cache_fill_timeout_ms: NonZeroU64,
    pub cache_read_timeout_ms: NonZeroU64,
}

/// Static access tokens. Admin tokens are also accepted on user routes.
#[derive(Clone, Default)]
pub struct AuthSettings {
    pub user_tokens: Vec<String>,
    pub admin_tokens: Vec<String>,
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("user_tokens", &self.user_tokens.len())
            .field("admin_tokens", &self.admin_tokens.len())
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix("BANNERFLOW")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("auth.user_tokens")
            .with_list_parse_key("auth.admin_tokens")
            .try_parsing(true),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Migrate(args)) => raw.apply_database_override(&args.database),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    redis: RawRedisSettings,
    cache: RawCacheSettings,
    service: RawServiceSettings,
    auth: RawAuthSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        self.apply_database_override(&overrides.database);

        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(url) = overrides.redis_url.as_ref() {
            self.redis.url = Some(url.clone());
        }
        if let Some(capacity) = overrides.cache_local_capacity {
            self.cache.local_capacity = Some(capacity);
        }
        if let Some(ttl) = overrides.cache_ttl_seconds {
            self.cache.ttl_seconds = Some(ttl);
        }
        if let Some(timeout) = overrides.service_timeout_ms {
            self.service.timeout_ms = Some(timeout);
        }
        if let Some(capacity) = overrides.service_deletion_queue_capacity {
            self.service.deletion_queue_capacity = Some(capacity);
        }
        if let Some(ceiling) = overrides.service_admission_ceiling {
            self.service.admission_ceiling = Some(ceiling);
        }
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            redis,
            cache,
            service,
            auth,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            redis: RedisSettings {
                url: non_blank(redis.url),
            },
            cache: build_cache_settings(cache)?,
            service: build_service_settings(service)?,
            auth: build_auth_settings(auth),
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let max_connections = database
        .max_connections
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);

    Ok(DatabaseSettings {
        url: non_blank(database.url),
        max_connections: non_zero_u32(max_connections.into(), "database.max_connections")?,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let local_capacity = cache.local_capacity.unwrap_or(DEFAULT_CACHE_LOCAL_CAPACITY);
    let ttl_secs = cache.ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS);

    Ok(CacheSettings {
        local_capacity: non_zero_usize(local_capacity, "cache.local_capacity")?,
        ttl_secs: non_zero_u64(ttl_secs, "cache.ttl_seconds")?,
    })
}

fn build_service_settings(service: RawServiceSettings) -> Result<ServiceSettings, LoadError> {
    Ok(ServiceSettings {
        timeout_ms: non_zero_u64(
            service.timeout_ms.unwrap_or(DEFAULT_SERVICE_TIMEOUT_MS),
            "service.timeout_ms",
        )?,
        deletion_queue_capacity: non_zero_usize(
            service
                .deletion_queue_capacity
                .unwrap_or(DEFAULT_DELETION_QUEUE_CAPACITY),
            "service.deletion_queue_capacity",
        )?,
        admission_ceiling: non_zero_usize(
            service.admission_ceiling.unwrap_or(DEFAULT_ADMISSION_CEILING),
            "service.admission_ceiling",
        )?,
        admission_poll_interval_ms: non_zero_u64(
            service
                .admission_poll_interval_ms
                .unwrap_or(DEFAULT_ADMISSION_POLL_INTERVAL_MS),
            "service.admission_poll_interval_ms",
        )?,
        cache_fill_timeout_ms: non_zero_u64(
            service
                .cache_fill_timeout_ms
                .unwrap_or(DEFAULT_CACHE_FILL_TIMEOUT_MS),
            "service.cache_fill_timeout_ms",
        )?,
        cache_read_timeout_ms: non_zero_u64(
            service
                .cache_read_timeout_ms
                .unwrap_or(DEFAULT_CACHE_READ_TIMEOUT_MS),
            "service.cache_read_timeout_ms",
        )?,
    })
}

fn build_auth_settings(auth: RawAuthSettings) -> AuthSettings {
    let clean = |tokens: Vec<String>| -> Vec<String> {
        tokens
            .into_iter()
            .filter_map(|token| non_blank(Some(token)))
            .collect()
    };

    AuthSettings {
        user_tokens: clean(auth.user_tokens),
        admin_tokens: clean(auth.admin_tokens),
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRedisSettings {
    url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    local_capacity: Option<u64>,
    ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServiceSettings {
    timeout_ms: Option<u64>,
    deletion_queue_capacity: Option<u64>,
    admission_ceiling: Option<u64>,
    admission_poll_interval_ms: Option<u64>,
    cache_fill_timeout_ms: Option<u64>,
    cache_read_timeout_ms: Option<u64>,
}

#[derive(Clone, Deserialize, Default)]
#[serde(default)]
struct RawAuthSettings {
    user_tokens: Vec<String>,
    admin_tokens: Vec<String>,
}

impl std::fmt::Debug for RawAuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawAuthSettings").finish_non_exhaustive()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_zero_u64(value: u64, key: &'static str) -> Result<NonZeroU64, LoadError> {
    NonZeroU64::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    let value_usize: usize = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))?;
    NonZeroUsize::new(value_usize)
        .ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests;
