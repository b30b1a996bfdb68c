//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "quire";
const ENV_PREFIX: &str = "QUIRE";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_ADMIN_HOST: &str = "127.0.0.1";
const DEFAULT_PUBLIC_PORT: u16 = 3000;
const DEFAULT_ADMIN_PORT: u16 = 3001;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_ENTITY_TTL_SECS: u64 = 3600;
const DEFAULT_L1_MAX_TTL_SECS: u64 = 60;
const DEFAULT_INDEX_TTL_SECS: u64 = 30;
const DEFAULT_INDEX_PAGE_SIZE: u32 = 50;
const DEFAULT_SCAN_COUNT: u32 = 200;
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 500;
const DEFAULT_WARM_LIMIT: u32 = 500;
const REDIS_SCHEMES: [&str; 4] = ["redis", "rediss", "redis+unix", "unix"];

/// Command-line arguments for the Quire binary.
#[derive(Debug, Parser)]
#[command(name = "quire", version, about = "Quire post cache server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "QUIRE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub cache: CacheOverrides,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the public and admin HTTP listeners.
    Serve(Box<ServeArgs>),
    /// Load posts from the database into the cache, then exit.
    Warm(WarmArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

/// Cache flags, accepted before or after the subcommand.
#[derive(Debug, Args, Default, Clone)]
pub struct CacheOverrides {
    /// Redis connection string; blank runs without a backing store.
    #[arg(long = "redis-url", env = "REDIS_URL", value_name = "URL", global = true)]
    pub redis_url: Option<String>,

    /// Override the per-post TTL in the backing store.
    #[arg(long = "cache-entity-ttl-seconds", value_name = "SECONDS", global = true)]
    pub entity_ttl_seconds: Option<u64>,

    /// Override the memory-tier TTL ceiling.
    #[arg(long = "cache-l1-max-ttl-seconds", value_name = "SECONDS", global = true)]
    pub l1_max_ttl_seconds: Option<u64>,

    /// Override the list view TTL.
    #[arg(long = "cache-index-ttl-seconds", value_name = "SECONDS", global = true)]
    pub index_ttl_seconds: Option<u64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

/// Listener and logging flags for `quire serve`.
#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Address the public (read) listener binds to.
    #[arg(long = "host", value_name = "HOST")]
    pub host: Option<String>,

    /// Port of the public listener.
    #[arg(long = "port", value_name = "PORT")]
    pub port: Option<u16>,

    /// Address the admin (write) listener binds to. Keep it private.
    #[arg(long = "admin-host", value_name = "HOST")]
    pub admin_host: Option<String>,

    /// Port of the admin listener.
    #[arg(long = "admin-port", value_name = "PORT")]
    pub admin_port: Option<u16>,

    /// Seconds in-flight requests get after Ctrl-C.
    #[arg(long = "shutdown-grace-seconds", value_name = "SECONDS")]
    pub shutdown_grace_seconds: Option<u64>,

    /// trace, debug, info, warn or error.
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Emit JSON log lines instead of the compact format.
    #[arg(long = "log-json", value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub log_json: Option<bool>,

    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Postgres pool size.
    #[arg(long = "db-pool-size", value_name = "COUNT")]
    pub db_pool_size: Option<u32>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct WarmArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Maximum number of posts to load.
    #[arg(long = "limit", value_name = "COUNT")]
    pub limit: Option<u32>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub public_addr: SocketAddr,
    pub admin_addr: SocketAddr,
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

#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// `None` runs the backing tier in no-op mode.
    pub redis_url: Option<String>,
    /// Zero stores posts without expiry.
    pub entity_ttl: Duration,
    /// Zero disables the memory tier.
    pub l1_max_ttl: Duration,
    pub index_ttl: Duration,
    pub index_page_size: NonZeroU32,
    pub scan_count: NonZeroU32,
    pub max_retries: u32,
    /// Bound on a Redis connect and on each reply.
    pub command_timeout: Duration,
    pub warm_limit: NonZeroU32,
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

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Warm(args)) => raw.apply_warm_overrides(args),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }
    raw.apply_cache_overrides(&cli.cache);

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    cache: RawCacheSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        overlay(&mut self.server.host, &overrides.host);
        overlay(&mut self.server.public_port, &overrides.port);
        overlay(&mut self.server.admin_host, &overrides.admin_host);
        overlay(&mut self.server.admin_port, &overrides.admin_port);
        overlay(
            &mut self.server.graceful_shutdown_seconds,
            &overrides.shutdown_grace_seconds,
        );
        overlay(&mut self.logging.level, &overrides.log_level);
        overlay(&mut self.logging.json, &overrides.log_json);
        overlay(&mut self.database.max_connections, &overrides.db_pool_size);
        overlay(&mut self.database.url, &overrides.database.database_url);
    }

    fn apply_warm_overrides(&mut self, args: &WarmArgs) {
        overlay(&mut self.cache.warm_limit, &args.limit);
        overlay(&mut self.database.url, &args.database.database_url);
    }

    fn apply_cache_overrides(&mut self, overrides: &CacheOverrides) {
        overlay(&mut self.cache.redis_url, &overrides.redis_url);
        overlay(&mut self.cache.entity_ttl_seconds, &overrides.entity_ttl_seconds);
        overlay(&mut self.cache.l1_max_ttl_seconds, &overrides.l1_max_ttl_seconds);
        overlay(&mut self.cache.index_ttl_seconds, &overrides.index_ttl_seconds);
    }
}

/// A flag that was given replaces whatever the file and environment said.
fn overlay<T: Clone>(slot: &mut Option<T>, flag: &Option<T>) {
    if let Some(value) = flag {
        *slot = Some(value.clone());
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            cache,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let database = build_database_settings(database)?;
        let cache = build_cache_settings(cache)?;

        Ok(Self {
            server,
            logging,
            database,
            cache,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let public_addr = listener_addr(
        server.host.as_deref().unwrap_or(DEFAULT_HOST),
        server.public_port.unwrap_or(DEFAULT_PUBLIC_PORT),
        "server.public_port",
    )?;
    let admin_addr = listener_addr(
        server.admin_host.as_deref().unwrap_or(DEFAULT_ADMIN_HOST),
        server.admin_port.unwrap_or(DEFAULT_ADMIN_PORT),
        "server.admin_port",
    )?;
    if public_addr == admin_addr {
        return Err(LoadError::invalid(
            "server.admin_port",
            "admin listener must not share the public address",
        ));
    }

    let grace = positive_seconds(
        server
            .graceful_shutdown_seconds
            .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS),
        "server.graceful_shutdown_seconds",
    )?;

    Ok(ServerSettings {
        public_addr,
        admin_addr,
        graceful_shutdown: grace,
    })
}

fn listener_addr(host: &str, port: u16, key: &'static str) -> Result<SocketAddr, LoadError> {
    if port == 0 {
        return Err(LoadError::invalid(key, "port must be greater than zero"));
    }
    format!("{host}:{port}")
        .parse()
        .map_err(|err| LoadError::invalid(key, format!("invalid address `{host}:{port}`: {err}")))
}

fn positive_seconds(seconds: u64, key: &'static str) -> Result<Duration, LoadError> {
    if seconds == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(seconds))
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
    let url = non_blank(database.url);
    let max_connections = non_zero_u32(
        database.max_connections.unwrap_or(DEFAULT_DB_MAX_CONNECTIONS),
        "database.max_connections",
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let redis_url = non_blank(cache.redis_url);
    if let Some(url) = redis_url.as_deref() {
        validate_redis_url(url).map_err(|reason| LoadError::invalid("cache.redis_url", reason))?;
    }

    let index_ttl = positive_seconds(
        cache.index_ttl_seconds.unwrap_or(DEFAULT_INDEX_TTL_SECS),
        "cache.index_ttl_seconds",
    )?;

    let command_timeout_ms = cache
        .command_timeout_ms
        .unwrap_or(DEFAULT_COMMAND_TIMEOUT_MS);
    if command_timeout_ms == 0 {
        return Err(LoadError::invalid(
            "cache.command_timeout_ms",
            "must be greater than zero",
        ));
    }
    let command_timeout = Duration::from_millis(command_timeout_ms);

    let index_page_size = non_zero_u32(
        cache.index_page_size.unwrap_or(DEFAULT_INDEX_PAGE_SIZE),
        "cache.index_page_size",
    )?;
    let scan_count = non_zero_u32(cache.scan_count.unwrap_or(DEFAULT_SCAN_COUNT), "cache.scan_count")?;
    let warm_limit = non_zero_u32(cache.warm_limit.unwrap_or(DEFAULT_WARM_LIMIT), "cache.warm_limit")?;

    Ok(CacheSettings {
        redis_url,
        entity_ttl: Duration::from_secs(
            cache.entity_ttl_seconds.unwrap_or(DEFAULT_ENTITY_TTL_SECS),
        ),
        l1_max_ttl: Duration::from_secs(
            cache.l1_max_ttl_seconds.unwrap_or(DEFAULT_L1_MAX_TTL_SECS),
        ),
        index_ttl,
        index_page_size,
        scan_count,
        max_retries: cache.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
        command_timeout,
        warm_limit,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    admin_host: Option<String>,
    public_port: Option<u16>,
    admin_port: Option<u16>,
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
struct RawCacheSettings {
    redis_url: Option<String>,
    entity_ttl_seconds: Option<u64>,
    l1_max_ttl_seconds: Option<u64>,
    index_ttl_seconds: Option<u64>,
    index_page_size: Option<u32>,
    scan_count: Option<u32>,
    max_retries: Option<u32>,
    command_timeout_ms: Option<u64>,
    warm_limit: Option<u32>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn validate_redis_url(url: &str) -> Result<(), String> {
    let Some((scheme, rest)) = url.split_once("://") else {
        return Err(format!("`{url}` is not a URL"));
    };
    if !REDIS_SCHEMES.contains(&scheme) {
        return Err(format!(
            "unsupported scheme `{scheme}`, expected one of {}",
            REDIS_SCHEMES.join(", ")
        ));
    }
    if rest.is_empty() {
        return Err("missing host".to_string());
    }
    Ok(())
}

fn non_zero_u32(value: u32, key: &'static str) -> Result<NonZeroU32, LoadError> {
    NonZeroU32::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
