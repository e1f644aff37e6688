//! Configuration management for the order service.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Only the database URL is required; every other value falls back to a
//! default when unset, but a value that is present and cannot be parsed is an
//! error rather than silently ignored.

use orderflow_postgres::PoolSettings;
use orderflow_runtime::{PipelineConfig, RetryPolicy};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_BROKERS: &str = "localhost:9092";

/// Errors raised while reading the environment.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("{0} must be set")]
    Missing(&'static str),

    /// A variable is set to a value that cannot be used.
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        /// Variable name.
        key: &'static str,
        /// Raw value.
        value: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// `PostgreSQL` configuration
    pub database: DatabaseConfig,
    /// Kafka-compatible broker configuration
    pub kafka: KafkaConfig,
    /// Where poison messages go
    pub dead_letter: DeadLetterMode,
    /// Backoff for fetch and persist failures
    pub pipeline: PipelineConfig,
    /// Orders loaded into the cache at startup (0 disables warm-up)
    pub cache_warmup_limit: usize,
    /// HTTP server configuration
    pub server: ServerConfig,
}

/// `PostgreSQL` configuration
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Acquire and startup ping timeout
    pub connect_timeout: Duration,
    /// Apply embedded migrations at startup
    pub run_migrations: bool,
}

impl DatabaseConfig {
    /// Pool settings for [`orderflow_postgres::PostgresOrderStore::connect`].
    #[must_use]
    pub const fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.max_connections,
            connect_timeout: self.connect_timeout,
        }
    }
}

// The URL usually embeds credentials.
impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .field("connect_timeout", &self.connect_timeout)
            .field("run_migrations", &self.run_migrations)
            .finish()
    }
}

/// Kafka-compatible broker configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KafkaConfig {
    /// Bootstrap brokers, never empty
    pub brokers: Vec<String>,
    /// Source topic
    pub topic: String,
    /// Consumer group id
    pub group_id: String,
    /// Start position for a new group
    pub auto_offset_reset: String,
}

/// Destination for messages that fail decoding or validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeadLetterMode {
    /// The `poison_messages` table.
    Postgres,
    /// A dead-letter topic on the same brokers.
    Topic(String),
    /// Log and drop.
    Discard,
}

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Directory served for unmatched paths
    pub static_dir: PathBuf,
    /// How long to wait for the pipeline after a shutdown signal
    pub shutdown_timeout: Duration,
}

impl ServerConfig {
    /// Socket address to bind.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `HOST` is not an IP address.
    pub fn bind_address(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                key: "HOST",
                value: self.host.clone(),
                reason: e.to_string(),
            })
    }
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `DATABASE_URL` is missing or any value
    /// fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its
    /// value. Empty values count as unset.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let url = vars
            .get("DATABASE_URL")
            .or_else(|| vars.get("DB_DSN"))
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let database = DatabaseConfig {
            url,
            max_connections: vars.parse("DATABASE_MAX_CONNECTIONS", 10)?,
            connect_timeout: Duration::from_secs(vars.parse("DATABASE_CONNECT_TIMEOUT", 3)?),
            run_migrations: vars.flag("DATABASE_RUN_MIGRATIONS", true)?,
        };
        if database.max_connections == 0 {
            return Err(invalid("DATABASE_MAX_CONNECTIONS", "0", "must be at least 1"));
        }

        let topic = vars.get("KAFKA_TOPIC").unwrap_or_else(|| "orders".to_string());
        let kafka = KafkaConfig {
            brokers: parse_brokers(vars.get("KAFKA_BROKERS").as_deref()),
            group_id: vars
                .get("KAFKA_GROUP")
                .unwrap_or_else(|| "orders-consumer".to_string()),
            auto_offset_reset: vars
                .get("KAFKA_AUTO_OFFSET_RESET")
                .unwrap_or_else(|| "earliest".to_string()),
            topic,
        };

        let dead_letter = match vars.get("DEAD_LETTER").as_deref() {
            None | Some("postgres") => DeadLetterMode::Postgres,
            Some("none") => DeadLetterMode::Discard,
            Some("topic") => DeadLetterMode::Topic(
                vars.get("DEAD_LETTER_TOPIC")
                    .unwrap_or_else(|| format!("{}.dlq", kafka.topic)),
            ),
            Some(other) => {
                return Err(invalid("DEAD_LETTER", other, "expected postgres, topic or none"));
            },
        };

        let pipeline = PipelineConfig {
            fetch_retry: vars.retry_policy(vars.parse("FETCH_RETRY_DELAY_MS", 300)?)?,
            persist_retry: vars.retry_policy(vars.parse("PERSIST_RETRY_DELAY_MS", 500)?)?,
        };

        let server = ServerConfig {
            host: vars.get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: vars.parse("PORT", 8081)?,
            static_dir: vars.get("STATIC_DIR").map_or_else(|| PathBuf::from("web"), PathBuf::from),
            shutdown_timeout: Duration::from_secs(vars.parse("SHUTDOWN_TIMEOUT", 10)?),
        };
        server.bind_address()?;

        Ok(Self {
            database,
            kafka,
            dead_letter,
            pipeline,
            cache_warmup_limit: vars.parse("CACHE_WARMUP_LIMIT", 1000)?,
            server,
        })
    }
}

/// Split a comma-separated broker list, dropping blanks. Falls back to
/// `localhost:9092` when nothing usable remains.
#[must_use]
pub fn parse_brokers(raw: Option<&str>) -> Vec<String> {
    let brokers: Vec<String> = raw
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(ToString::to_string)
        .collect();

    if brokers.is_empty() {
        vec![DEFAULT_BROKERS.to_string()]
    } else {
        brokers
    }
}

fn invalid(key: &'static str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.into(),
    }
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|e: T::Err| invalid(key, &raw, e.to_string())),
        }
    }

    fn flag(&self, key: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.get(key).map(|v| v.to_ascii_lowercase()).as_deref() {
            None => Ok(default),
            Some("true" | "1" | "yes" | "on") => Ok(true),
            Some("false" | "0" | "no" | "off") => Ok(false),
            Some(other) => Err(invalid(key, other, "expected a boolean")),
        }
    }

    /// Shared backoff shape applied to one initial delay.
    fn retry_policy(&self, initial_ms: u64) -> Result<RetryPolicy, ConfigError> {
        let initial = Duration::from_millis(initial_ms);
        let max = self
            .parse::<u64>("RETRY_MAX_DELAY_MS", initial_ms)
            .map(Duration::from_millis)?;
        let multiplier: f64 = self.parse("RETRY_MULTIPLIER", 1.0)?;

        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(invalid(
                "RETRY_MULTIPLIER",
                &multiplier.to_string(),
                "must be a finite number >= 1.0",
            ));
        }

        Ok(RetryPolicy::builder()
            .initial_delay(initial)
            .max_delay(max.max(initial))
            .multiplier(multiplier)
            .jitter(self.flag("RETRY_JITTER", false)?)
            .build())
    }
}
