use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub mod defaults;
pub mod parser;
pub mod substitution;
pub mod validator;

pub use defaults::*;
pub use parser::*;
pub use substitution::*;
pub use validator::*;

/// Root of the node configuration file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OracleConfig {
    pub node: NodeIdentityConfig,
    pub hashing: HashingConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub server: ListenerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl OracleConfig {
    /// Sources with `enabled: true`, in file order
    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NodeIdentityConfig {
    /// Address stamped on every block this node seals
    pub address: String,
    #[serde(default)]
    pub memo: String,
    #[serde(default = "default_quote_currency")]
    pub quote_currency: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HashingConfig {
    pub service_marker: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AggregationConfig {
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
    #[serde(default = "default_source_timeout_ms")]
    pub source_timeout_ms: u64,
    /// Minimum number of successful source reports for a block
    #[serde(default = "default_quorum")]
    pub quorum: usize,
}

impl AggregationConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_millis(self.source_timeout_ms)
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
            source_timeout_ms: default_source_timeout_ms(),
            quorum: default_quorum(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// JSON over HTTP GET
    Http,
    /// Static quote, for the static environment and tests
    Fixed,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Http => write!(f, "http"),
            SourceKind::Fixed => write!(f, "fixed"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    pub name: String,
    pub kind: SourceKind,
    /// URL template; `{quote}` is replaced with the quote currency
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// JSON pointer (RFC 6901) to the price field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_pointer: Option<String>,
    /// JSON pointer to the volume field; volume is 0 when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_pointer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerBackend {
    /// Non-persistent, lost on restart
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub backend: LedgerBackend,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redis: Option<RedisConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisConfig {
    pub host: String,
    #[serde(default = "default_redis_port")]
    pub port: u16,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub db_index: u8,
}

impl RedisConfig {
    /// Connection URL in the form accepted by `redis::Client::open`
    pub fn connection_url(&self) -> String {
        if self.password.is_empty() {
            format!("redis://{}:{}/{}", self.host, self.port, self.db_index)
        } else {
            format!(
                "redis://:{}@{}:{}/{}",
                self.password, self.host, self.port, self.db_index
            )
        }
    }
}

/// Listener settings for the query API and live feed
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_websocket_port")]
    pub websocket_port: u16,
    /// Buffered summaries per live subscriber before it starts lagging
    #[serde(default = "default_feed_capacity")]
    pub feed_capacity: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
            websocket_port: default_websocket_port(),
            feed_capacity: default_feed_capacity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sample_config() {
        let yaml = include_str!("../../../node_config/pricechain.yaml");
        let config: OracleConfig = serde_yaml::from_str(yaml).expect("sample config parses");

        assert_eq!(config.node.quote_currency, "USD");
        assert_eq!(config.aggregation.quorum, 2);
        assert_eq!(config.sources.len(), 4);
        assert_eq!(config.sources[0].kind, SourceKind::Http);
        assert_eq!(config.sources[3].kind, SourceKind::Fixed);
        assert_eq!(config.enabled_sources().count(), 3);
        assert_eq!(config.ledger.backend, LedgerBackend::Memory);
        assert!(config.ledger.redis.is_some());
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let yaml = r#"
node:
  address: node-1
hashing:
  service_marker: abc
"#;
        let config: OracleConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.node.quote_currency, "USD");
        assert_eq!(config.aggregation.interval(), Duration::from_secs(60));
        assert_eq!(config.aggregation.source_timeout(), Duration::from_millis(5000));
        assert_eq!(config.server.http_port, 8080);
        assert_eq!(config.server.websocket_port, 7080);
        assert_eq!(config.logging.format, "pretty");
        assert!(!config.metrics.enabled);
        assert!(config.sources.is_empty());
    }

    #[test]
    fn test_redis_connection_url() {
        let mut redis = RedisConfig {
            host: "localhost".to_string(),
            port: 6379,
            password: String::new(),
            db_index: 2,
        };
        assert_eq!(redis.connection_url(), "redis://localhost:6379/2");

        redis.password = "secret".to_string();
        assert_eq!(redis.connection_url(), "redis://:secret@localhost:6379/2");
    }
}
