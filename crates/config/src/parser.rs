use crate::*;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument};

#[instrument(skip(path))]
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<OracleConfig> {
    let path = path.as_ref();
    info!("Loading configuration from: {:?}", path);

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    debug!("Config file content length: {} bytes", content.len());
    parse_config(&content)
}

/// Parse YAML text after environment variable substitution
pub fn parse_config(content: &str) -> Result<OracleConfig> {
    let substituted = substitution::substitute_env_vars(content)?;
    debug!("Environment variable substitution completed");

    let config: OracleConfig = serde_yaml::from_str(&substituted)
        .with_context(|| "Failed to parse YAML configuration")?;

    info!(
        address = %config.node.address,
        sources = config.sources.len(),
        "Configuration loaded successfully"
    );
    Ok(config)
}

#[instrument]
pub fn generate_default_config() -> OracleConfig {
    use defaults::*;

    let http_source = |name: &str, url: &str, price: &str, volume: Option<&str>| SourceConfig {
        name: name.to_string(),
        kind: SourceKind::Http,
        url: Some(url.to_string()),
        price_pointer: Some(price.to_string()),
        volume_pointer: volume.map(str::to_string),
        price: None,
        volume: None,
        enabled: true,
    };

    OracleConfig {
        node: NodeIdentityConfig {
            address: "pricechain-node-1".to_string(),
            memo: String::new(),
            quote_currency: default_quote_currency(),
        },
        hashing: HashingConfig {
            service_marker: default_service_marker_placeholder(),
        },
        aggregation: AggregationConfig::default(),
        sources: vec![
            http_source(
                "coinbase",
                "https://api.coinbase.com/v2/prices/BTC-{quote}/spot",
                "/data/amount",
                None,
            ),
            http_source(
                "bitstamp",
                "https://www.bitstamp.net/api/v2/ticker/btc{quote}/",
                "/last",
                Some("/volume"),
            ),
            http_source(
                "kraken",
                "https://api.kraken.com/0/public/Ticker?pair=XBT{quote}",
                "/result/XXBTZUSD/c/0",
                Some("/result/XXBTZUSD/v/1"),
            ),
        ],
        ledger: LedgerConfig::default(),
        server: ListenerConfig::default(),
        logging: LoggingConfig::default(),
        metrics: MetricsConfig::default(),
    }
}

#[instrument]
pub fn save_config<P: AsRef<Path> + std::fmt::Debug>(config: &OracleConfig, path: P) -> Result<()> {
    let path = path.as_ref();
    info!("Saving configuration to: {:?}", path);

    let yaml = serde_yaml::to_string(config)
        .with_context(|| "Failed to serialize configuration to YAML")?;

    fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    info!("Configuration saved successfully");
    Ok(())
}
