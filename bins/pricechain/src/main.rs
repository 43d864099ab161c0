//! PriceChain node and tooling binary
//!
//! `start` runs the oracle node: the round scheduler plus the query API and
//! live feed. The other commands inspect configuration, read the ledger and
//! manage secret shares.

use aggregator::{
    build_sources, BroadcastSink, ChainSealer, MapStage, ReduceStage, RoundProcessor,
    RoundScheduler,
};
use anyhow::{Context, Result};
use cli::{Cli, Commands, SharesCommand};
use common::{now_millis, ServiceMarker};
use config::{
    generate_default_config, load_config, save_config, validate_config, LedgerBackend,
    OracleConfig,
};
use observability::{init_logging, init_metrics, LogFormat};
use server::{ApiState, NodeInfo, NodeServer, Server, ServerConfig, ShutdownController};
use std::path::Path;
use std::sync::Arc;
use storage::keys::NODE_STARTED_SLOT;
use storage::{open_backend, Ledger};
use tracing::{debug, error, info, warn};

const SERVICE_NAME: &str = "pricechain";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    match cli.command {
        Commands::Start { config } => start_node(&config).await,
        Commands::Validate { config } => {
            init_logging(SERVICE_NAME, LogFormat::Compact)?;
            validate_command(&config)
        }
        Commands::Init { output } => {
            init_logging(SERVICE_NAME, LogFormat::Compact)?;
            init_command(&output)
        }
        Commands::Block {
            config,
            hash,
            height,
            timestamp,
            latest,
            verify,
        } => {
            init_logging(SERVICE_NAME, LogFormat::Compact)?;
            let lookup = BlockLookup::from_args(hash, height, timestamp, latest, verify)?;
            block_command(&config, lookup).await
        }
        Commands::Shares { action } => shares_command(action),
    }
}

fn load_checked_config(path: &Path) -> Result<OracleConfig> {
    let config = load_config(path)?;
    check_config(&config, path)?;
    Ok(config)
}

/// Log warnings and refuse to continue on errors
fn check_config(config: &OracleConfig, path: &Path) -> Result<()> {
    let report = validate_config(config);

    for warning in &report.warnings {
        warn!(field = %warning.field, message = %warning.message, "Configuration warning");
    }
    if !report.is_valid() {
        for err in &report.errors {
            error!("{}", err);
        }
        anyhow::bail!(
            "{} configuration error(s) in {}",
            report.errors.len(),
            path.display()
        );
    }
    Ok(())
}

async fn start_node(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let format = LogFormat::parse(&config.logging.format).unwrap_or_default();
    init_logging(SERVICE_NAME, format)?;

    info!(path = %config_path.display(), "PriceChain starting");
    check_config(&config, config_path)?;

    if config.metrics.enabled {
        init_metrics(config.metrics.port)?;
    }

    let marker = ServiceMarker::new(config.hashing.service_marker.clone())
        .context("hashing.service_marker")?;

    let backend = open_backend(&config.ledger)
        .await
        .context("Failed to open the ledger backend")?;
    let ledger = Ledger::new(backend);
    ledger
        .put_raw(NODE_STARTED_SLOT, now_millis().to_string().as_bytes())
        .await?;

    match ledger.head().await? {
        Some(head) => info!(height = head.height, hash = %head.hash, "Resuming chain"),
        None => info!("Ledger is empty, next block is genesis"),
    }

    let sources = build_sources(&config.sources)?;
    info!(
        sources = sources.len(),
        quorum = config.aggregation.quorum,
        interval_secs = config.aggregation.interval_seconds,
        "Aggregation configured"
    );

    let map = MapStage::new(sources, config.aggregation.source_timeout(), marker.clone());
    let reduce = ReduceStage::new(config.aggregation.quorum).with_memo(config.node.memo.clone());
    let sealer = Arc::new(ChainSealer::new(
        ledger.clone(),
        marker,
        config.node.address.clone(),
    ));
    let sink = Arc::new(BroadcastSink::new(config.server.feed_capacity));
    let processor = Arc::new(RoundProcessor::new(
        config.node.quote_currency.clone(),
        map,
        reduce,
        sealer,
        sink.clone(),
    ));
    let scheduler = RoundScheduler::new(processor, config.aggregation.interval());

    let node_info = NodeInfo {
        address: config.node.address.clone(),
        quote: config.node.quote_currency.clone(),
    };
    let server = NodeServer::new(
        ServerConfig::from_listener(&config.server),
        ApiState::new(ledger, node_info),
        sink.sender(),
    );

    let shutdown = ShutdownController::with_signals();
    let scheduler_token = shutdown.child_token();
    let rounds = tokio::spawn(async move { scheduler.run(scheduler_token).await });

    let served = server.run(shutdown.child_token()).await;
    shutdown.shutdown();

    let rounds = rounds.await.context("Round scheduler task failed")?;
    served?;

    info!(rounds, "PriceChain stopped");
    Ok(())
}

fn validate_command(config_path: &Path) -> Result<()> {
    info!(path = %config_path.display(), "Validating configuration");

    let config = load_config(config_path)?;
    let report = validate_config(&config);

    println!("\n=== Configuration Validation Report ===\n");

    if !report.defaults_applied.is_empty() {
        println!("Defaults Applied ({}):", report.defaults_applied.len());
        for default in &report.defaults_applied {
            println!("  [info] {} = {}", default.field, default.value);
        }
        println!();
    }

    if !report.warnings.is_empty() {
        println!("Warnings ({}):", report.warnings.len());
        for warning in &report.warnings {
            println!("  [warn] [{}] {}", warning.field, warning.message);
        }
        println!();
    }

    if !report.errors.is_empty() {
        println!("Errors ({}):", report.errors.len());
        for err in &report.errors {
            println!("  [error] {}", err);
        }
        println!();
        anyhow::bail!("Configuration validation failed");
    }

    println!("[ok] Configuration is valid!");
    println!();
    println!("Node: {}", config.node.address);
    println!("Quote: {}", config.node.quote_currency);
    println!(
        "Sources: {} enabled of {}",
        config.enabled_sources().count(),
        config.sources.len()
    );
    println!(
        "Quorum: {} every {}s",
        config.aggregation.quorum, config.aggregation.interval_seconds
    );
    println!("Ledger: {:?}", config.ledger.backend);

    Ok(())
}

fn init_command(output_path: &Path) -> Result<()> {
    info!(path = %output_path.display(), "Initializing new configuration file");

    let config = generate_default_config();

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    save_config(&config, output_path)?;

    println!("[ok] Configuration file created: {}", output_path.display());
    println!();
    println!("Next steps:");
    println!("  1. Set PRICECHAIN_SERVICE_MARKER and edit node.address");
    println!(
        "  2. Run 'pricechain validate --config {}' to check configuration",
        output_path.display()
    );
    println!(
        "  3. Run 'pricechain start --config {}' to start the node",
        output_path.display()
    );

    Ok(())
}

#[derive(Debug, PartialEq)]
enum BlockLookup {
    Hash(String),
    Height(u64),
    Timestamp(u64),
    Latest(usize),
    Verify(usize),
}

impl BlockLookup {
    fn from_args(
        hash: Option<String>,
        height: Option<u64>,
        timestamp: Option<u64>,
        latest: Option<usize>,
        verify: Option<usize>,
    ) -> Result<Self> {
        hash.map(Self::Hash)
            .or(height.map(Self::Height))
            .or(timestamp.map(Self::Timestamp))
            .or(latest.map(Self::Latest))
            .or(verify.map(Self::Verify))
            .context("one of --hash, --height, --timestamp, --latest or --verify is required")
    }
}

async fn block_command(config_path: &Path, lookup: BlockLookup) -> Result<()> {
    let config = load_checked_config(config_path)?;
    if config.ledger.backend == LedgerBackend::Memory {
        warn!("Memory ledger holds no blocks outside a running node");
    }

    let ledger = Ledger::new(open_backend(&config.ledger).await?);
    debug!(backend = ledger.backend_name(), ?lookup, "Querying ledger");

    let output = match lookup {
        BlockLookup::Hash(hash) => serde_json::to_string_pretty(&ledger.get_by_hash(&hash).await?)?,
        BlockLookup::Height(height) => {
            serde_json::to_string_pretty(&ledger.get_by_height(height).await?)?
        }
        BlockLookup::Timestamp(timestamp) => {
            serde_json::to_string_pretty(&ledger.get_by_timestamp(timestamp).await?)?
        }
        BlockLookup::Latest(n) => serde_json::to_string_pretty(&ledger.get_latest(n).await?)?,
        BlockLookup::Verify(depth) => {
            let marker = ServiceMarker::new(config.hashing.service_marker.clone())?;
            let checked = ledger.verify_chain(&marker, depth).await?;
            format!("[ok] {} block(s) verified", checked)
        }
    };
    println!("{}", output);
    Ok(())
}

fn shares_command(action: SharesCommand) -> Result<()> {
    match action {
        SharesCommand::Split {
            secret,
            parts,
            threshold,
        } => {
            let secret = hex::decode(secret.trim()).context("secret must be hex")?;
            for share in shamir::split(&secret, parts, threshold)? {
                println!("{}", hex::encode(share));
            }
        }
        SharesCommand::Combine { shares } => {
            let decoded = shares
                .iter()
                .map(|s| hex::decode(s.trim()).with_context(|| format!("share {} is not hex", s)))
                .collect::<Result<Vec<_>>>()?;
            println!("{}", hex::encode(shamir::combine(&decoded)?));
        }
    }
    Ok(())
}
