//! Logging setup on top of `tracing-subscriber`

use std::fmt;

use tracing_subscriber::{fmt as layer_fmt, prelude::*, EnvFilter};

/// Filter used when `RUST_LOG` is unset or invalid.
///
/// Every round issues HTTP requests and ledger writes, so client crates are
/// held at `warn` to keep per-round output to the node's own events.
pub const DEFAULT_FILTER: &str =
    "info,hyper=warn,hyper_util=warn,reqwest=warn,tungstenite=warn,tokio_tungstenite=warn,redis=warn";

/// Log output format, selected by `logging.format`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, coloured, with source locations
    #[default]
    Pretty,
    /// One JSON object per event, including the current span
    Json,
    /// Single line per event
    Compact,
}

impl LogFormat {
    /// Case-insensitive; `None` for unknown names
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pretty => "pretty",
            Self::Json => "json",
            Self::Compact => "compact",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown log format: {}", s))
    }
}

/// `RUST_LOG` if set and valid, else [`DEFAULT_FILTER`]
fn build_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber.
///
/// Fails if one is already installed, e.g. when called twice.
///
/// ```ignore
/// observability::init_logging("pricechain", observability::LogFormat::Json)?;
/// tracing::info!(height = 12, "Block sealed");
/// ```
pub fn init_logging(service_name: &str, format: LogFormat) -> anyhow::Result<()> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = build_filter(rust_log.as_deref());

    let layer = match format {
        LogFormat::Pretty => layer_fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Json => layer_fmt::layer()
            .json()
            .with_current_span(true)
            .boxed(),
        LogFormat::Compact => layer_fmt::layer().compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()?;

    tracing::info!(service = service_name, %format, "Logging initialized");
    Ok(())
}
