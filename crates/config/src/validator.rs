use crate::*;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Node address is required")]
    MissingNodeAddress,

    #[error("Invalid quote currency '{0}'. Must be 3-5 uppercase letters (e.g., USD)")]
    InvalidQuoteCurrency(String),

    #[error("Service marker is required")]
    MissingServiceMarker,

    #[error("At least one source must be enabled")]
    NoEnabledSources,

    #[error("Source '{name}': {message}")]
    InvalidSource { name: String, message: String },

    #[error("Duplicate source name '{0}'")]
    DuplicateSource(String),

    #[error("Quorum {quorum} must be between 1 and the number of enabled sources ({sources})")]
    InvalidQuorum { quorum: usize, sources: usize },

    #[error("{field} must be a positive integer")]
    InvalidPositiveInteger { field: String },

    #[error("Ledger: {message}")]
    InvalidLedger { message: String },

    #[error("Server: {message}")]
    InvalidServer { message: String },

    #[error("Invalid log format '{0}'. Must be one of: pretty, json, compact")]
    InvalidLogFormat(String),

    #[error("Environment variable '{var}' is missing or invalid: {message}")]
    InvalidEnvVar { var: String, message: String },
}

#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct DefaultApplied {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    pub defaults_applied: Vec<DefaultApplied>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            defaults_applied: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, field: &str, message: &str) {
        self.warnings.push(ValidationWarning {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    pub fn add_default(&mut self, field: &str, value: &str) {
        self.defaults_applied.push(DefaultApplied {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

pub fn validate_config(config: &OracleConfig) -> ValidationReport {
    let mut report = ValidationReport::new();

    validate_node(&config.node, &mut report);
    validate_hashing(&config.hashing, &mut report);
    validate_sources(&config.sources, &mut report);
    validate_aggregation(config, &mut report);
    validate_ledger(&config.ledger, &mut report);
    validate_listeners(config, &mut report);

    if !is_known_log_format(&config.logging.format) {
        report.add_error(ValidationError::InvalidLogFormat(config.logging.format.clone()));
    }

    report
}

fn is_known_log_format(format: &str) -> bool {
    matches!(
        format.to_lowercase().as_str(),
        "pretty" | "json" | "compact"
    )
}

fn validate_node(node: &NodeIdentityConfig, report: &mut ValidationReport) {
    if node.address.trim().is_empty() {
        report.add_error(ValidationError::MissingNodeAddress);
    }

    let quote = &node.quote_currency;
    if !(3..=5).contains(&quote.len()) || !quote.chars().all(|c| c.is_ascii_uppercase()) {
        report.add_error(ValidationError::InvalidQuoteCurrency(
            node.quote_currency.clone(),
        ));
    }

    if node.memo.is_empty() {
        report.add_default("node.memo", "\"\"");
    }
}

fn validate_hashing(hashing: &HashingConfig, report: &mut ValidationReport) {
    let marker = hashing.service_marker.trim();
    if marker.is_empty() {
        report.add_error(ValidationError::MissingServiceMarker);
        return;
    }

    if has_unresolved_env_vars(marker) {
        report.add_error(ValidationError::InvalidEnvVar {
            var: marker.to_string(),
            message: "hashing.service_marker references an unset variable".to_string(),
        });
    } else if marker.len() < 16 {
        report.add_warning(
            "hashing.service_marker",
            "Service marker is shorter than 16 characters",
        );
    }
}

fn validate_sources(sources: &[SourceConfig], report: &mut ValidationReport) {
    let mut seen = HashSet::new();
    for source in sources {
        if !seen.insert(source.name.as_str()) {
            report.add_error(ValidationError::DuplicateSource(source.name.clone()));
        }
        if source.enabled {
            validate_source(source, report);
        }
    }

    if !sources.iter().any(|s| s.enabled) {
        report.add_error(ValidationError::NoEnabledSources);
    }
}

fn validate_source(source: &SourceConfig, report: &mut ValidationReport) {
    let invalid = |message: &str| ValidationError::InvalidSource {
        name: if source.name.is_empty() {
            "unknown".to_string()
        } else {
            source.name.clone()
        },
        message: message.to_string(),
    };

    if source.name.trim().is_empty() {
        report.add_error(invalid("Name is required"));
    }

    match source.kind {
        SourceKind::Http => {
            match source.url.as_deref() {
                None | Some("") => report.add_error(invalid("url is required for http sources")),
                Some(template) => {
                    let probe = template.replace("{quote}", "USD");
                    if let Err(e) = url::Url::parse(&probe) {
                        report.add_error(invalid(&format!("invalid url '{}': {}", template, e)));
                    }
                }
            }

            match source.price_pointer.as_deref() {
                Some(p) if p.starts_with('/') => {}
                _ => report.add_error(invalid(
                    "price_pointer must be a JSON pointer starting with '/'",
                )),
            }

            if let Some(p) = source.volume_pointer.as_deref() {
                if !p.starts_with('/') {
                    report.add_error(invalid(
                        "volume_pointer must be a JSON pointer starting with '/'",
                    ));
                }
            } else {
                report.add_default(&format!("sources.{}.volume", source.name), "0");
            }
        }
        SourceKind::Fixed => match source.price {
            Some(price) if price.is_finite() && price > 0.0 => {}
            _ => report.add_error(invalid("fixed sources need a positive price")),
        },
    }
}

fn validate_aggregation(config: &OracleConfig, report: &mut ValidationReport) {
    let aggregation = &config.aggregation;
    let enabled = config.enabled_sources().count();

    if aggregation.interval_seconds == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "aggregation.interval_seconds".to_string(),
        });
    }

    if aggregation.source_timeout_ms == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "aggregation.source_timeout_ms".to_string(),
        });
    }

    if enabled > 0 && (aggregation.quorum == 0 || aggregation.quorum > enabled) {
        report.add_error(ValidationError::InvalidQuorum {
            quorum: aggregation.quorum,
            sources: enabled,
        });
    }

    if aggregation.quorum == 1 {
        report.add_warning(
            "aggregation.quorum",
            "A quorum of 1 lets a single source set the price",
        );
    }

    if aggregation.source_timeout_ms >= aggregation.interval_seconds.saturating_mul(1000)
        && aggregation.interval_seconds > 0
    {
        report.add_warning(
            "aggregation.source_timeout_ms",
            "Source timeout is not shorter than the round interval; rounds will run back to back",
        );
    }
}

fn validate_ledger(ledger: &LedgerConfig, report: &mut ValidationReport) {
    match ledger.backend {
        LedgerBackend::Memory => {
            report.add_warning(
                "ledger.backend",
                "Memory ledger is not persistent; blocks are lost on restart",
            );
        }
        LedgerBackend::Redis => match &ledger.redis {
            None => report.add_error(ValidationError::InvalidLedger {
                message: "redis settings are required for the redis backend".to_string(),
            }),
            Some(redis) if redis.host.trim().is_empty() => {
                report.add_error(ValidationError::InvalidLedger {
                    message: "redis.host is required".to_string(),
                })
            }
            Some(_) => {}
        },
    }
}

fn validate_listeners(config: &OracleConfig, report: &mut ValidationReport) {
    let server = &config.server;
    if server.http_port == server.websocket_port {
        report.add_error(ValidationError::InvalidServer {
            message: format!(
                "http_port and websocket_port must differ (both {})",
                server.http_port
            ),
        });
    }

    if server.feed_capacity == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "server.feed_capacity".to_string(),
        });
    }

    if config.metrics.enabled
        && (config.metrics.port == server.http_port || config.metrics.port == server.websocket_port)
    {
        report.add_error(ValidationError::InvalidServer {
            message: format!("metrics port {} collides with a listener", config.metrics.port),
        });
    }
}
