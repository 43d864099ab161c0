pub fn default_enabled() -> bool {
    true
}

pub fn default_quote_currency() -> String {
    "USD".to_string()
}

pub fn default_interval_seconds() -> u64 {
    60
}

pub fn default_source_timeout_ms() -> u64 {
    5_000
}

pub fn default_quorum() -> usize {
    2
}

pub fn default_redis_port() -> u16 {
    6379
}

pub fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub fn default_http_port() -> u16 {
    8080
}

pub fn default_websocket_port() -> u16 {
    7080
}

pub fn default_feed_capacity() -> usize {
    256
}

pub fn default_log_format() -> String {
    "pretty".to_string()
}

pub fn default_metrics_port() -> u16 {
    9090
}

/// Placeholder written by `init`; resolved from the environment at load time
pub fn default_service_marker_placeholder() -> String {
    "${PRICECHAIN_SERVICE_MARKER}".to_string()
}
