//! Listener configuration
//!
//! Both listeners are optional, so tools and tests can run only the
//! protocol they need.

use std::net::SocketAddr;

use ::config::ListenerConfig;

use crate::error::{Result, ServerError};

/// Bind settings for the query API and the live feed
///
/// ```
/// use server::config::ServerConfig;
///
/// let both = ServerConfig::new("0.0.0.0", 8080, 7080);
/// let api = ServerConfig::http_only("127.0.0.1", 8080);
/// assert!(both.has_servers() && api.websocket_port.is_none());
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    pub http_port: Option<u16>,
    pub websocket_port: Option<u16>,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, http: u16, ws: u16) -> Self {
        Self {
            host: host.into(),
            http_port: Some(http),
            websocket_port: Some(ws),
        }
    }

    pub fn http_only(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            http_port: Some(port),
            websocket_port: None,
        }
    }

    pub fn websocket_only(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            http_port: None,
            websocket_port: Some(port),
        }
    }

    /// Port 0 in the node configuration disables that listener
    pub fn from_listener(listener: &ListenerConfig) -> Self {
        let enabled = |port: u16| (port != 0).then_some(port);
        Self {
            host: listener.host.clone(),
            http_port: enabled(listener.http_port),
            websocket_port: enabled(listener.websocket_port),
        }
    }

    pub fn http_addr(&self) -> Result<SocketAddr> {
        let port = self
            .http_port
            .ok_or_else(|| ServerError::ConfigError("HTTP port not configured".into()))?;
        self.parse_addr(port)
    }

    pub fn websocket_addr(&self) -> Result<SocketAddr> {
        let port = self
            .websocket_port
            .ok_or_else(|| ServerError::ConfigError("WebSocket port not configured".into()))?;
        self.parse_addr(port)
    }

    pub fn has_servers(&self) -> bool {
        self.http_port.is_some() || self.websocket_port.is_some()
    }

    fn parse_addr(&self, port: u16) -> Result<SocketAddr> {
        format!("{}:{}", self.host, port)
            .parse()
            .map_err(|_| ServerError::InvalidAddress(format!("{}:{}", self.host, port)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_from_listener() {
        let listener = ListenerConfig {
            host: "127.0.0.1".to_string(),
            http_port: 8080,
            websocket_port: 0,
            feed_capacity: 16,
        };
        let config = ServerConfig::from_listener(&listener);
        assert_eq!(config.http_port, Some(8080));
        assert_eq!(config.websocket_port, None);
        assert!(config.has_servers());
        assert_eq!(config.http_addr().unwrap().port(), 8080);
        assert_matches!(config.websocket_addr(), Err(ServerError::ConfigError(_)));
    }

    #[test]
    fn test_invalid_host() {
        let config = ServerConfig::http_only("not a host", 8080);
        assert_matches!(config.http_addr(), Err(ServerError::InvalidAddress(_)));
    }
}
