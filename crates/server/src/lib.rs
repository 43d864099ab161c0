//! Query API and live block feed for PriceChain
//!
//! # Architecture
//!
//! Every listener implements [`Server`]. [`NodeServer`] runs the HTTP query
//! API and the WebSocket feed side by side under one shutdown token; if
//! either exits on its own the other is stopped too.
//!
//! # Modules
//!
//! - [`config`] - Listener addresses
//! - [`traits`] - `Server` and `ServerExt`
//! - [`api`] - Ledger query routes
//! - [`http`] - HTTP listener using Axum
//! - [`websocket`] - Block feed using Tungstenite
//! - [`shutdown`] - Shutdown coordination

// The WebSocket error variant is large
#![allow(clippy::result_large_err)]

use common::BlockSummary;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub mod api;
pub mod config;
pub mod error;
pub mod http;
pub mod shutdown;
pub mod traits;
pub mod websocket;

pub use api::{create_router, ApiState, NodeInfo};
pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use http::HttpServer;
pub use shutdown::ShutdownController;
pub use traits::{Server, ServerExt};
pub use websocket::FeedServer;

type ListenerHandle = tokio::task::JoinHandle<Result<()>>;

/// Query API plus live feed
pub struct NodeServer {
    config: ServerConfig,
    http_server: Option<HttpServer>,
    feed_server: Option<FeedServer>,
}

impl NodeServer {
    /// Listeners whose port is unset in `config` are not started
    pub fn new(
        config: ServerConfig,
        api: ApiState,
        feed: broadcast::Sender<BlockSummary>,
    ) -> Self {
        let http_server = config
            .http_port
            .map(|_| HttpServer::new(config.clone(), create_router(api)));
        let feed_server = config
            .websocket_port
            .map(|_| FeedServer::new(config.clone(), feed));

        Self {
            config,
            http_server,
            feed_server,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn http(&self) -> Option<&HttpServer> {
        self.http_server.as_ref()
    }

    pub fn feed(&self) -> Option<&FeedServer> {
        self.feed_server.as_ref()
    }
}

#[async_trait::async_trait]
impl Server for NodeServer {
    fn name(&self) -> &str {
        "node"
    }

    fn address(&self) -> Option<std::net::SocketAddr> {
        self.http_server
            .as_ref()
            .and_then(|s| s.address())
            .or_else(|| self.feed_server.as_ref().and_then(|s| s.address()))
    }

    fn is_running(&self) -> bool {
        self.http_server.as_ref().is_some_and(|s| s.is_running())
            || self.feed_server.as_ref().is_some_and(|s| s.is_running())
    }

    async fn run(&self, shutdown_token: CancellationToken) -> Result<()> {
        let mut handles: Vec<ListenerHandle> = Vec::new();

        if let Some(http) = self.http_server.clone() {
            let token = shutdown_token.child_token();
            handles.push(tokio::spawn(async move { http.run(token).await }));
        }
        if let Some(feed) = self.feed_server.clone() {
            let token = shutdown_token.child_token();
            handles.push(tokio::spawn(async move { feed.run(token).await }));
        }

        if handles.is_empty() {
            warn!("No listeners configured");
            shutdown_token.cancelled().await;
            return Ok(());
        }

        tokio::select! {
            _ = shutdown_token.cancelled() => {
                info!("Listeners stopping");
            }
            (result, _, _) = futures::future::select_all(handles.iter_mut()) => {
                match result {
                    Ok(Ok(())) => warn!("A listener exited unexpectedly"),
                    Ok(Err(e)) => error!(%e, "A listener failed"),
                    Err(e) => error!(%e, "A listener task panicked"),
                }
                shutdown_token.cancel();
            }
        }

        let drained = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            futures::future::join_all(handles),
        )
        .await;

        match drained {
            Ok(results) => {
                let errors: Vec<String> = results
                    .into_iter()
                    .filter_map(|r| match r {
                        Ok(Ok(())) => None,
                        Ok(Err(e)) => Some(e.to_string()),
                        Err(e) => Some(format!("Task panicked: {}", e)),
                    })
                    .collect();
                if errors.is_empty() {
                    info!("Listeners shut down");
                } else {
                    warn!(?errors, "Listeners reported errors during shutdown");
                }
            }
            Err(_) => warn!("Timed out waiting for listeners to shut down"),
        }
        Ok(())
    }
}
