//! Live block feed over WebSocket
//!
//! Every connected client receives each sealed block's summary as a JSON
//! text frame. Clients only listen; inbound frames other than close are
//! ignored.

use async_trait::async_trait;
use common::BlockSummary;
use futures::{SinkExt, StreamExt};
use observability::FeedMetrics;
use parking_lot::RwLock as SyncRwLock;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, RwLock};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::traits::Server;

pub type ConnectionId = u64;

#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub peer_addr: SocketAddr,
    pub connected_at: Instant,
}

/// WebSocket listener that fans block summaries out to subscribers
#[derive(Clone)]
pub struct FeedServer {
    config: ServerConfig,
    feed: broadcast::Sender<BlockSummary>,
    running: Arc<AtomicBool>,
    bound_addr: Arc<SyncRwLock<Option<SocketAddr>>>,
    next_conn_id: Arc<AtomicU64>,
    connections: Arc<RwLock<HashMap<ConnectionId, ConnectionInfo>>>,
    metrics: FeedMetrics,
}

impl FeedServer {
    /// `feed` is the sending half of the publish sink's channel
    pub fn new(config: ServerConfig, feed: broadcast::Sender<BlockSummary>) -> Self {
        Self {
            config,
            feed,
            running: Arc::new(AtomicBool::new(false)),
            bound_addr: Arc::new(SyncRwLock::new(None)),
            next_conn_id: Arc::new(AtomicU64::new(1)),
            connections: Arc::new(RwLock::new(HashMap::new())),
            metrics: FeedMetrics::new(),
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn active_connections(&self) -> Vec<ConnectionInfo> {
        self.connections.read().await.values().cloned().collect()
    }

    async fn register_connection(&self, id: ConnectionId, peer_addr: SocketAddr) {
        let info = ConnectionInfo {
            id,
            peer_addr,
            connected_at: Instant::now(),
        };
        self.connections.write().await.insert(id, info);
        self.metrics.subscriber_joined();
    }

    async fn unregister_connection(&self, id: ConnectionId) {
        if self.connections.write().await.remove(&id).is_some() {
            self.metrics.subscriber_left();
        }
    }

    async fn handle_connection(
        &self,
        conn_id: ConnectionId,
        stream: TcpStream,
        peer_addr: SocketAddr,
        conn_token: CancellationToken,
    ) -> Result<()> {
        let ws_stream = accept_async(stream).await.map_err(ServerError::WebSocket)?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        // subscribe before registering so a visible connection never misses a block
        let mut summaries = self.feed.subscribe();
        self.register_connection(conn_id, peer_addr).await;
        debug!(conn_id, %peer_addr, "Feed subscriber connected");

        loop {
            tokio::select! {
                _ = conn_token.cancelled() => {
                    let _ = ws_sender.send(Message::Close(None)).await;
                    break;
                }

                received = summaries.recv() => {
                    match received {
                        Ok(summary) => {
                            let text = match serde_json::to_string(&summary) {
                                Ok(text) => text,
                                Err(e) => {
                                    error!(conn_id, %e, "Failed to encode block summary");
                                    continue;
                                }
                            };
                            if let Err(e) = ws_sender.send(Message::Text(text)).await {
                                debug!(conn_id, %e, "Feed subscriber went away");
                                break;
                            }
                            self.metrics.message_sent();
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(conn_id, skipped, "Feed subscriber lagging, summaries dropped");
                            self.metrics.messages_lagged(skipped);
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            let _ = ws_sender.send(Message::Close(None)).await;
                            break;
                        }
                    }
                }

                inbound = ws_receiver.next() => {
                    match inbound {
                        Some(Ok(message)) if message.is_close() => break,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            debug!(conn_id, %e, "Feed subscriber error");
                            break;
                        }
                        None => break,
                    }
                }
            }
        }

        self.unregister_connection(conn_id).await;
        debug!(conn_id, "Feed subscriber disconnected");
        Ok(())
    }
}

#[async_trait]
impl Server for FeedServer {
    fn name(&self) -> &str {
        "websocket"
    }

    fn address(&self) -> Option<SocketAddr> {
        *self.bound_addr.read()
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn run(&self, shutdown_token: CancellationToken) -> Result<()> {
        let addr = self.config.websocket_addr()?;

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::bind(addr.to_string(), e))?;
        let local_addr = listener.local_addr().map_err(ServerError::Io)?;
        *self.bound_addr.write() = Some(local_addr);

        info!(%local_addr, "Block feed listening");
        self.running.store(true, Ordering::SeqCst);

        let mut connection_handles: Vec<tokio::task::JoinHandle<()>> = Vec::new();

        loop {
            tokio::select! {
                _ = shutdown_token.cancelled() => {
                    info!("Block feed received shutdown signal");
                    break;
                }

                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer_addr)) => {
                            let conn_id = self.next_conn_id.fetch_add(1, Ordering::SeqCst);
                            let server = self.clone();
                            let conn_token = shutdown_token.child_token();

                            connection_handles.push(tokio::spawn(async move {
                                if let Err(e) = server
                                    .handle_connection(conn_id, stream, peer_addr, conn_token)
                                    .await
                                {
                                    warn!(conn_id, %e, "Feed handshake failed");
                                }
                            }));
                            connection_handles.retain(|h| !h.is_finished());
                        }
                        Err(e) => {
                            error!(%e, "Failed to accept feed connection");
                        }
                    }
                }
            }
        }

        if !connection_handles.is_empty() {
            let pending = connection_handles.len();
            info!(pending, "Closing feed subscribers");
            let drained = tokio::time::timeout(
                Duration::from_secs(10),
                futures::future::join_all(connection_handles),
            )
            .await;
            if drained.is_err() {
                warn!("Timed out waiting for feed subscribers to close");
            }
        }

        self.running.store(false, Ordering::SeqCst);
        *self.bound_addr.write() = None;
        info!("Block feed shutdown complete");
        Ok(())
    }
}
