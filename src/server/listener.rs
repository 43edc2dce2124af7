//! Chat server listener
//!
//! Handles TCP accept loop and spawns client sessions.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::hub::{Hub, HubHandle};
use crate::server::config::ServerConfig;
use crate::session::ClientSession;

/// Chat server
pub struct ChatServer {
    config: ServerConfig,
    hub: HubHandle,
    hub_task: JoinHandle<()>,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl ChatServer {
    /// Create a new server and start its hub
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: ServerConfig) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        let (hub, hub_task) = Hub::spawn(config.hub.clone());

        Self {
            config,
            hub,
            hub_task,
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
        }
    }

    /// Get a handle to the hub
    pub fn hub(&self) -> &HubHandle {
        &self.hub
    }

    /// Run the server
    ///
    /// This method blocks until the listener fails to bind.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "Chat server listening");

        self.accept_loop(&listener).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve connections from an already bound listener until `shutdown` completes
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(addr = %addr, "Chat server listening");
        }

        tokio::select! {
            _ = shutdown => {
                tracing::info!(
                    users = self.hub.stats().users,
                    "Shutdown signal received"
                );
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        }
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        if self.hub.is_closed() {
            tracing::warn!(peer = %peer_addr, "Connection rejected: hub stopped");
            return;
        }

        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            session_id = session_id,
            peer = %peer_addr,
            "New connection"
        );

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::error!(error = %e, "Failed to configure socket");
                return;
            }
        }

        let session = ClientSession::new(session_id, peer_addr, self.config.clone(), self.hub.clone());

        tokio::spawn(async move {
            let _permit = permit;

            if let Err(e) = session.run(socket).await {
                tracing::debug!(
                    session_id = session_id,
                    error = %e,
                    "Session error"
                );
            }
        });
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Check whether the hub task has stopped
    pub fn is_hub_running(&self) -> bool {
        !self.hub_task.is_finished()
    }
}
