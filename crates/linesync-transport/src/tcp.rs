//! TCP transport for linesync

use bytes::BytesMut;
use linesync_core::EditorService;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{error, info};

use crate::handler::ConnectionHandler;

/// TCP Server for linesync
pub struct TcpServer {
    service: Arc<EditorService>,
    addr: SocketAddr,
    client_counter: AtomicU64,
    password: Option<String>,
    shutdown_tx: watch::Sender<bool>,
}

impl TcpServer {
    pub fn new(service: Arc<EditorService>, addr: SocketAddr) -> Self {
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            service,
            addr,
            client_counter: AtomicU64::new(0),
            password: None,
            shutdown_tx,
        }
    }

    /// Create a server with authentication required
    pub fn with_password(service: Arc<EditorService>, addr: SocketAddr, password: String) -> Self {
        Self {
            password: Some(password),
            ..Self::new(service, addr)
        }
    }

    /// Start the TCP server
    ///
    /// Returns once [`shutdown`](Self::shutdown) is called. Open connections
    /// close at their next read, releasing their handle on the service.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let listener = TcpListener::bind(self.addr).await?;
        info!(addr = %self.addr, "linesync TCP server listening");

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => {
                        let client_id = format!(
                            "tcp:{}:{}",
                            peer_addr,
                            self.client_counter.fetch_add(1, Ordering::Relaxed)
                        );
                        let service = self.service.clone();
                        let password = self.password.clone();
                        let shutdown = self.shutdown_tx.subscribe();

                        tokio::spawn(async move {
                            if let Err(e) = Self::handle_connection(stream, client_id.clone(), service, password, shutdown).await {
                                error!(client = %client_id, error = %e, "Connection error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                    }
                },
                _ = stopped(&mut shutdown_rx) => {
                    info!("TCP server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Stop accepting connections and close the open ones
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    async fn handle_connection(
        mut stream: TcpStream,
        client_id: String,
        service: Arc<EditorService>,
        password: Option<String>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!(client = %client_id, "Client connected");

        let mut handler = match password {
            Some(pwd) => ConnectionHandler::with_auth(client_id.clone(), service, pwd),
            None => ConnectionHandler::new(client_id.clone(), service),
        };
        let mut buf = vec![0u8; 4096];
        let mut out = BytesMut::with_capacity(4096);

        loop {
            let read = tokio::select! {
                read = stream.read(&mut buf) => read,
                _ = stopped(&mut shutdown) => {
                    info!(client = %client_id, "Closing connection on shutdown");
                    break;
                }
            };
            let n = match read {
                Ok(0) => {
                    info!(client = %client_id, "Client disconnected");
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    error!(client = %client_id, error = %e, "Read error");
                    break;
                }
            };

            // One write per read, replies in command order
            for response in handler.process(&buf[..n]) {
                response.encode_into(&mut out);
            }
            stream.write_all(&out).await?;
            out.clear();

            if handler.is_closed() {
                info!(client = %client_id, "Client quit");
                break;
            }
        }

        Ok(())
    }
}

/// Resolves once shutdown is signalled or the server is gone
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
