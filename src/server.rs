//! TCP acceptor for lookup sessions.
//!
//! Binds the listening socket, then hands every accepted connection to its
//! own task. Tasks share nothing but the read-only directory.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::directory::Directory;
use crate::error::{ServerError, SessionError};
use crate::session::handle_connection;

/// Server instance
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    directory: Arc<dyn Directory>,
    connection_limit: Arc<Semaphore>,
    session_timeout: Option<Duration>,
}

impl Server {
    /// Bind the listening socket. Must be called inside a tokio runtime.
    pub fn bind(config: &Config, directory: Arc<dyn Directory>) -> Result<Self, ServerError> {
        let addr = config.listen_addr();
        let listener = create_listener(addr, config.backlog)
            .and_then(TcpListener::from_std)
            .map_err(|e| ServerError::Bind(addr, e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::Bind(addr, e))?;

        Ok(Server {
            listener,
            local_addr,
            directory,
            connection_limit: Arc::new(Semaphore::new(config.max_connections.max(1))),
            session_timeout: config.session_timeout,
        })
    }

    /// Address actually bound (useful when the configured port is 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections until accept fails.
    pub async fn run(&self) -> Result<(), ServerError> {
        info!(address = %self.local_addr, "Server listening");

        loop {
            // Wait for a connection slot. The semaphore is never closed.
            let permit = match self.connection_limit.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return Ok(()),
            };

            let (stream, peer) = self.listener.accept().await.map_err(|e| {
                error!(error = %e, "Failed to accept connection");
                ServerError::Accept(e)
            })?;
            debug!(peer = %peer, "New connection");

            let directory = Arc::clone(&self.directory);
            let session_timeout = self.session_timeout;

            tokio::spawn(async move {
                let session = handle_connection(stream, directory);
                let result = match session_timeout {
                    Some(limit) => tokio::time::timeout(limit, session)
                        .await
                        .unwrap_or(Err(SessionError::Timeout)),
                    None => session.await,
                };

                match result {
                    Ok(()) => debug!(peer = %peer, "Session finished"),
                    Err(e) => debug!(peer = %peer, error = %e, "Session ended with error"),
                }
                drop(permit);
            });
        }
    }
}

/// Create a listening socket with `SO_REUSEADDR` and the given backlog.
fn create_listener(addr: SocketAddr, backlog: i32) -> std::io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;

    Ok(socket.into())
}
