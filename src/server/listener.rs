//! TCP listener for the chat relay.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::chat::Registry;
use crate::config::ServerConfig;
use crate::server::handler::ConnectionHandler;
use crate::server::session::ClientSession;
use crate::Result;

/// Chat relay server that accepts TCP connections.
pub struct ChatListener {
    listener: TcpListener,
    registry: Arc<Registry>,
    /// Placeholder nickname sequence; values are never reused.
    user_seq: AtomicU64,
}

impl ChatListener {
    /// Create a new ChatListener bound to the configured address.
    ///
    /// Failure to bind is fatal and propagates to startup.
    pub async fn bind(config: &ServerConfig) -> Result<Self> {
        let addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&addr).await?;

        info!("chat relay listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            registry: Arc::new(Registry::new()),
            user_seq: AtomicU64::new(1),
        })
    }

    /// Get the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Get the shared nickname registry.
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// Draw the next `User<N>` placeholder nickname.
    ///
    /// The counter increments before use, so the sequence is strictly
    /// increasing across renames and disconnects.
    fn next_placeholder(&self) -> String {
        format!("User{}", self.user_seq.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Run the server, accepting connections until the shutdown token
    /// fires.
    ///
    /// Every accepted transport gets a registered placeholder nickname
    /// and its own lifecycle task; a lifecycle failure never stops the
    /// accept loop. On shutdown the listener stops accepting, disposes
    /// every registered session, and joins all spawned lifecycles.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let mut lifecycles = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                Some(finished) = lifecycles.join_next(), if !lifecycles.is_empty() => {
                    if let Err(e) = finished {
                        error!("lifecycle task failed: {}", e);
                    }
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => {
                        let (session, reader) = ClientSession::new(stream, peer_addr);
                        let session = Arc::new(session);
                        let nickname = self.register_placeholder(Arc::clone(&session)).await;
                        debug!("accepted {} as {}", peer_addr, nickname);

                        let handler = ConnectionHandler::new(
                            Arc::clone(&self.registry),
                            session,
                            reader,
                            shutdown.clone(),
                        );
                        lifecycles.spawn(handler.run());
                    }
                    Err(e) => {
                        error!("failed to accept connection: {}", e);
                    }
                },
            }
        }

        info!(
            "shutting down, disposing {} active session(s)",
            self.registry.count().await
        );
        for (_, session) in self.registry.snapshot_sessions().await {
            session.dispose().await;
        }
        while lifecycles.join_next().await.is_some() {}

        Ok(())
    }

    /// Register a fresh session under the next free placeholder.
    ///
    /// A user may already have renamed themselves to the next `User<N>`;
    /// draw again rather than clobber their entry.
    async fn register_placeholder(&self, session: Arc<ClientSession>) -> String {
        loop {
            let nickname = self.next_placeholder();
            if self
                .registry
                .try_register(&nickname, Arc::clone(&session))
                .await
            {
                return nickname;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(port: u16) -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port,
        }
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let server = ChatListener::bind(&test_config(0)).await.unwrap();

        let addr = server.local_addr().unwrap();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn test_bind_conflict_is_fatal() {
        let first = ChatListener::bind(&test_config(0)).await.unwrap();
        let port = first.local_addr().unwrap().port();

        let second = ChatListener::bind(&test_config(port)).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_placeholder_sequence_is_strictly_increasing() {
        let server = ChatListener::bind(&test_config(0)).await.unwrap();

        // Increment-before-use: the sequence opens at User2.
        assert_eq!(server.next_placeholder(), "User2");
        assert_eq!(server.next_placeholder(), "User3");
        assert_eq!(server.next_placeholder(), "User4");
    }

    #[tokio::test]
    async fn test_run_stops_on_cancellation() {
        let server = ChatListener::bind(&test_config(0)).await.unwrap();
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(server.run(shutdown.clone()));
        shutdown.cancel();

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("run did not return after cancellation")
            .unwrap();
        assert!(result.is_ok());
    }
}
