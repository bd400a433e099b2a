//! Plain-TCP transport for the device-facing listener.
//!
//! The Concox V5 protocol runs unencrypted over TCP with no framing beyond
//! its own `78 78`/`79 79` markers, so this transport is a thin wrapper
//! around [`tokio::net::TcpListener`]/[`tokio::net::TcpStream`] rather than
//! the QUIC/TLS stack a multiplexed-stream protocol needs.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};

use crate::server_error::ServerError;

/// TCP transport for inbound device connections.
pub struct TcpTransport {
    listener: TcpListener,
}

impl TcpTransport {
    /// Binds a new listener to `address`.
    pub async fn bind(address: SocketAddr) -> Result<Self, ServerError> {
        let listener =
            TcpListener::bind(address).await.map_err(|err| ServerError::Bind {
                address: address.to_string(),
                reason: err.to_string(),
            })?;
        tracing::info!(%address, "device listener bound");
        Ok(Self { listener })
    }

    /// Accepts the next inbound connection.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ServerError> {
        self.listener.accept().await.map_err(ServerError::from)
    }

    /// Local address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener.local_addr().map_err(ServerError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn transport_binds_to_ephemeral_port() {
        let transport = TcpTransport::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = transport.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn transport_accepts_a_connection() {
        let transport = TcpTransport::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = transport.local_addr().unwrap();

        let client = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });

        let (_, remote) = transport.accept().await.unwrap();
        assert_eq!(remote.ip(), addr.ip());
        client.await.unwrap();
    }
}
