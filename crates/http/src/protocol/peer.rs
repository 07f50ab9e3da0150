//! Addresses of the two ends of an accepted connection.

use std::net::SocketAddr;

/// Both ends of an accepted connection.
///
/// Either address may be missing when the socket could not report it (the peer has already
/// gone, or the stream is an in-memory pipe in tests). Consumers render missing values with
/// placeholders rather than failing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionInfo {
    remote: Option<SocketAddr>,
    local: Option<SocketAddr>,
}

impl ConnectionInfo {
    pub fn new(remote: Option<SocketAddr>, local: Option<SocketAddr>) -> Self {
        Self { remote, local }
    }

    /// Captures both addresses from a tcp stream.
    pub fn of(stream: &tokio::net::TcpStream) -> Self {
        Self { remote: stream.peer_addr().ok(), local: stream.local_addr().ok() }
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local
    }

    /// The port the connection was accepted on.
    pub fn local_port(&self) -> Option<u16> {
        self.local.map(|addr| addr.port())
    }
}
