//! Behaviors that speak raw bytes on the socket.
//!
//! A [`RawProtocol`] is built per accepted connection and reacts to two events: the
//! connection being made and a chunk of bytes arriving. The [`drive`] loop feeds it those
//! events until the protocol asks to close, the peer goes away, or something else closes the
//! [`RawConnection`] (a finished byte drip, for example).

pub mod behaviors;
pub mod request;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use hamms_http::protocol::ConnectionInfo;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::debug;

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// How long a closed connection keeps reading what the peer still sends.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Builds a fresh protocol instance for every accepted connection.
pub type RawFactory = Arc<dyn Fn() -> Box<dyn RawProtocol> + Send + Sync>;

/// What the driver does after an event was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

#[async_trait]
pub trait RawProtocol: Send {
    async fn connection_made(&mut self, _connection: &Arc<RawConnection>) -> Flow {
        Flow::Continue
    }

    async fn data_received(&mut self, _connection: &Arc<RawConnection>, _data: Bytes) -> Flow {
        Flow::Continue
    }
}

/// The write side of an accepted socket.
///
/// Once closed, every later write fails with `NotConnected` and [`RawConnection::closed`]
/// resolves, which is what pending drip writes wait on.
pub struct RawConnection {
    info: ConnectionInfo,
    writer: Mutex<Option<BoxedWriter>>,
    closed: CancellationToken,
}

impl RawConnection {
    pub fn new<W>(writer: W, info: ConnectionInfo) -> Arc<Self>
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Arc::new(Self { info, writer: Mutex::new(Some(Box::new(writer))), closed: CancellationToken::new() })
    }

    pub fn info(&self) -> ConnectionInfo {
        self.info
    }

    pub async fn write(&self, bytes: &[u8]) -> io::Result<()> {
        if self.is_closed() {
            return Err(io::ErrorKind::NotConnected.into());
        }

        let mut writer = self.writer.lock().await;
        let Some(writer) = writer.as_mut() else {
            return Err(io::ErrorKind::NotConnected.into());
        };

        let result = async {
            writer.write_all(bytes).await?;
            writer.flush().await
        }
        .await;

        if let Err(e) = &result {
            debug!(cause = %e, "write failed, marking connection closed");
            self.closed.cancel();
        }
        result
    }

    /// Flushes and shuts down the write side. Calling it again does nothing.
    pub async fn close(&self) {
        self.closed.cancel();

        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            if let Err(e) = writer.shutdown().await {
                debug!(cause = %e, "shutdown connection failed");
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once the connection was closed by either side.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.closed.cancelled()
    }

    pub(crate) fn close_token(&self) -> CancellationToken {
        self.closed.clone()
    }
}

impl std::fmt::Debug for RawConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawConnection").field("info", &self.info).field("closed", &self.is_closed()).finish_non_exhaustive()
    }
}

/// Runs `protocol` against an accepted tcp stream.
pub async fn serve_connection(stream: TcpStream, info: ConnectionInfo, protocol: Box<dyn RawProtocol>) {
    let (reader, writer) = stream.into_split();
    let connection = RawConnection::new(writer, info);
    drive(reader, connection, protocol).await;
}

/// Feeds connection events to `protocol` until the connection is closed.
///
/// When the protocol asks to close, the write side is shut down first and the reader is drained
/// until the peer closes too. Dropping a socket with unread input resets it, and the reset
/// discards whatever response bytes the peer has not read yet.
pub async fn drive<R>(mut reader: R, connection: Arc<RawConnection>, mut protocol: Box<dyn RawProtocol>)
where
    R: AsyncRead + Unpin,
{
    if protocol.connection_made(&connection).await == Flow::Close {
        connection.close().await;
        drain(&mut reader).await;
        return;
    }

    let mut buf = BytesMut::with_capacity(READ_BUFFER_SIZE);
    loop {
        buf.reserve(READ_BUFFER_SIZE);

        let read = tokio::select! {
            () = connection.closed() => return,
            read = reader.read_buf(&mut buf) => read,
        };

        match read {
            Ok(0) => {
                debug!("peer closed the connection");
                connection.close().await;
                return;
            }
            Ok(_) => {
                let data = buf.split().freeze();
                if protocol.data_received(&connection, data).await == Flow::Close {
                    connection.close().await;
                    drain(&mut reader).await;
                    return;
                }
            }
            Err(e) => {
                debug!(cause = %e, "read failed, closing connection");
                connection.close().await;
                return;
            }
        }
    }
}

async fn drain<R>(reader: &mut R)
where
    R: AsyncRead + Unpin,
{
    match tokio::time::timeout(DRAIN_TIMEOUT, tokio::io::copy(reader, &mut tokio::io::sink())).await {
        Ok(Ok(discarded)) => debug!(discarded, "peer closed after the response"),
        Ok(Err(e)) => debug!(cause = %e, "read failed while draining"),
        Err(_) => debug!("peer kept the connection open, closing"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl RawProtocol for Echo {
        async fn data_received(&mut self, connection: &Arc<RawConnection>, data: Bytes) -> Flow {
            if connection.write(&data).await.is_err() {
                return Flow::Close;
            }
            if data.ends_with(b"bye") { Flow::Close } else { Flow::Continue }
        }
    }

    #[tokio::test]
    async fn drive_until_protocol_closes() {
        let (mut client, server) = tokio::io::duplex(1024);
        let (reader, writer) = tokio::io::split(server);
        let connection = RawConnection::new(writer, ConnectionInfo::default());

        let task = tokio::spawn(drive(reader, Arc::clone(&connection), Box::new(Echo)));

        client.write_all(b"hello").await.unwrap();
        let mut echoed = [0u8; 5];
        client.read_exact(&mut echoed).await.unwrap();
        assert_eq!(&echoed, b"hello");

        client.write_all(b"bye").await.unwrap();
        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, b"bye");
        assert!(connection.is_closed());

        drop(client);
        task.await.unwrap();
    }

    struct Greeter;

    #[async_trait]
    impl RawProtocol for Greeter {
        async fn connection_made(&mut self, connection: &Arc<RawConnection>) -> Flow {
            let _ = connection.write(&[b'x'; 64 * 1024]).await;
            Flow::Close
        }
    }

    #[tokio::test]
    async fn close_drains_unread_input() {
        let (mut client, server) = tokio::io::duplex(128 * 1024);
        let (reader, writer) = tokio::io::split(server);
        let connection = RawConnection::new(writer, ConnectionInfo::default());

        client.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
        let task = tokio::spawn(drive(reader, Arc::clone(&connection), Box::new(Greeter)));

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        assert_eq!(received.len(), 64 * 1024);

        // still reading after the write side was shut down
        client.write_all(b"more").await.unwrap();
        assert!(!task.is_finished());

        drop(client);
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn drain_gives_up_on_a_silent_peer() {
        let (mut client, server) = tokio::io::duplex(128 * 1024);
        let (reader, writer) = tokio::io::split(server);
        let connection = RawConnection::new(writer, ConnectionInfo::default());

        let task = tokio::spawn(drive(reader, connection, Box::new(Greeter)));
        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();

        let start = tokio::time::Instant::now();
        task.await.unwrap();
        assert_eq!(start.elapsed(), DRAIN_TIMEOUT);
    }

    #[tokio::test]
    async fn peer_eof_closes_connection() {
        let (client, server) = tokio::io::duplex(1024);
        let (reader, writer) = tokio::io::split(server);
        let connection = RawConnection::new(writer, ConnectionInfo::default());

        let task = tokio::spawn(drive(reader, Arc::clone(&connection), Box::new(Echo)));
        drop(client);

        task.await.unwrap();
        assert!(connection.is_closed());
        assert!(connection.write(b"late").await.is_err());
    }

    #[tokio::test]
    async fn close_from_outside_stops_driver() {
        let (_client, server) = tokio::io::duplex(1024);
        let (reader, writer) = tokio::io::split(server);
        let connection = RawConnection::new(writer, ConnectionInfo::default());

        let task = tokio::spawn(drive(reader, Arc::clone(&connection), Box::new(Echo)));
        connection.close().await;

        task.await.unwrap();
    }
}
