//! The raw behaviors, one [`RawProtocol`] per port.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use once_cell::sync::Lazy;
use rand::Rng;
use rand::rngs::StdRng;
use tracing::{debug, info};

use super::request::{self, RequestLine, RequestLineError};
use super::{Flow, RawConnection, RawProtocol};
use crate::SERVER_HEADER;
use crate::access_log;
use crate::drip::ByteDrip;
use crate::web::accept::MimeAccept;

/// What the malformed behaviors write instead of a status line.
pub const MALFORMED: &[u8] = b"foo bar";

/// Body bytes sent after a `Content-Length: 3` header.
pub const PAST_CONTENT_LENGTH_BODY_SIZE: usize = 1024 * 1024;

/// Bodies cut short on purpose, shared with the too-long content-length behavior.
pub const INCOMPLETE_JSON: &str = r#"{"message": "the json body is incomplete.", "key": {"nested_message": "blah blah blah"#;
pub const INCOMPLETE_XML: &str = r#"<?xml version="1.0" ?><response><status type="http">200 foo"#;
pub const INCOMPLETE_PLAIN: &str = "incomplete document respo";
pub const INCOMPLETE_HTML: &str = "<!doctype html><html><head><title>incomplete";

/// Bytes an incomplete response promises on top of the ones it sends.
const MISSING_BYTES: usize = 2000;

static DRIP_RESPONSE: Lazy<Bytes> = Lazy::new(|| Bytes::from(format!("HTTP/1.1 204 No Content\r\nServer: {SERVER_HEADER}\r\n\r\n")));

static CONTENT_LENGTH_LIE: Lazy<Bytes> = Lazy::new(|| {
    let head = format!(
        "HTTP/1.1 200 OK\r\nServer: {SERVER_HEADER}\r\nContent-Type: text/plain\r\nContent-Length: 3\r\nConnection: keep-alive\r\n\r\n"
    );

    let mut response = BytesMut::with_capacity(head.len() + PAST_CONTENT_LENGTH_BODY_SIZE);
    response.put_slice(head.as_bytes());
    response.put_bytes(b'a', PAST_CONTENT_LENGTH_BODY_SIZE);
    response.freeze()
});

static DROP_RANDOM_SUCCESS: Lazy<Bytes> = Lazy::new(|| {
    Bytes::from(format!("HTTP/1.1 200 OK\r\nServer: {SERVER_HEADER}\r\nContent-Type: application/json\r\n\r\n{{\"success\": true}}"))
});

async fn write_or_log(connection: &RawConnection, bytes: &[u8]) {
    if let Err(e) = connection.write(bytes).await {
        debug!(cause = %e, "peer went away before the response was written");
    }
}

/// Never writes, never closes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListenForever;

#[async_trait]
impl RawProtocol for ListenForever {
    async fn data_received(&mut self, connection: &Arc<RawConnection>, data: Bytes) -> Flow {
        access_log::raw(connection.info(), &data, None);
        Flow::Continue
    }
}

/// Writes `payload` as soon as the connection is made, then closes.
#[derive(Debug, Clone, Copy)]
pub struct TerminateImmediately {
    payload: &'static [u8],
}

impl TerminateImmediately {
    pub fn new(payload: &'static [u8]) -> Self {
        Self { payload }
    }
}

#[async_trait]
impl RawProtocol for TerminateImmediately {
    async fn connection_made(&mut self, connection: &Arc<RawConnection>) -> Flow {
        access_log::raw(connection.info(), b"", None);
        write_or_log(connection, self.payload).await;
        Flow::Close
    }
}

/// Writes `payload` once the peer sent something, then closes.
#[derive(Debug, Clone, Copy)]
pub struct TerminateOnReceive {
    payload: &'static [u8],
}

impl TerminateOnReceive {
    pub fn new(payload: &'static [u8]) -> Self {
        Self { payload }
    }
}

#[async_trait]
impl RawProtocol for TerminateOnReceive {
    async fn data_received(&mut self, connection: &Arc<RawConnection>, data: Bytes) -> Flow {
        access_log::raw(connection.info(), &data, None);
        write_or_log(connection, self.payload).await;
        Flow::Close
    }
}

/// Drips a `204 No Content` response one byte per `unit`.
#[derive(Debug)]
pub struct ByteDripResponse {
    drip: ByteDrip,
    scheduled: bool,
}

impl ByteDripResponse {
    pub fn new(unit: Duration) -> Self {
        Self { drip: ByteDrip::new(unit), scheduled: false }
    }
}

#[async_trait]
impl RawProtocol for ByteDripResponse {
    async fn data_received(&mut self, connection: &Arc<RawConnection>, data: Bytes) -> Flow {
        if self.scheduled {
            debug!(len = data.len(), "drip already scheduled, ignoring data");
            return Flow::Continue;
        }

        // the drip task closes the connection once the last byte is out
        self.scheduled = true;
        let _drip = self.drip.schedule(connection, DRIP_RESPONSE.clone());
        access_log::raw(connection.info(), &data, Some(204));
        Flow::Continue
    }
}

/// Declares 3 bytes of body and sends a megabyte.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentLengthLie;

#[async_trait]
impl RawProtocol for ContentLengthLie {
    async fn connection_made(&mut self, connection: &Arc<RawConnection>) -> Flow {
        access_log::raw(connection.info(), b"", Some(200));
        write_or_log(connection, &CONTENT_LENGTH_LIE).await;
        Flow::Close
    }
}

/// Answers a `1 - failrate` fraction of requests and silently drops the rest.
#[derive(Debug)]
pub struct DropRandom {
    rng: Arc<Mutex<StdRng>>,
    default_rate: f64,
}

impl DropRandom {
    pub fn new(rng: Arc<Mutex<StdRng>>, default_rate: f64) -> Self {
        Self { rng, default_rate }
    }

    fn failrate(&self, data: &[u8]) -> Result<f64, DropRandomError> {
        let line = RequestLine::parse(data)?;
        match line.query_value("failrate")? {
            Some(value) => value.trim().parse::<f64>().map_err(|source| DropRandomError::Failrate { value, source }),
            None => Ok(self.default_rate),
        }
    }

    fn roll(&self) -> f64 {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).random::<f64>()
    }
}

#[derive(Debug, thiserror::Error)]
enum DropRandomError {
    #[error(transparent)]
    RequestLine(#[from] RequestLineError),

    #[error("failrate '{value}' is not a number: {source}")]
    Failrate {
        value: String,
        #[source]
        source: std::num::ParseFloatError,
    },
}

#[async_trait]
impl RawProtocol for DropRandom {
    async fn data_received(&mut self, connection: &Arc<RawConnection>, data: Bytes) -> Flow {
        let failrate = match self.failrate(&data) {
            Ok(failrate) => failrate,
            Err(e) => {
                info!(cause = %e, "unusable request, dropping it");
                access_log::raw(connection.info(), &data, None);
                return Flow::Close;
            }
        };

        if self.roll() >= failrate {
            access_log::raw(connection.info(), &data, Some(200));
            write_or_log(connection, &DROP_RANDOM_SUCCESS).await;
        } else {
            debug!(failrate, "dropping request");
        }
        Flow::Close
    }
}

/// Sends a body 2000 bytes shorter than its `Content-Length`, in the type the client prefers.
#[derive(Debug, Clone, Copy, Default)]
pub struct IncompleteResponse;

impl IncompleteResponse {
    fn negotiate(data: &[u8]) -> (&'static str, &'static str) {
        let accept = MimeAccept::parse(request::header(data, "accept"));
        match accept.best() {
            Some("text/html") => ("text/html", INCOMPLETE_HTML),
            Some("text/plain") => ("text/plain", INCOMPLETE_PLAIN),
            Some("text/xml") => ("text/xml", INCOMPLETE_XML),
            _ => ("application/json", INCOMPLETE_JSON),
        }
    }
}

#[async_trait]
impl RawProtocol for IncompleteResponse {
    async fn data_received(&mut self, connection: &Arc<RawConnection>, data: Bytes) -> Flow {
        let (content_type, body) = Self::negotiate(&data);
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\n\r\n{body}",
            body.len() + MISSING_BYTES
        );

        access_log::raw(connection.info(), &data, Some(200));
        write_or_log(connection, response.as_bytes()).await;
        Flow::Close
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::drive;
    use hamms_http::protocol::ConnectionInfo;
    use indoc::formatdoc;
    use rand::SeedableRng;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
    use tokio::task::JoinHandle;
    use tokio::time::Instant;

    fn connect<P: RawProtocol + 'static>(protocol: P) -> (DuplexStream, JoinHandle<()>) {
        let (client, server) = tokio::io::duplex(2 * 1024 * 1024);
        let (reader, writer) = tokio::io::split(server);
        let connection = RawConnection::new(writer, ConnectionInfo::default());
        (client, tokio::spawn(drive(reader, connection, Box::new(protocol))))
    }

    async fn read_all(client: &mut DuplexStream) -> Vec<u8> {
        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        received
    }

    fn drop_random(rate: f64) -> DropRandom {
        DropRandom::new(Arc::new(Mutex::new(StdRng::seed_from_u64(7))), rate)
    }

    #[tokio::test]
    async fn terminate_immediately_without_peer_data() {
        let (mut client, task) = connect(TerminateImmediately::new(b""));
        assert!(read_all(&mut client).await.is_empty());
        drop(client);
        task.await.unwrap();

        let (mut client, task) = connect(TerminateImmediately::new(MALFORMED));
        assert_eq!(read_all(&mut client).await, b"foo bar");
        drop(client);
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn terminate_on_receive_waits_for_data() {
        let (mut client, task) = connect(TerminateOnReceive::new(MALFORMED));

        let mut byte = [0u8; 1];
        let early = tokio::time::timeout(Duration::from_secs(60), client.read(&mut byte)).await;
        assert!(early.is_err(), "nothing may be written before the request");

        client.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
        assert_eq!(read_all(&mut client).await, b"foo bar");
        drop(client);
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn listen_forever_never_answers() {
        let (mut client, task) = connect(ListenForever);
        client.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();

        let mut byte = [0u8; 1];
        let read = tokio::time::timeout(Duration::from_secs(3600), client.read(&mut byte)).await;
        assert!(read.is_err());
        assert!(!task.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn drip_is_scheduled_once() {
        let unit = Duration::from_secs(5);
        let (mut client, task) = connect(ByteDripResponse::new(unit));
        let start = Instant::now();

        client.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
        let mut first = [0u8; 1];
        client.read_exact(&mut first).await.unwrap();
        client.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();

        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();

        let expected = format!("HTTP/1.1 204 No Content\r\nServer: {SERVER_HEADER}\r\n\r\n");
        assert_eq!([&first[..], &rest[..]].concat(), expected.as_bytes());
        assert_eq!(Instant::now() - start, unit * (u32::try_from(expected.len()).unwrap() + 1));
        drop(client);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn content_length_lie() {
        let (mut client, task) = connect(ContentLengthLie);
        let received = read_all(&mut client).await;
        drop(client);
        task.await.unwrap();

        let head_end = received.windows(4).position(|w| w == b"\r\n\r\n").unwrap() + 4;
        let head = std::str::from_utf8(&received[..head_end]).unwrap();
        assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(head.contains("Content-Length: 3\r\n"));
        assert!(head.contains("Connection: keep-alive\r\n"));
        assert!(head.contains(&format!("Server: {SERVER_HEADER}\r\n")));

        let body = &received[head_end..];
        assert_eq!(body.len(), PAST_CONTENT_LENGTH_BODY_SIZE);
        assert!(body.iter().all(|b| *b == b'a'));
    }

    #[tokio::test]
    async fn content_length_lie_after_a_request() {
        let (mut client, task) = connect(ContentLengthLie);
        client.write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n").await.unwrap();

        let received = read_all(&mut client).await;
        assert!(received.len() > PAST_CONTENT_LENGTH_BODY_SIZE);
        drop(client);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn drop_random_never_fails_at_zero() {
        let (mut client, task) = connect(drop_random(0.05));
        client.write_all(b"GET /?failrate=0 HTTP/1.1\r\nHost: localhost\r\n\r\n").await.unwrap();

        let received = String::from_utf8(read_all(&mut client).await).unwrap();
        assert!(received.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(received.ends_with("\r\n\r\n{\"success\": true}"));
        drop(client);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn drop_random_always_fails_at_one() {
        for _ in 0..20 {
            let (mut client, task) = connect(drop_random(0.0));
            client.write_all(b"GET /?failrate=0.2&failrate=1 HTTP/1.1\r\n\r\n").await.unwrap();
            assert!(read_all(&mut client).await.is_empty());
            drop(client);
        task.await.unwrap();
        }
    }

    #[tokio::test]
    async fn drop_random_closes_on_garbage() {
        for request in [&b"foo bar\r\n\r\n"[..], b"GET /?failrate=often HTTP/1.1\r\n\r\n"] {
            let (mut client, task) = connect(drop_random(0.0));
            client.write_all(request).await.unwrap();
            assert!(read_all(&mut client).await.is_empty());
            drop(client);
        task.await.unwrap();
        }
    }

    #[tokio::test]
    async fn incomplete_response_by_accept() {
        let cases = [
            ("text/html", "text/html", INCOMPLETE_HTML),
            ("text/plain;q=0.9, text/xml;q=0.1", "text/plain", INCOMPLETE_PLAIN),
            ("text/xml", "text/xml", INCOMPLETE_XML),
            ("image/png", "application/json", INCOMPLETE_JSON),
        ];

        for (accept, content_type, body) in cases {
            let (mut client, task) = connect(IncompleteResponse);
            let request = formatdoc! {"
                GET / HTTP/1.1\r
                Host: localhost\r
                Accept: {accept}\r
                \r
            "};
            client.write_all(request.as_bytes()).await.unwrap();

            let received = String::from_utf8(read_all(&mut client).await).unwrap();
            let expected = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\n\r\n{body}",
                body.len() + 2000
            );
            assert_eq!(received, expected);
            drop(client);
        task.await.unwrap();
        }
    }

    #[tokio::test]
    async fn incomplete_response_without_accept_is_json() {
        let (mut client, task) = connect(IncompleteResponse);
        client.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();

        let received = String::from_utf8(read_all(&mut client).await).unwrap();
        assert!(received.contains("Content-Type: application/json\r\n"));
        assert!(received.ends_with(INCOMPLETE_JSON));
        drop(client);
        task.await.unwrap();
    }
}
