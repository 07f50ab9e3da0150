use std::error::Error;
use std::fmt::Display;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use http::header::{CONNECTION, EXPECT};
use http::{HeaderValue, Response, StatusCode};
use http_body::Body;
use http_body_util::{BodyExt, Empty};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, warn};

use crate::codec::{RequestDecoder, ResponseEncoder};
use crate::ensure;
use crate::handler::Handler;
use crate::protocol::{
    ConnectionInfo, DeclaredLength, HttpError, Message, ParseError, PayloadItem, PayloadSize, RequestHeader, ResponseHead, SendError,
};

/// Largest request body buffered for a handler.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Initial capacity of the read buffer.
const READ_BUFFER_SIZE: usize = 8 * 1024;

/// An HTTP connection that decodes requests and writes the handler's responses.
///
/// # Type Parameters
///
/// * `R`: The async readable stream type
/// * `W`: The async writable stream type
#[derive(Debug)]
pub struct HttpConnection<R, W> {
    framed_read: FramedRead<R, RequestDecoder>,
    framed_write: FramedWrite<W, ResponseEncoder>,
    info: ConnectionInfo,
}

/// What happens to the connection once a response was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Persistence {
    KeepAlive,
    Close,
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W, info: ConnectionInfo) -> Self {
        Self {
            framed_read: FramedRead::with_capacity(reader, RequestDecoder::new(), READ_BUFFER_SIZE),
            framed_write: FramedWrite::new(writer, ResponseEncoder::new()),
            info,
        }
    }

    /// Serves requests until the connection is finished.
    ///
    /// Malformed requests are answered with `400 Bad Request` before the error is returned,
    /// handler failures are answered with `500 Internal Server Error` and do not end the
    /// connection.
    pub async fn process<H>(mut self, handler: Arc<H>) -> Result<(), HttpError>
    where
        H: Handler,
        <H::RespBody as Body>::Error: Display,
    {
        loop {
            match self.framed_read.next().await {
                Some(Ok(Message::Header((header, _payload_size)))) => {
                    if self.do_process(header, handler.as_ref()).await? == Persistence::Close {
                        self.shutdown().await;
                        return Ok(());
                    }
                }

                Some(Ok(Message::Payload(_))) => {
                    error!("receive payload while waiting for a request header");
                    self.do_send_response(build_error_response(StatusCode::BAD_REQUEST)).await?;
                    self.shutdown().await;
                    return Err(ParseError::invalid_body("need header while receive body").into());
                }

                Some(Err(e)) => {
                    warn!(cause = %e, "can't receive next request");
                    self.do_send_response(build_error_response(StatusCode::BAD_REQUEST)).await?;
                    self.shutdown().await;
                    return Err(e.into());
                }

                None => {
                    debug!("cant read more request, break this connection down");
                    return Ok(());
                }
            }
        }
    }

    async fn do_process<H>(&mut self, header: RequestHeader, handler: &H) -> Result<Persistence, HttpError>
    where
        H: Handler,
        <H::RespBody as Body>::Error: Display,
    {
        // Check if the request header contains the "Expect: 100-continue" field.
        if let Some(value) = header.headers().get(EXPECT) {
            let slice = value.as_bytes();
            if slice.len() >= 4 && slice[0..4].eq_ignore_ascii_case(b"100-") {
                let writer = self.framed_write.get_mut();
                writer.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").await.map_err(SendError::io)?;
                writer.flush().await.map_err(SendError::io)?;
                info!("receive expect request header, sent continue response");
            }
        }

        let keep_alive = header.is_keep_alive();

        let body = match self.read_body().await {
            Ok(body) => body,
            Err(e) => {
                warn!(cause = %e, "can't read request body");
                self.do_send_response(build_error_response(StatusCode::BAD_REQUEST)).await?;
                return Err(e.into());
            }
        };

        let mut request = header.body(body);
        request.extensions_mut().insert(self.info);

        let declared_length = match handler.call(request).await {
            Ok(response) => {
                let declared_length = response.extensions().get::<DeclaredLength>().is_some();
                self.do_send_response(response).await?;
                declared_length
            }
            Err(e) => {
                let e: Box<dyn Error + Send + Sync> = e.into();
                error!(cause = %e, "handle response error");
                self.do_send_response(build_error_response(StatusCode::INTERNAL_SERVER_ERROR)).await?;
                false
            }
        };

        // a declared length leaves the client unable to find the next response
        if keep_alive && !declared_length { Ok(Persistence::KeepAlive) } else { Ok(Persistence::Close) }
    }

    async fn read_body(&mut self) -> Result<Bytes, ParseError> {
        let mut body = BytesMut::new();
        loop {
            match self.framed_read.next().await {
                Some(Ok(Message::Payload(PayloadItem::Chunk(bytes)))) => {
                    let current_size = body.len() + bytes.len();
                    ensure!(current_size <= MAX_BODY_BYTES, ParseError::too_large_body(current_size, MAX_BODY_BYTES));
                    body.extend_from_slice(&bytes);
                }
                Some(Ok(Message::Payload(PayloadItem::Eof))) => return Ok(body.freeze()),
                Some(Ok(Message::Header(_))) => return Err(ParseError::invalid_body("receive header while reading body")),
                Some(Err(e)) => return Err(e),
                None => return Err(ParseError::invalid_body("connection closed before body was complete")),
            }
        }
    }

    async fn do_send_response<T>(&mut self, response: Response<T>) -> Result<(), HttpError>
    where
        T: Body<Data = Bytes>,
        T::Error: Display,
    {
        let (parts, body) = response.into_parts();

        let body = body.collect().await.map_err(|e| SendError::invalid_body(format!("resolve response body error: {e}")))?.to_bytes();

        let payload_size = match parts.extensions.get::<DeclaredLength>() {
            Some(DeclaredLength(length)) => PayloadSize::Declared(*length),
            None => PayloadSize::new_length(body.len() as u64),
        };

        let head = ResponseHead::from_parts(parts, ());
        self.framed_write.feed(Message::Header((head, payload_size))).await?;

        if !body.is_empty() {
            self.framed_write.feed(Message::Payload(PayloadItem::Chunk(body))).await?;
        }

        // using send instead of feed, because we want to flush the underlying IO
        self.framed_write.send(Message::Payload(PayloadItem::Eof)).await?;
        Ok(())
    }

    async fn shutdown(&mut self) {
        if let Err(e) = self.framed_write.get_mut().shutdown().await {
            debug!(cause = %e, "shutdown connection failed");
        }
    }
}

fn build_error_response(status_code: StatusCode) -> Response<Empty<Bytes>> {
    let mut response = Response::new(Empty::new());
    *response.status_mut() = status_code;
    response.headers_mut().insert(CONNECTION, HeaderValue::from_static("close"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::make_handler;
    use http::Request;
    use http_body_util::Full;
    use std::io;
    use tokio::io::{AsyncReadExt, DuplexStream};

    type BoxError = Box<dyn Error + Send + Sync>;

    async fn echo(request: Request<Bytes>) -> Result<Response<Full<Bytes>>, BoxError> {
        if request.uri().path() == "/fail" {
            return Err(io::Error::other("handler failed").into());
        }

        let info = request.extensions().get::<ConnectionInfo>().copied().unwrap_or_default();
        assert!(info.remote_addr().is_none());

        let mut response = Response::new(Full::new(request.into_body()));
        *response.status_mut() = StatusCode::OK;
        Ok(response)
    }

    async fn truncated(_request: Request<Bytes>) -> Result<Response<Full<Bytes>>, BoxError> {
        let response = Response::builder().extension(DeclaredLength(2300)).body(Full::new(Bytes::from_static(b"incomplete")))?;
        Ok(response)
    }

    fn serve<H>(handler: H) -> (DuplexStream, tokio::task::JoinHandle<Result<(), HttpError>>)
    where
        H: Handler + 'static,
        H::Error: Send,
        <H::RespBody as Body>::Error: Display,
    {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let (reader, writer) = tokio::io::split(server);
        let connection = HttpConnection::new(reader, writer, ConnectionInfo::default());
        let task = tokio::spawn(connection.process(Arc::new(handler)));
        (client, task)
    }

    #[tokio::test]
    async fn keep_alive_serves_two_requests() {
        let (mut client, task) = serve(make_handler(echo));

        client.write_all(b"POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\nfirstPOST / HTTP/1.1\r\nContent-Length: 6\r\nConnection: close\r\n\r\nsecond").await.unwrap();

        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();

        assert_eq!(response.matches("HTTP/1.1 200 OK\r\n").count(), 2);
        assert!(response.contains("content-length: 5\r\n\r\nfirst"));
        assert!(response.ends_with("content-length: 6\r\n\r\nsecond"));
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn declared_length_closes_connection() {
        let (mut client, task) = serve(make_handler(truncated));

        client.write_all(b"GET / HTTP/1.1\r\nAccept: */*\r\n\r\n").await.unwrap();

        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();

        assert!(response.contains("content-length: 2300\r\n"));
        assert!(response.ends_with("\r\n\r\nincomplete"));
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn malformed_request_gets_bad_request() {
        let (mut client, task) = serve(make_handler(echo));

        client.write_all(b"foo bar baz qux\r\n\r\n").await.unwrap();

        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(task.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn handler_error_is_internal_server_error() {
        let (mut client, task) = serve(make_handler(echo));

        client.write_all(b"GET /fail HTTP/1.0\r\n\r\n").await.unwrap();

        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn expect_continue_then_chunked_body() {
        let (mut client, task) = serve(make_handler(echo));

        client
            .write_all(b"POST /counters HTTP/1.1\r\nExpect: 100-continue\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();

        let mut interim = [0u8; 25];
        client.read_exact(&mut interim).await.unwrap();
        assert_eq!(&interim, b"HTTP/1.1 100 Continue\r\n\r\n");

        client.write_all(b"5\r\nkey=a\r\n0\r\n\r\n").await.unwrap();

        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.ends_with("\r\n\r\nkey=a"));
        assert!(task.await.unwrap().is_ok());
    }
}
