//! HTTP response header handling.

use http::Response;

/// The header portion of a response, before the payload is attached.
pub type ResponseHead = Response<()>;

/// Response extension asking the encoder to send this exact `Content-Length`.
///
/// Without it the encoder derives `Content-Length` from the body. With it the handler's value
/// is written as-is, even when the body is shorter or longer, and the connection is closed
/// once the body has been written since the client can no longer frame the next response.
///
/// ```
/// use bytes::Bytes;
/// use hamms_http::protocol::DeclaredLength;
/// use http::Response;
/// use http_body_util::Full;
///
/// let response = Response::builder()
///     .extension(DeclaredLength(2300))
///     .body(Full::new(Bytes::from_static(b"{\"truncated\": ")))
///     .unwrap();
/// assert_eq!(response.extensions().get::<DeclaredLength>(), Some(&DeclaredLength(2300)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeclaredLength(pub u64);
