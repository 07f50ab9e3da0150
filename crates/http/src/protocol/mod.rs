//! Core HTTP protocol types shared by the codec and connection layers.
//!
//! - **Message handling** ([`message`]): [`Message`], [`PayloadItem`] and [`PayloadSize`]
//! - **Request processing** ([`request`]): [`RequestHeader`]
//! - **Response processing** ([`response`]): [`ResponseHead`] and the [`DeclaredLength`] marker
//! - **Connection metadata** ([`peer`]): [`ConnectionInfo`], attached to every request
//! - **Error handling** ([`error`]): [`HttpError`], [`ParseError`] and [`SendError`]

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::RequestHeader;

mod response;
pub use response::DeclaredLength;
pub use response::ResponseHead;

mod peer;
pub use peer::ConnectionInfo;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;
