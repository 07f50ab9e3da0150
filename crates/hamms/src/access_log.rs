//! Access lines, one per interaction.
//!
//! Lines are emitted at INFO on the `hamms::access` target in the form
//!
//! ```text
//! 127.0.0.1 5509 "GET /?status=418 HTTP/1.0" 418 "curl/8.5.0"
//! ```
//!
//! remote ip, local port, request line, status (`-` when none was sent) and user agent. A line
//! that can't be rendered is replaced by `<data received>`, logging never fails a connection.

use std::str;

use hamms_http::protocol::ConnectionInfo;
use http::{Method, StatusCode};
use tracing::{debug, info};

use crate::error::AccessLogError;
use crate::raw::request;

const UNKNOWN_ADDR: &str = "<ipaddr>";
const UNKNOWN_PORT: &str = "<port>";
const UNRENDERABLE: &str = "<data received>";

pub fn format_line(
    info: ConnectionInfo,
    request_data: &[u8],
    status: Option<u16>,
    user_agent: &str,
) -> Result<String, AccessLogError> {
    let topline = str::from_utf8(request::first_line(request_data))?;

    let ip = info.remote_addr().map_or_else(|| UNKNOWN_ADDR.to_owned(), |addr| addr.ip().to_string());
    let port = info.local_port().map_or_else(|| UNKNOWN_PORT.to_owned(), |port| port.to_string());
    let status = status.map_or_else(|| "-".to_owned(), |status| status.to_string());

    Ok(format!("{ip} {port} \"{topline}\" {status} \"{user_agent}\""))
}

/// Logs bytes received by a raw behavior.
pub fn raw(info: ConnectionInfo, data: &[u8], status: Option<u16>) {
    let user_agent = request::header(data, "user-agent").unwrap_or_default();
    emit(format_line(info, data, status, user_agent));
}

/// Logs a request served by an http behavior.
pub fn http(info: ConnectionInfo, method: &Method, full_path: &str, status: StatusCode, user_agent: &str) {
    let request_line = format!("{method} {full_path} HTTP/1.0");
    emit(format_line(info, request_line.as_bytes(), Some(status.as_u16()), user_agent));
}

fn emit(line: Result<String, AccessLogError>) {
    match line {
        Ok(line) => info!(target: "hamms::access", "{line}"),
        Err(e) => {
            debug!(cause = %e, "can't format access line");
            info!(target: "hamms::access", "{UNRENDERABLE}");
        }
    }
}
