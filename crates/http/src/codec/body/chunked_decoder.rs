//! Decoder for chunked transfer coding, see
//! [RFC 9112 Section 7.1](https://www.rfc-editor.org/rfc/rfc9112#section-7.1).
//!
//! Chunk size lines (including extensions) are parsed by `httparse::parse_chunk_size`,
//! trailer fields are read and discarded.

use std::cmp;

use bytes::{Buf, BytesMut};
use httparse::Status;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;
use crate::protocol::{ParseError, PayloadItem};

/// Longest trailer line accepted before giving up on the request.
const MAX_TRAILER_LINE: usize = 8 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: ChunkedState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedState {
    /// Read the chunk size line
    Size,
    /// Read chunk data, holding the bytes left in the current chunk
    Body(u64),
    /// Read CRLF after chunk data
    BodyCrlf,
    /// Read trailer fields until the empty line
    Trailer,
    /// Final state after the empty line
    End,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self { state: ChunkedState::Size }
    }
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.state {
                ChunkedState::Size => match httparse::parse_chunk_size(src).map_err(|e| ParseError::invalid_body(format!("{e:?}")))? {
                    Status::Complete((consumed, 0)) => {
                        src.advance(consumed);
                        self.state = ChunkedState::Trailer;
                    }
                    Status::Complete((consumed, size)) => {
                        trace!(size, "read chunk size");
                        src.advance(consumed);
                        self.state = ChunkedState::Body(size);
                    }
                    Status::Partial => return Ok(None),
                },

                ChunkedState::Body(remaining) => {
                    if src.is_empty() {
                        return Ok(None);
                    }

                    let len = cmp::min(remaining, src.len() as u64);
                    let bytes = src.split_to(usize::try_from(len).unwrap_or(src.len())).freeze();
                    let remaining = remaining - bytes.len() as u64;

                    self.state = if remaining == 0 { ChunkedState::BodyCrlf } else { ChunkedState::Body(remaining) };
                    return Ok(Some(PayloadItem::Chunk(bytes)));
                }

                ChunkedState::BodyCrlf => {
                    if src.len() < 2 {
                        return Ok(None);
                    }
                    ensure!(src.starts_with(b"\r\n"), ParseError::invalid_body("missing CRLF after chunk data"));
                    src.advance(2);
                    self.state = ChunkedState::Size;
                }

                ChunkedState::Trailer => {
                    let Some(line_end) = src.windows(2).position(|window| window == b"\r\n") else {
                        ensure!(src.len() <= MAX_TRAILER_LINE, ParseError::invalid_body("trailer line too long"));
                        return Ok(None);
                    };

                    src.advance(line_end + 2);
                    if line_end == 0 {
                        self.state = ChunkedState::End;
                    }
                }

                ChunkedState::End => return Ok(Some(PayloadItem::Eof)),
            }
        }
    }
}
