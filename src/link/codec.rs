//! Newline-delimited JSON framing for the hardware agent's stdio.
//!
//! [`IpcCodec`] implements [`Decoder`] for inbound lines and
//! [`Encoder<RemoteCommand>`] for outbound commands, one JSON object per
//! line in both directions.
//!
//! A bad line never fails the stream: invalid UTF-8, invalid JSON, a
//! non-object value or an over-long line each decode to
//! [`InboundFrame::Malformed`] and decoding resumes at the next newline.
//! Only real I/O errors end the stream.

use std::io;

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::domain::{HardwareMessage, RemoteCommand};

/// Default maximum line length in bytes (64 KB).
pub const DEFAULT_MAX_LINE_BYTES: usize = 64 * 1024;

/// One decoded inbound line.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// A JSON object from the agent.
    Message(HardwareMessage),
    /// A line that was discarded, with the reason.
    Malformed(String),
}

/// Codec for the agent's line protocol.
#[derive(Debug)]
pub struct IpcCodec {
    /// Longest accepted line, excluding the newline.
    max_line_bytes: usize,
    /// Where to resume the newline search in the buffer.
    next_index: usize,
    /// Dropping the tail of an over-long line.
    discarding: bool,
}

impl IpcCodec {
    /// Creates a codec accepting lines up to `max_line_bytes`.
    #[must_use]
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            max_line_bytes: max_line_bytes.max(1),
            next_index: 0,
            discarding: false,
        }
    }

    /// Longest accepted line.
    #[must_use]
    pub const fn max_line_bytes(&self) -> usize {
        self.max_line_bytes
    }

    fn too_long(&self) -> InboundFrame {
        InboundFrame::Malformed(format!("line exceeds {} bytes", self.max_line_bytes))
    }
}

impl Default for IpcCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_BYTES)
    }
}

/// Interprets one line without its terminator. Blank lines yield `None`.
fn parse_line(line: &[u8]) -> Option<InboundFrame> {
    let text = match std::str::from_utf8(line) {
        Ok(text) => text.trim(),
        Err(e) => return Some(InboundFrame::Malformed(format!("invalid UTF-8: {e}"))),
    };
    if text.is_empty() {
        return None;
    }
    let frame = match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value) => match HardwareMessage::from_value(value) {
            Ok(message) => InboundFrame::Message(message),
            Err(e) => InboundFrame::Malformed(e.to_string()),
        },
        Err(e) => InboundFrame::Malformed(format!("invalid JSON: {e}")),
    };
    Some(frame)
}

impl Decoder for IpcCodec {
    type Item = InboundFrame;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let newline = src
                .get(self.next_index..)
                .and_then(|rest| rest.iter().position(|b| *b == b'\n'))
                .map(|offset| self.next_index + offset);

            let Some(line_end) = newline else {
                if src.len() > self.max_line_bytes {
                    self.discarding = true;
                    src.clear();
                    self.next_index = 0;
                } else {
                    self.next_index = src.len();
                }
                return Ok(None);
            };

            self.next_index = 0;
            let mut line = src.split_to(line_end + 1);
            line.truncate(line_end);

            if self.discarding || line.len() > self.max_line_bytes {
                self.discarding = false;
                return Ok(Some(self.too_long()));
            }
            if let Some(frame) = parse_line(&line) {
                return Ok(Some(frame));
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        self.next_index = 0;
        if self.discarding {
            self.discarding = false;
            src.clear();
            return Ok(Some(self.too_long()));
        }
        if src.is_empty() {
            return Ok(None);
        }
        let line = src.split();
        Ok(parse_line(&line))
    }
}

impl Encoder<RemoteCommand> for IpcCodec {
    type Error = io::Error;

    fn encode(&mut self, item: RemoteCommand, dst: &mut BytesMut) -> Result<(), Self::Error> {
        // Compact JSON escapes control characters, so the only newline is ours.
        let line = serde_json::to_vec(item.payload())?;
        dst.reserve(line.len() + 1);
        dst.extend_from_slice(&line);
        dst.extend_from_slice(b"\n");
        Ok(())
    }
}
