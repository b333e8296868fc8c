//! Framing for OVSDB's JSON-RPC stream.
//!
//! OVSDB does not delimit messages: a connection carries back-to-back JSON
//! texts, so a frame ends wherever the next complete JSON value ends.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ClientError;

/// Upper bound for a single buffered message.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

/// Codec turning a byte stream into `serde_json::Value` messages and back.
///
/// Object and array texts are delimited with a resumable byte scan, so a
/// message that arrives over many reads is walked once and parsed once.
#[derive(Clone, Debug)]
pub struct JsonCodec {
    max_frame_bytes: usize,
    scan: FrameScan,
}

impl JsonCodec {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            max_frame_bytes: max_frame_bytes.max(1),
            scan: FrameScan::default(),
        }
    }

    pub fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }

    fn too_large(&mut self, size: usize) -> ClientError {
        self.scan = FrameScan::default();
        ClientError::FrameTooLarge {
            size,
            limit: self.max_frame_bytes,
        }
    }

    /// Bare scalars at the top level have no closing delimiter; they are tiny
    /// and go straight to the stream deserializer.
    fn decode_scalar(
        &mut self,
        src: &mut BytesMut,
    ) -> Result<Option<serde_json::Value>, ClientError> {
        let parsed = {
            let mut stream =
                serde_json::Deserializer::from_slice(&src[..]).into_iter::<serde_json::Value>();
            match stream.next() {
                Some(Ok(value)) => Ok(Some((value, stream.byte_offset()))),
                Some(Err(err)) if err.is_eof() => Ok(None),
                Some(Err(err)) => Err(err),
                None => Ok(None),
            }
        };
        match parsed? {
            Some((value, consumed)) => {
                src.advance(consumed);
                Ok(Some(value))
            }
            None if src.len() > self.max_frame_bytes => Err(self.too_large(src.len())),
            None => Ok(None),
        }
    }
}

impl Default for JsonCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

/// Progress through the object or array text at the head of the buffer.
#[derive(Clone, Debug, Default)]
struct FrameScan {
    /// Bytes of the current frame already examined.
    offset: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl FrameScan {
    /// Continue scanning `buf`, returning the frame length once the top-level
    /// value closes.
    fn advance(&mut self, buf: &[u8]) -> Option<usize> {
        while self.offset < buf.len() {
            let byte = buf[self.offset];
            self.offset += 1;
            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if byte == b'\\' {
                    self.escaped = true;
                } else if byte == b'"' {
                    self.in_string = false;
                }
                continue;
            }
            match byte {
                b'"' => self.in_string = true,
                b'{' | b'[' => self.depth += 1,
                b'}' | b']' => {
                    self.depth = self.depth.saturating_sub(1);
                    if self.depth == 0 {
                        return Some(self.offset);
                    }
                }
                _ => {}
            }
        }
        None
    }
}

impl Decoder for JsonCodec {
    type Item = serde_json::Value;
    type Error = ClientError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.scan.offset == 0 {
            // Drop inter-message whitespace so an idle buffer does not count
            // against the frame limit.
            let skip = src
                .iter()
                .position(|b| !b.is_ascii_whitespace())
                .unwrap_or(src.len());
            src.advance(skip);
            if src.is_empty() {
                return Ok(None);
            }
            if !matches!(src[0], b'{' | b'[') {
                return self.decode_scalar(src);
            }
        }

        match self.scan.advance(&src[..]) {
            Some(len) => {
                self.scan = FrameScan::default();
                let frame = src.split_to(len);
                Ok(Some(serde_json::from_slice(&frame)?))
            }
            None if src.len() > self.max_frame_bytes => Err(self.too_large(src.len())),
            None => Ok(None),
        }
    }
}

impl Encoder<serde_json::Value> for JsonCodec {
    type Error = ClientError;

    fn encode(&mut self, item: serde_json::Value, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let encoded = serde_json::to_vec(&item)?;
        dst.extend_from_slice(&encoded);
        Ok(())
    }
}
