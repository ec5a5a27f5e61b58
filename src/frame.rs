//! HTTP/2 frame codec.
//!
//! Parses and serializes the 9-byte frame header and turns a complete frame
//! into a typed [`Frame`]. Only the frame kinds the server acts on get their
//! own variant; everything else decodes to [`Frame::Unsupported`] and is
//! skipped by the connection.
//!
//! Reference: RFC 7540 Section 4 and 6

use tracing::trace;

use crate::error::{Error, Result};

/// Size of the fixed frame header.
pub const FRAME_HEADER_SIZE: usize = 9;

/// PING frames always carry exactly this many opaque bytes.
pub const PING_PAYLOAD_SIZE: usize = 8;

/// Largest value the 24-bit length field can hold.
pub const MAX_FRAME_LENGTH: usize = (1 << 24) - 1;

/// The HTTP/2 connection preface (24 bytes)
pub const CONNECTION_PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

const STREAM_ID_MASK: u32 = 0x7FFF_FFFF;

/// HTTP/2 frame types (RFC 7540 Section 6)
#[allow(dead_code)]
pub mod frame_type {
    pub const DATA: u8 = 0x0;
    pub const HEADERS: u8 = 0x1;
    pub const PRIORITY: u8 = 0x2;
    pub const RST_STREAM: u8 = 0x3;
    pub const SETTINGS: u8 = 0x4;
    pub const PUSH_PROMISE: u8 = 0x5;
    pub const PING: u8 = 0x6;
    pub const GOAWAY: u8 = 0x7;
    pub const WINDOW_UPDATE: u8 = 0x8;
    pub const CONTINUATION: u8 = 0x9;
}

/// HTTP/2 frame flags
pub mod flags {
    pub const END_STREAM: u8 = 0x1;
    pub const ACK: u8 = 0x1;
    pub const END_HEADERS: u8 = 0x4;
    pub const PADDED: u8 = 0x8;
    pub const PRIORITY: u8 = 0x20;
}

/// HTTP/2 SETTINGS identifiers (RFC 7540 Section 6.5.2)
#[allow(dead_code)]
pub mod settings_id {
    pub const HEADER_TABLE_SIZE: u16 = 0x1;
    pub const ENABLE_PUSH: u16 = 0x2;
    pub const MAX_CONCURRENT_STREAMS: u16 = 0x3;
    pub const INITIAL_WINDOW_SIZE: u16 = 0x4;
    pub const MAX_FRAME_SIZE: u16 = 0x5;
    pub const MAX_HEADER_LIST_SIZE: u16 = 0x6;
}

/// HTTP/2 error codes (RFC 7540 Section 7)
#[allow(dead_code)]
pub mod error_code {
    pub const NO_ERROR: u32 = 0x0;
    pub const PROTOCOL_ERROR: u32 = 0x1;
    pub const INTERNAL_ERROR: u32 = 0x2;
    pub const FLOW_CONTROL_ERROR: u32 = 0x3;
    pub const SETTINGS_TIMEOUT: u32 = 0x4;
    pub const STREAM_CLOSED: u32 = 0x5;
    pub const FRAME_SIZE_ERROR: u32 = 0x6;
    pub const REFUSED_STREAM: u32 = 0x7;
    pub const CANCEL: u32 = 0x8;
    pub const COMPRESSION_ERROR: u32 = 0x9;
    pub const CONNECT_ERROR: u32 = 0xa;
    pub const ENHANCE_YOUR_CALM: u32 = 0xb;
    pub const INADEQUATE_SECURITY: u32 = 0xc;
    pub const HTTP_1_1_REQUIRED: u32 = 0xd;
}

/// Human-readable frame type name for logs.
pub fn frame_type_name(frame_type: u8) -> &'static str {
    match frame_type {
        frame_type::DATA => "DATA",
        frame_type::HEADERS => "HEADERS",
        frame_type::PRIORITY => "PRIORITY",
        frame_type::RST_STREAM => "RST_STREAM",
        frame_type::SETTINGS => "SETTINGS",
        frame_type::PUSH_PROMISE => "PUSH_PROMISE",
        frame_type::PING => "PING",
        frame_type::GOAWAY => "GOAWAY",
        frame_type::WINDOW_UPDATE => "WINDOW_UPDATE",
        frame_type::CONTINUATION => "CONTINUATION",
        _ => "UNKNOWN",
    }
}

/// A parsed HTTP/2 frame header (9 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub length: u32,    // 24 bits
    pub frame_type: u8,
    pub flags: u8,
    pub stream_id: u32, // 31 bits (high bit reserved)
}

impl FrameHeader {
    pub fn new(frame_type: u8, length: u32, flags: u8, stream_id: u32) -> Self {
        Self {
            length,
            frame_type,
            flags,
            stream_id: stream_id & STREAM_ID_MASK,
        }
    }

    /// Parse a 9-byte frame header
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < FRAME_HEADER_SIZE {
            return Err(Error::Frame(format!(
                "frame header needs {} bytes, got {}",
                FRAME_HEADER_SIZE,
                data.len()
            )));
        }

        let length = ((data[0] as u32) << 16) | ((data[1] as u32) << 8) | (data[2] as u32);
        let stream_id = u32::from_be_bytes([data[5], data[6], data[7], data[8]]) & STREAM_ID_MASK;

        Ok(Self {
            length,
            frame_type: data[3],
            flags: data[4],
            stream_id,
        })
    }

    /// Serialize into the 9-byte wire form.
    pub fn encode(&self) -> [u8; FRAME_HEADER_SIZE] {
        let len = self.length.to_be_bytes();
        let id = (self.stream_id & STREAM_ID_MASK).to_be_bytes();
        [len[1], len[2], len[3], self.frame_type, self.flags, id[0], id[1], id[2], id[3]]
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.encode());
    }

    /// Total frame size including header
    pub fn total_size(&self) -> usize {
        FRAME_HEADER_SIZE + self.length as usize
    }

    pub fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }

    pub fn is_end_stream(&self) -> bool {
        self.has_flag(flags::END_STREAM)
    }
}

/// A decoded frame. Built once at the codec boundary so dispatch is an
/// exhaustive match instead of chained type checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Headers {
        stream_id: u32,
        end_stream: bool,
        /// HPACK block with padding and priority fields removed.
        header_block: Vec<u8>,
    },
    Data {
        stream_id: u32,
        end_stream: bool,
        payload: Vec<u8>,
    },
    Ping {
        ack: bool,
        stream_id: u32,
        payload: [u8; PING_PAYLOAD_SIZE],
    },
    WindowUpdate {
        stream_id: u32,
        increment: u32,
    },
    RstStream {
        stream_id: u32,
        error_code: u32,
    },
    Settings {
        ack: bool,
        /// (identifier, value) pairs. Empty for ACK frames.
        settings: Vec<(u16, u32)>,
    },
    /// PRIORITY, GOAWAY, PUSH_PROMISE, CONTINUATION, extension frames.
    Unsupported {
        frame_type: u8,
        stream_id: u32,
    },
}

impl Frame {
    /// Decode one complete frame. `data` must hold exactly the header plus
    /// the declared payload.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let header = FrameHeader::parse(data)?;
        if data.len() != header.total_size() {
            return Err(Error::Frame(format!(
                "{} frame declares {} payload bytes but buffer holds {}",
                frame_type_name(header.frame_type),
                header.length,
                data.len() - FRAME_HEADER_SIZE
            )));
        }
        Self::from_parts(&header, data[FRAME_HEADER_SIZE..].to_vec())
    }

    /// Build a frame from an already parsed header and its payload.
    pub fn from_parts(header: &FrameHeader, payload: Vec<u8>) -> Result<Self> {
        trace!(
            frame_type = frame_type_name(header.frame_type),
            flags = header.flags,
            stream_id = header.stream_id,
            length = header.length,
            "decoding frame"
        );

        match header.frame_type {
            frame_type::HEADERS => Ok(Frame::Headers {
                stream_id: header.stream_id,
                end_stream: header.is_end_stream(),
                header_block: extract_headers_payload(header, payload)?,
            }),
            frame_type::DATA => Ok(Frame::Data {
                stream_id: header.stream_id,
                end_stream: header.is_end_stream(),
                payload: extract_data_payload(header, payload)?,
            }),
            frame_type::PING => {
                if payload.len() != PING_PAYLOAD_SIZE {
                    return Err(Error::Frame(format!(
                        "PING payload must be {} bytes, got {}",
                        PING_PAYLOAD_SIZE,
                        payload.len()
                    )));
                }
                let mut data = [0u8; PING_PAYLOAD_SIZE];
                data.copy_from_slice(&payload);
                Ok(Frame::Ping {
                    ack: header.has_flag(flags::ACK),
                    stream_id: header.stream_id,
                    payload: data,
                })
            }
            frame_type::WINDOW_UPDATE => {
                let increment = read_u32(&payload, "WINDOW_UPDATE")? & STREAM_ID_MASK;
                Ok(Frame::WindowUpdate {
                    stream_id: header.stream_id,
                    increment,
                })
            }
            frame_type::RST_STREAM => Ok(Frame::RstStream {
                stream_id: header.stream_id,
                error_code: read_u32(&payload, "RST_STREAM")?,
            }),
            frame_type::SETTINGS => {
                let ack = header.has_flag(flags::ACK);
                if header.stream_id != 0 || payload.len() % 6 != 0 || (ack && !payload.is_empty()) {
                    return Err(Error::Frame(format!(
                        "malformed SETTINGS frame ({} bytes on stream {})",
                        payload.len(),
                        header.stream_id
                    )));
                }
                let settings = payload
                    .chunks_exact(6)
                    .map(|entry| {
                        let id = u16::from_be_bytes([entry[0], entry[1]]);
                        let value = u32::from_be_bytes([entry[2], entry[3], entry[4], entry[5]]);
                        (id, value)
                    })
                    .collect();
                Ok(Frame::Settings { ack, settings })
            }
            other => Ok(Frame::Unsupported {
                frame_type: other,
                stream_id: header.stream_id,
            }),
        }
    }

    pub fn stream_id(&self) -> u32 {
        match self {
            Frame::Headers { stream_id, .. }
            | Frame::Data { stream_id, .. }
            | Frame::Ping { stream_id, .. }
            | Frame::WindowUpdate { stream_id, .. }
            | Frame::RstStream { stream_id, .. }
            | Frame::Unsupported { stream_id, .. } => *stream_id,
            Frame::Settings { .. } => 0,
        }
    }
}

fn read_u32(payload: &[u8], kind: &str) -> Result<u32> {
    if payload.len() != 4 {
        return Err(Error::Frame(format!(
            "{kind} payload must be 4 bytes, got {}",
            payload.len()
        )));
    }
    Ok(u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]))
}

/// Strip DATA padding. Takes ownership of the payload to avoid re-copying.
fn extract_data_payload(header: &FrameHeader, mut payload: Vec<u8>) -> Result<Vec<u8>> {
    if !header.has_flag(flags::PADDED) {
        return Ok(payload);
    }
    if payload.is_empty() {
        return Err(Error::Frame("PADDED DATA frame with no payload".to_string()));
    }
    let pad_length = payload[0] as usize;
    if pad_length >= payload.len() {
        return Err(Error::Frame("invalid padding length in DATA frame".to_string()));
    }
    payload.truncate(payload.len() - pad_length);
    payload.remove(0);
    Ok(payload)
}

/// Strip HEADERS padding and the priority block.
///
/// Padding may consume everything after the pad length byte and the priority
/// block, leaving an empty header block; more than that is an error.
fn extract_headers_payload(header: &FrameHeader, mut payload: Vec<u8>) -> Result<Vec<u8>> {
    let mut offset = 0;
    let mut pad_length = 0;

    if header.has_flag(flags::PADDED) {
        if payload.is_empty() {
            return Err(Error::Frame("PADDED HEADERS frame with no payload".to_string()));
        }
        pad_length = payload[0] as usize;
        offset = 1;
    }

    if header.has_flag(flags::PRIORITY) {
        // stream dependency (4 bytes) + weight (1 byte)
        offset += 5;
    }

    if offset > payload.len() {
        return Err(Error::Frame("PRIORITY HEADERS frame with insufficient data".to_string()));
    }
    if pad_length > payload.len() - offset {
        return Err(Error::Frame("invalid padding length in HEADERS frame".to_string()));
    }

    if offset == 0 && pad_length == 0 {
        return Ok(payload);
    }
    payload.truncate(payload.len() - pad_length);
    payload.drain(..offset);
    Ok(payload)
}

/// Check if data starts with the HTTP/2 connection preface
pub fn is_preface(data: &[u8]) -> bool {
    data.starts_with(CONNECTION_PREFACE)
}

/// Incremental frame splitter for input that may arrive in arbitrary pieces.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    preface_checked: bool,
    max_frame_size: usize,
}

impl FrameDecoder {
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            buffer: Vec::new(),
            preface_checked: false,
            max_frame_size,
        }
    }

    /// Append raw bytes and return every frame that is now complete. Bytes of
    /// a trailing partial frame stay buffered for the next call.
    pub fn decode(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);
        let mut frames = Vec::new();

        if !self.preface_checked {
            if self.buffer.len() < CONNECTION_PREFACE.len()
                && CONNECTION_PREFACE.starts_with(&self.buffer)
            {
                return Ok(frames);
            }
            if is_preface(&self.buffer) {
                self.buffer.drain(..CONNECTION_PREFACE.len());
            }
            self.preface_checked = true;
        }

        while self.buffer.len() >= FRAME_HEADER_SIZE {
            let header = FrameHeader::parse(&self.buffer)?;
            if header.length as usize > self.max_frame_size {
                return Err(Error::FrameSize {
                    length: header.length as usize,
                    max: self.max_frame_size,
                });
            }

            let total_size = header.total_size();
            if self.buffer.len() < total_size {
                break;
            }

            // split_off leaves [0..total_size] in self.buffer and returns the rest
            let remainder = self.buffer.split_off(total_size);
            let mut frame_data = std::mem::replace(&mut self.buffer, remainder);
            frame_data.drain(..FRAME_HEADER_SIZE);
            frames.push(Frame::from_parts(&header, frame_data)?);
        }

        Ok(frames)
    }

    /// Bytes held back waiting for the rest of a frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

// ============================================================================
// Frame builders
// ============================================================================

fn frame_with_payload(frame_type: u8, flags: u8, stream_id: u32, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    FrameHeader::new(frame_type, payload.len() as u32, flags, stream_id).write_to(&mut frame);
    frame.extend_from_slice(payload);
    frame
}

fn check_length(len: usize) -> Result<()> {
    if len > MAX_FRAME_LENGTH {
        return Err(Error::FrameSize {
            length: len,
            max: MAX_FRAME_LENGTH,
        });
    }
    Ok(())
}

/// Append a HEADERS frame carrying a complete header block (END_HEADERS set).
pub fn write_headers_frame(out: &mut Vec<u8>, stream_id: u32, header_block: &[u8], end_stream: bool) -> Result<()> {
    check_length(header_block.len())?;
    let mut frame_flags = flags::END_HEADERS;
    if end_stream {
        frame_flags |= flags::END_STREAM;
    }
    FrameHeader::new(frame_type::HEADERS, header_block.len() as u32, frame_flags, stream_id).write_to(out);
    out.extend_from_slice(header_block);
    Ok(())
}

/// Append a DATA frame.
pub fn write_data_frame(out: &mut Vec<u8>, stream_id: u32, payload: &[u8], end_stream: bool) -> Result<()> {
    check_length(payload.len())?;
    let frame_flags = if end_stream { flags::END_STREAM } else { 0 };
    FrameHeader::new(frame_type::DATA, payload.len() as u32, frame_flags, stream_id).write_to(out);
    out.extend_from_slice(payload);
    Ok(())
}

/// Create a PING ACK echoing the peer's payload and stream id.
pub fn ping_ack(stream_id: u32, payload: [u8; PING_PAYLOAD_SIZE]) -> Vec<u8> {
    frame_with_payload(frame_type::PING, flags::ACK, stream_id, &payload)
}

/// Create a WINDOW_UPDATE frame. Stream 0 updates the connection window.
pub fn window_update(stream_id: u32, increment: u32) -> Vec<u8> {
    let increment = increment & STREAM_ID_MASK;
    frame_with_payload(frame_type::WINDOW_UPDATE, 0, stream_id, &increment.to_be_bytes())
}

pub fn rst_stream(stream_id: u32, error_code: u32) -> Vec<u8> {
    frame_with_payload(frame_type::RST_STREAM, 0, stream_id, &error_code.to_be_bytes())
}

/// Create a GOAWAY frame (stream 0).
pub fn goaway(last_stream_id: u32, error_code: u32) -> Vec<u8> {
    let mut payload = [0u8; 8];
    payload[..4].copy_from_slice(&(last_stream_id & STREAM_ID_MASK).to_be_bytes());
    payload[4..].copy_from_slice(&error_code.to_be_bytes());
    frame_with_payload(frame_type::GOAWAY, 0, 0, &payload)
}

/// Create a SETTINGS frame from (identifier, value) pairs.
pub fn settings(entries: &[(u16, u32)]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(entries.len() * 6);
    for (id, value) in entries {
        payload.extend_from_slice(&id.to_be_bytes());
        payload.extend_from_slice(&value.to_be_bytes());
    }
    frame_with_payload(frame_type::SETTINGS, 0, 0, &payload)
}

pub fn settings_ack() -> Vec<u8> {
    frame_with_payload(frame_type::SETTINGS, flags::ACK, 0, &[])
}
