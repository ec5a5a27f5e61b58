//! HPACK: Header Compression for HTTP/2 (RFC 7541)
//!
//! Thin wrapper around `fluke-hpack`. The decoder lives as long as the
//! connection because the peer's encoder evolves the dynamic table across
//! header blocks. Encoders are short-lived: one per response.

use std::borrow::Cow;

use tracing::trace;

use crate::config::{HEADER_TABLE_SIZE, MAX_HEADER_FIELDS};
use crate::error::{Error, Result};

/// A header name/value pair as it goes on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    pub name: String,
    pub value: String,
}

impl HeaderField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Request pseudo-headers the server acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PseudoHeader {
    Method,
    Path,
    Authority,
}

impl PseudoHeader {
    /// Match a pseudo-header name without its leading colon.
    fn from_name(name: &[u8]) -> Option<Self> {
        if name.eq_ignore_ascii_case(b"method") {
            Some(Self::Method)
        } else if name.eq_ignore_ascii_case(b"path") {
            Some(Self::Path)
        } else if name.eq_ignore_ascii_case(b"authority") {
            Some(Self::Authority)
        } else {
            None
        }
    }
}

/// One classified field out of a request header block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedField {
    Pseudo(PseudoHeader, String),
    Regular(HeaderField),
}

/// Per-connection HPACK decoder.
pub struct HpackDecoder {
    inner: fluke_hpack::Decoder<'static>,
    table_size: usize,
}

impl std::fmt::Debug for HpackDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HpackDecoder")
            .field("table_size", &self.table_size)
            .finish()
    }
}

impl Default for HpackDecoder {
    fn default() -> Self {
        Self::new(HEADER_TABLE_SIZE)
    }
}

impl HpackDecoder {
    pub fn new(table_size: usize) -> Self {
        let mut inner = fluke_hpack::Decoder::new();
        inner.set_max_allowed_table_size(table_size);
        Self { inner, table_size }
    }

    /// Decode one complete header block, handing each field to `emit` as
    /// soon as the engine produces it.
    ///
    /// Pseudo-headers other than `:method`, `:path` and `:authority` are
    /// dropped. On failure, fields emitted before the error have already been
    /// delivered, and the dynamic table may no longer match the peer's.
    pub fn decode<F>(&mut self, stream_id: u32, block: &[u8], mut emit: F) -> Result<()>
    where
        F: FnMut(DecodedField),
    {
        self.inner
            .decode_with_cb(block, |name: Cow<[u8]>, value: Cow<[u8]>| {
                let value = String::from_utf8_lossy(&value).into_owned();
                if let Some(pseudo) = name.strip_prefix(b":") {
                    match PseudoHeader::from_name(pseudo) {
                        Some(kind) => emit(DecodedField::Pseudo(kind, value)),
                        None => trace!(
                            stream_id,
                            name = %String::from_utf8_lossy(&name),
                            "ignoring pseudo-header"
                        ),
                    }
                } else {
                    let name = String::from_utf8_lossy(&name).into_owned();
                    emit(DecodedField::Regular(HeaderField { name, value }));
                }
            })
            .map_err(|e| Error::Compression {
                stream_id,
                reason: format!("{e:?}"),
            })?;

        // Re-applied after every block regardless of size updates the peer
        // sent inside it.
        self.inner.set_max_table_size(self.table_size);
        Ok(())
    }

    /// Decode into a list, for callers that don't need streaming.
    pub fn decode_to_vec(&mut self, stream_id: u32, block: &[u8]) -> Result<Vec<DecodedField>> {
        let mut fields = Vec::new();
        self.decode(stream_id, block, |field| fields.push(field))?;
        Ok(fields)
    }
}

/// HPACK encoder for one response header block.
///
/// Built fresh for every response. Each block then only references static
/// entries and entries it inserted itself, which are the newest entries in
/// the peer's table as well, so nothing has to be kept in sync between
/// responses.
pub struct HpackEncoder {
    inner: fluke_hpack::Encoder<'static>,
    max_fields: usize,
}

impl std::fmt::Debug for HpackEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HpackEncoder").finish()
    }
}

impl Default for HpackEncoder {
    fn default() -> Self {
        Self::new(HEADER_TABLE_SIZE, MAX_HEADER_FIELDS)
    }
}

impl HpackEncoder {
    pub fn new(table_size: usize, max_fields: usize) -> Self {
        let mut inner = fluke_hpack::Encoder::new();
        inner.set_max_table_size(table_size);
        Self { inner, max_fields }
    }

    /// Encode headers into an HPACK header block.
    pub fn encode(&mut self, headers: &[HeaderField]) -> Result<Vec<u8>> {
        if headers.len() > self.max_fields {
            return Err(Error::TooManyHeaders {
                count: headers.len(),
                max: self.max_fields,
            });
        }
        let pairs: Vec<(&[u8], &[u8])> = headers
            .iter()
            .map(|h| (h.name.as_bytes(), h.value.as_bytes()))
            .collect();
        Ok(self.inner.encode(pairs))
    }
}
