//! Error taxonomy for the framing layer.
//!
//! Every error is scoped to a connection or to a single stream; nothing here
//! aborts the process. [`Error::is_stream_scoped`] tells the dispatch loop
//! whether it may log the error and keep reading frames.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed frame header or a length that disagrees with the buffer.
    #[error("framing error: {0}")]
    Frame(String),

    /// Declared frame length exceeds the configured maximum.
    #[error("frame of {length} bytes exceeds max frame size {max}")]
    FrameSize { length: usize, max: usize },

    /// DATA (or another stream frame) for a stream with no request context.
    #[error("frame for unknown stream {0}")]
    UnknownStream(u32),

    /// HEADERS for a stream id that already has a request context.
    #[error("stream {0} already exists")]
    DuplicateStream(u32),

    /// Any other stream-level protocol violation.
    #[error("protocol error on stream {stream_id}: {reason}")]
    StreamProtocol { stream_id: u32, reason: String },

    /// HPACK decode failure; the connection's dynamic table may be out of sync.
    #[error("HPACK decode error on stream {stream_id}: {reason}")]
    Compression { stream_id: u32, reason: String },

    #[error("response has {count} header fields, max {max}")]
    TooManyHeaders { count: usize, max: usize },

    #[error("header block of {length} bytes does not fit in one frame (max {max})")]
    HeaderBlockTooLarge { length: usize, max: usize },

    /// Header assembly was requested twice for the same response.
    #[error("headers already sent on stream {0}")]
    HeadersAlreadySent(u32),

    #[error("write failed on stream {stream_id}")]
    Write {
        stream_id: u32,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// True for errors that only affect one stream: the frame is dropped and
    /// the connection keeps going.
    pub fn is_stream_scoped(&self) -> bool {
        matches!(
            self,
            Error::UnknownStream(_) | Error::DuplicateStream(_) | Error::StreamProtocol { .. }
        )
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
