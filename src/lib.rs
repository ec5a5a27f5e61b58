//! h2-stream-server: server-side HTTP/2 for embedded application servers
//!
//! This crate sits between an event loop that owns the sockets and an
//! application that answers requests. It turns raw connection bytes into
//! complete requests and serializes responses back into frames, without
//! doing any I/O of its own.
//!
//! # Features
//!
//! - **Sans-I/O Design**: bytes in through [`Connection::feed`], bytes out
//!   through a [`Transport`] you implement
//! - **Frames**: HEADERS, DATA, PING, WINDOW_UPDATE, RST_STREAM, SETTINGS;
//!   everything else is skipped
//! - **HPACK Support**: header compression via fluke-hpack, one dynamic
//!   table per connection
//! - **Request Reconstruction**: pseudo-headers, query strings, cookies,
//!   urlencoded and multipart bodies
//! - **Response Emission**: default headers, one HEADERS frame and DATA
//!   frames split at the peer's max frame size
//!
//! # Quick Start
//!
//! ```rust
//! use std::io;
//!
//! use h2_stream_server::{Connection, ConnectionInfo, HandlerError, Request, Response, ServerConfig, Transport};
//!
//! struct Socket(Vec<u8>);
//!
//! impl Transport for Socket {
//!     fn send(&mut self, _connection_id: u64, data: &[u8]) -> io::Result<()> {
//!         self.0.extend_from_slice(data);
//!         Ok(())
//!     }
//! }
//!
//! let info = ConnectionInfo::new(1, "127.0.0.1:50000".parse().unwrap(), 443);
//! let mut conn = Connection::new(info, ServerConfig::default(), Socket(Vec::new()));
//!
//! let mut pending = Vec::new();
//! let mut handler = |request: Request, mut response: Response| -> Result<(), HandlerError> {
//!     response.set_body(format!("you asked for {}", request.path()));
//!     pending.push(response);
//!     Ok(())
//! };
//!
//! // PING on stream 0 is answered immediately
//! let ping = [0, 0, 8, 6, 0, 0, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8];
//! conn.feed(&ping, &mut handler).unwrap();
//! assert_eq!(conn.transport().0.len(), ping.len());
//!
//! for mut response in pending {
//!     conn.send_response(&mut response).unwrap();
//! }
//! ```
//!
//! # Architecture
//!
//! - [`frame`]: 9-byte frame header codec, typed [`Frame`], frame builders
//! - [`hpack`]: HPACK decoder/encoder wrappers
//! - [`request`] and [`body`]: request reconstruction and body parsing
//! - [`headers`] and [`response`]: response header assembly
//! - [`connection`]: dispatch state machine and response emitter
//!
//! It does NOT provide TCP, TLS, priority trees, server push or
//! CONTINUATION reassembly.

pub mod body;
pub mod config;
pub mod connection;
pub mod error;
pub mod frame;
pub mod headers;
pub mod hpack;
pub mod request;
pub mod response;
pub mod stream;

pub use body::{MultipartParser, UploadedFile};
pub use config::{ConnectionInfo, ServerConfig};
pub use connection::{Connection, HandlerError, RequestHandler, Transport};
pub use error::{Error, Result};
pub use frame::{error_code, flags, frame_type, settings_id, Frame, FrameDecoder, FrameHeader, CONNECTION_PREFACE};
pub use hpack::{DecodedField, HeaderField, HpackDecoder, HpackEncoder, PseudoHeader};
pub use request::{HeaderMap, Request, RequestContext, ServerParams};
pub use response::{ContentEncoding, Response};
pub use stream::{StreamState, StreamTable};
