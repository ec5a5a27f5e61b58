//! Server and connection configuration.

use std::net::SocketAddr;

/// Dynamic table size used by both HPACK directions.
pub const HEADER_TABLE_SIZE: usize = 4096;

/// Default SETTINGS_MAX_FRAME_SIZE (RFC 7540 Section 6.5.2).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16_384;

/// Initial flow-control window (RFC 7540 Section 6.9.2).
pub const DEFAULT_WINDOW_SIZE: u32 = 65_535;

/// Largest legal flow-control window, 2^31 - 1.
pub const MAX_WINDOW_SIZE: u32 = 0x7FFF_FFFF;

/// Upper bound on header fields in one response.
pub const MAX_HEADER_FIELDS: usize = 128;

pub const SERVER_SOFTWARE: &str = "h2-stream-server";

/// Settings shared by every connection of a server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Value of the `server` response header and the `server_software` param.
    pub server_software: String,
    pub header_table_size: usize,
    /// Frames declaring a larger payload are rejected; outbound DATA is split
    /// at this size.
    pub max_frame_size: usize,
    pub max_header_fields: usize,
    /// Parse `application/x-www-form-urlencoded` bodies into `Request::post`.
    pub parse_post: bool,
    /// Answer every consumed DATA payload with WINDOW_UPDATE frames for the
    /// connection and the stream. Off by default; the event loop may manage
    /// receive windows itself.
    pub replenish_window: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_software: SERVER_SOFTWARE.to_string(),
            header_table_size: HEADER_TABLE_SIZE,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_header_fields: MAX_HEADER_FIELDS,
            parse_post: true,
            replenish_window: false,
        }
    }
}

impl ServerConfig {
    pub fn with_server_software(mut self, name: impl Into<String>) -> Self {
        self.server_software = name.into();
        self
    }

    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    pub fn with_parse_post(mut self, enabled: bool) -> Self {
        self.parse_post = enabled;
        self
    }

    pub fn with_replenish_window(mut self, enabled: bool) -> Self {
        self.replenish_window = enabled;
        self
    }
}

/// Identity of one accepted connection, as reported by the event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub id: u64,
    pub remote_addr: SocketAddr,
    pub server_port: u16,
}

impl ConnectionInfo {
    pub fn new(id: u64, remote_addr: SocketAddr, server_port: u16) -> Self {
        Self { id, remote_addr, server_port }
    }
}
