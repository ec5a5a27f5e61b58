//! Request reconstruction from HEADERS and DATA frames.

use std::collections::HashMap;
use std::net::SocketAddr;

use cookie::Cookie;
use tracing::{debug, trace, warn};

use crate::body::{self, MultipartParser, UploadedFile};
use crate::config::{ServerConfig, DEFAULT_WINDOW_SIZE};
use crate::hpack::{DecodedField, HeaderField, PseudoHeader};
use crate::stream::StreamState;

/// Request header fields with lower-case names, in arrival order.
///
/// `get` returns the last value under a name, which is what a plain map would
/// keep; `get_all` still has every value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<HeaderField>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let mut name = name.into();
        name.make_ascii_lowercase();
        self.entries.push(HeaderField { name, value: value.into() });
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|f| f.name.eq_ignore_ascii_case(name))
            .map(|f| f.value.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |f| f.name.eq_ignore_ascii_case(name))
            .map(|f| f.value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeaderField> {
        self.entries.iter()
    }
}

/// Server-side facts about the request, the `$_SERVER`-style parameters an
/// application server exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerParams {
    pub request_method: String,
    pub request_uri: String,
    pub query_string: Option<String>,
    /// Unix seconds at which the HEADERS frame arrived.
    pub request_time: i64,
    pub server_port: u16,
    pub remote_port: u16,
    pub remote_addr: String,
    pub server_protocol: &'static str,
    pub server_software: String,
}

impl ServerParams {
    fn new(remote: SocketAddr, server_port: u16, request_time: i64, server_software: &str) -> Self {
        Self {
            request_method: String::new(),
            request_uri: String::new(),
            query_string: None,
            request_time,
            server_port,
            remote_port: remote.port(),
            remote_addr: remote.ip().to_string(),
            server_protocol: "HTTP/2",
            server_software: server_software.to_string(),
        }
    }
}

/// A fully reconstructed request, handed to the application.
#[derive(Debug, Clone)]
pub struct Request {
    pub stream_id: u32,
    pub headers: HeaderMap,
    /// Query parameters from the `:path` query component.
    pub get: HashMap<String, String>,
    pub cookies: HashMap<String, String>,
    /// Form fields from urlencoded or multipart bodies.
    pub post: HashMap<String, String>,
    pub files: HashMap<String, UploadedFile>,
    /// Raw body bytes as received.
    pub body: Vec<u8>,
    pub server: ServerParams,
}

impl Request {
    pub fn method(&self) -> &str {
        &self.server.request_method
    }

    /// Path without the query component.
    pub fn path(&self) -> &str {
        &self.server.request_uri
    }

    pub fn query_string(&self) -> Option<&str> {
        self.server.query_string.as_deref()
    }

    pub fn host(&self) -> Option<&str> {
        self.headers.get("host")
    }
}

/// A request under construction, owned by the stream table until END_STREAM.
#[derive(Debug)]
pub struct RequestContext {
    request: Request,
    state: StreamState,
    form_urlencoded: bool,
    multipart: Option<MultipartParser>,
    /// Peer-granted send window for this stream, from WINDOW_UPDATE.
    pub send_window: u32,
}

impl RequestContext {
    pub fn new(
        stream_id: u32,
        remote: SocketAddr,
        server_port: u16,
        request_time: i64,
        config: &ServerConfig,
    ) -> Self {
        Self {
            request: Request {
                stream_id,
                headers: HeaderMap::new(),
                get: HashMap::new(),
                cookies: HashMap::new(),
                post: HashMap::new(),
                files: HashMap::new(),
                body: Vec::new(),
                server: ServerParams::new(remote, server_port, request_time, &config.server_software),
            },
            state: StreamState::Idle,
            form_urlencoded: false,
            multipart: None,
            send_window: DEFAULT_WINDOW_SIZE,
        }
    }

    pub fn stream_id(&self) -> u32 {
        self.request.stream_id
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn is_form_urlencoded(&self) -> bool {
        self.form_urlencoded
    }

    pub fn has_multipart_parser(&self) -> bool {
        self.multipart.is_some()
    }

    /// Apply one decoded header field.
    pub fn apply_field(&mut self, field: DecodedField) {
        match field {
            DecodedField::Pseudo(kind, value) => self.apply_pseudo(kind, value),
            DecodedField::Regular(field) => self.apply_header(field),
        }
    }

    fn apply_pseudo(&mut self, kind: PseudoHeader, value: String) {
        match kind {
            PseudoHeader::Method => self.request.server.request_method = value,
            PseudoHeader::Path => match value.split_once('?') {
                Some((path, query)) => {
                    self.request.get = body::parse_urlencoded(query.as_bytes());
                    self.request.server.query_string = Some(query.to_string());
                    self.request.server.request_uri = path.to_string();
                }
                None => self.request.server.request_uri = value,
            },
            PseudoHeader::Authority => self.request.headers.append("host", value),
        }
    }

    fn apply_header(&mut self, field: HeaderField) {
        if field.name == "content-type" {
            let value = field.value.as_str();
            if starts_with_ignore_case(value, "application/x-www-form-urlencoded") {
                self.form_urlencoded = true;
            } else if starts_with_ignore_case(value, "multipart/form-data") {
                match body::multipart_boundary(value) {
                    Some(boundary) => self.multipart = Some(MultipartParser::new(boundary)),
                    None => warn!(stream_id = self.stream_id(), "multipart content-type without boundary"),
                }
            }
        } else if field.name == "cookie" {
            self.apply_cookie(&field.value);
            return;
        }
        self.request.headers.append(field.name, field.value);
    }

    fn apply_cookie(&mut self, value: &str) {
        for cookie in Cookie::split_parse(value) {
            match cookie {
                Ok(cookie) => {
                    self.request
                        .cookies
                        .insert(cookie.name().to_string(), cookie.value().to_string());
                }
                Err(e) => trace!(stream_id = self.stream_id(), error = %e, "skipping malformed cookie pair"),
            }
        }
    }

    /// Append a field from a trailer block. Trailers only extend the header
    /// map; body handling was settled by the leading block.
    pub fn append_trailer(&mut self, field: HeaderField) {
        self.request.headers.append(field.name, field.value);
    }

    /// Mark the header block as fully applied.
    pub fn headers_done(&mut self) {
        self.state = StreamState::HeadersReceived;
    }

    /// Append a DATA payload to the body.
    pub fn push_data(&mut self, data: &[u8]) {
        self.state = StreamState::DataAccumulating;
        self.request.body.extend_from_slice(data);
    }

    /// Run body parsing and return the finished request.
    pub fn finish(mut self, config: &ServerConfig) -> Request {
        let stream_id = self.stream_id();
        self.state = StreamState::Complete;

        if self.form_urlencoded {
            if config.parse_post {
                self.request.post = body::parse_urlencoded(&self.request.body);
            }
        } else if let Some(mut parser) = self.multipart.take() {
            let consumed = parser.execute(&self.request.body);
            if consumed != self.request.body.len() {
                warn!(
                    stream_id,
                    consumed,
                    length = self.request.body.len(),
                    "failed to parse multipart body"
                );
            }
            let (fields, files) = parser.into_parts();
            self.request.post = fields;
            self.request.files = files;
        }

        debug!(
            stream_id,
            method = %self.request.server.request_method,
            path = %self.request.server.request_uri,
            body_len = self.request.body.len(),
            "request complete"
        );
        self.request
    }
}

fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value.len() >= prefix.len()
        && value.is_char_boundary(prefix.len())
        && value[..prefix.len()].eq_ignore_ascii_case(prefix)
}
