//! Response descriptor filled by the application and consumed once by the
//! emitter.

/// Body encoding applied by the (external) compressor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    Gzip,
    Deflate,
}

impl ContentEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentEncoding::Gzip => "gzip",
            ContentEncoding::Deflate => "deflate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Compressed {
    pub(crate) encoding: ContentEncoding,
    pub(crate) payload: Vec<u8>,
}

/// Response for one stream.
///
/// Created empty by the connection and handed to the request handler next to
/// the request. Not `Clone`: there is exactly one descriptor per stream, and
/// its header-sent flag guards against emitting twice.
#[derive(Debug)]
pub struct Response {
    stream_id: u32,
    method: String,
    /// 0 means unset; the assembler sends 200.
    pub status: u16,
    headers: Option<Vec<(String, String)>>,
    cookies: Vec<String>,
    compressed: Option<Compressed>,
    body: Vec<u8>,
    header_sent: bool,
}

impl Response {
    pub(crate) fn new(stream_id: u32, method: impl Into<String>) -> Self {
        Self {
            stream_id,
            method: method.into(),
            status: 0,
            headers: None,
            cookies: Vec::new(),
            compressed: None,
            body: Vec::new(),
            header_sent: false,
        }
    }

    pub fn stream_id(&self) -> u32 {
        self.stream_id
    }

    /// Method of the request this response answers.
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn set_status(&mut self, status: u16) -> &mut Self {
        self.status = status;
        self
    }

    /// Set a response header, replacing an earlier value under the same name.
    /// The name is kept as given.
    pub fn header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let name = name.into();
        let value = value.into();
        let headers = self.headers.get_or_insert_with(Vec::new);
        match headers.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => headers.push((name, value)),
        }
        self
    }

    /// Headers supplied by the application, `None` when it never set one.
    pub fn headers(&self) -> Option<&[(String, String)]> {
        self.headers.as_deref()
    }

    /// Add one `set-cookie` value, already serialized.
    pub fn cookie(&mut self, set_cookie: impl Into<String>) -> &mut Self {
        self.cookies.push(set_cookie.into());
        self
    }

    pub fn cookies(&self) -> &[String] {
        &self.cookies
    }

    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) -> &mut Self {
        self.body = body.into();
        self
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Send `payload` (the body compressed by the caller) instead of the
    /// plain body, announced with `content-encoding`.
    pub fn set_compressed(&mut self, encoding: ContentEncoding, payload: impl Into<Vec<u8>>) -> &mut Self {
        self.compressed = Some(Compressed {
            encoding,
            payload: payload.into(),
        });
        self
    }

    pub fn content_encoding(&self) -> Option<ContentEncoding> {
        self.compressed.as_ref().map(|c| c.encoding)
    }

    /// Bytes that go into the DATA frames.
    pub fn payload(&self) -> &[u8] {
        match &self.compressed {
            Some(c) => &c.payload,
            None => &self.body,
        }
    }

    pub fn is_header_sent(&self) -> bool {
        self.header_sent
    }

    pub(crate) fn mark_header_sent(&mut self, sent: bool) {
        self.header_sent = sent;
    }
}
