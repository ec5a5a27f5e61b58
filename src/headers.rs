//! Response header assembly.
//!
//! Builds the ordered field list handed to the HPACK encoder: `:status`
//! first, the application's headers, then whichever of `server`,
//! `content-length` (or `allow` for OPTIONS), `date` and `content-type` the
//! application left out, then cookies and `content-encoding`.
//!
//! Well-known names are matched by exact lower-case comparison. A header set
//! as `Content-Type` is passed through but does not suppress the default
//! `content-type`.

use chrono::{DateTime, Utc};

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::hpack::HeaderField;
use crate::response::Response;

/// `allow` value sent in answer to OPTIONS.
pub const ALLOWED_METHODS: &str = "GET, POST, PUT, PATCH, DELETE, HEAD, OPTIONS";

pub const DEFAULT_CONTENT_TYPE: &str = "text/html";

/// IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
pub const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

pub fn format_http_date(now: DateTime<Utc>) -> String {
    now.format(HTTP_DATE_FORMAT).to_string()
}

#[derive(Debug, Default, Clone, Copy)]
struct Supplied {
    server: bool,
    content_length: bool,
    date: bool,
    content_type: bool,
}

/// Assemble the response header list and mark the response's headers sent.
///
/// Fails with [`Error::HeadersAlreadySent`] when called again for the same
/// response.
pub fn assemble(response: &mut Response, config: &ServerConfig, now: DateTime<Utc>) -> Result<Vec<HeaderField>> {
    if response.is_header_sent() {
        return Err(Error::HeadersAlreadySent(response.stream_id()));
    }

    if response.status == 0 {
        response.status = 200;
    }

    let is_options = response.method().eq_ignore_ascii_case("OPTIONS");
    let content_length = response.payload().len().to_string();
    let date = format_http_date(now);

    let mut fields = vec![HeaderField::new(":status", response.status.to_string())];

    match response.headers() {
        Some(headers) => {
            let mut supplied = Supplied::default();
            for (name, value) in headers {
                match name.as_str() {
                    "server" => supplied.server = true,
                    "content-length" => supplied.content_length = true,
                    "date" => supplied.date = true,
                    "content-type" => supplied.content_type = true,
                    _ => {}
                }
                fields.push(HeaderField::new(name.as_str(), value.as_str()));
            }

            if !supplied.server {
                fields.push(HeaderField::new("server", config.server_software.as_str()));
            }
            if is_options {
                fields.push(HeaderField::new("allow", ALLOWED_METHODS));
            } else if !supplied.content_length {
                fields.push(HeaderField::new("content-length", content_length));
            }
            if !supplied.date {
                fields.push(HeaderField::new("date", date));
            }
            if !supplied.content_type {
                fields.push(HeaderField::new("content-type", DEFAULT_CONTENT_TYPE));
            }
        }
        None => {
            fields.push(HeaderField::new("server", config.server_software.as_str()));
            fields.push(HeaderField::new("content-type", DEFAULT_CONTENT_TYPE));
            fields.push(HeaderField::new("date", date));
            if is_options {
                fields.push(HeaderField::new("allow", ALLOWED_METHODS));
            } else {
                fields.push(HeaderField::new("content-length", content_length));
            }
        }
    }

    for cookie in response.cookies() {
        fields.push(HeaderField::new("set-cookie", cookie.as_str()));
    }

    if let Some(encoding) = response.content_encoding() {
        fields.push(HeaderField::new("content-encoding", encoding.as_str()));
    }

    response.mark_header_sent(true);
    Ok(fields)
}
