//! Request body parsers: URL-encoded forms and `multipart/form-data`.

use std::collections::HashMap;

use tracing::trace;

/// Parse `a=1&b=2` style data (query strings and urlencoded bodies).
/// Later duplicates overwrite earlier ones.
pub fn parse_urlencoded(data: &[u8]) -> HashMap<String, String> {
    url::form_urlencoded::parse(data).into_owned().collect()
}

/// Extract the boundary from a `multipart/form-data; boundary=...` value.
pub fn multipart_boundary(content_type: &str) -> Option<&str> {
    content_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.trim().split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| value.trim().trim_matches('"'))
        .filter(|boundary| !boundary.is_empty())
}

/// A file part of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// `multipart/form-data` parser for one request.
///
/// Created as soon as the request's `content-type` header is seen and run
/// once over the complete body. Form fields and files are collected into
/// [`MultipartParser::fields`] and [`MultipartParser::files`].
#[derive(Debug)]
pub struct MultipartParser {
    /// `--` + boundary
    delimiter: Vec<u8>,
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

struct PartHeaders {
    name: Option<String>,
    filename: Option<String>,
    content_type: Option<String>,
}

impl MultipartParser {
    pub fn new(boundary: &str) -> Self {
        let mut delimiter = Vec::with_capacity(boundary.len() + 2);
        delimiter.extend_from_slice(b"--");
        delimiter.extend_from_slice(boundary.as_bytes());
        Self {
            delimiter,
            fields: HashMap::new(),
            files: HashMap::new(),
        }
    }

    pub fn boundary(&self) -> &[u8] {
        &self.delimiter[2..]
    }

    /// Parse `body` and return how many bytes were consumed. A well-formed
    /// body is consumed entirely; parsing stops at the first malformed part.
    pub fn execute(&mut self, body: &[u8]) -> usize {
        let Some(mut pos) = find(body, &self.delimiter, 0) else {
            return 0;
        };

        loop {
            let after_delim = pos + self.delimiter.len();
            let rest = &body[after_delim..];
            if rest.starts_with(b"--") {
                // closing delimiter; the epilogue (usually CRLF) is consumed too
                return body.len();
            }
            if !rest.starts_with(b"\r\n") {
                return pos;
            }

            let headers_start = after_delim + 2;
            let Some(headers_end) = find(body, b"\r\n\r\n", headers_start) else {
                return pos;
            };
            let content_start = headers_end + 4;

            let mut next_delim = Vec::with_capacity(self.delimiter.len() + 2);
            next_delim.extend_from_slice(b"\r\n");
            next_delim.extend_from_slice(&self.delimiter);
            let Some(content_end) = find(body, &next_delim, content_start) else {
                return pos;
            };

            let headers = parse_part_headers(&body[headers_start..headers_end]);
            self.store_part(headers, &body[content_start..content_end]);
            pos = content_end + 2;
        }
    }

    fn store_part(&mut self, headers: PartHeaders, content: &[u8]) {
        let Some(name) = headers.name else {
            trace!("multipart part without a name, skipped");
            return;
        };
        match headers.filename {
            Some(filename) => {
                self.files.insert(
                    name,
                    UploadedFile {
                        filename,
                        content_type: headers.content_type,
                        data: content.to_vec(),
                    },
                );
            }
            None => {
                self.fields.insert(name, String::from_utf8_lossy(content).into_owned());
            }
        }
    }

    pub fn fields(&self) -> &HashMap<String, String> {
        &self.fields
    }

    pub fn files(&self) -> &HashMap<String, UploadedFile> {
        &self.files
    }

    pub fn into_parts(self) -> (HashMap<String, String>, HashMap<String, UploadedFile>) {
        (self.fields, self.files)
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

fn parse_part_headers(raw: &[u8]) -> PartHeaders {
    let mut headers = PartHeaders {
        name: None,
        filename: None,
        content_type: None,
    };
    let raw = String::from_utf8_lossy(raw);
    for line in raw.split("\r\n") {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        if key.eq_ignore_ascii_case("content-disposition") {
            for param in value.split(';').skip(1) {
                if let Some((k, v)) = param.trim().split_once('=') {
                    let v = v.trim().trim_matches('"').to_string();
                    match k.trim().to_ascii_lowercase().as_str() {
                        "name" => headers.name = Some(v),
                        "filename" => headers.filename = Some(v),
                        _ => {}
                    }
                }
            }
        } else if key.eq_ignore_ascii_case("content-type") {
            headers.content_type = Some(value.to_string());
        }
    }
    headers
}
