//! Response construction: status-line/header formatting, MIME inference,
//! directory-listing HTML, and default error bodies.
//!
//! MIME table and directory-listing markup are grounded exactly in
//! `original_source/src/http_router.c` (`get_mime_type`,
//! `handle_dir_request`, `send_error_response`).

/// A response built up by a Router before being handed to
/// `Connection::send`. File bodies are streamed directly by the router
/// through the connection instead of being buffered here — see
/// `crate::router::static_file`.
#[derive(Debug)]
pub struct HttpResponse {
    pub status_code: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status_code: u16, status_text: impl Into<String>) -> Self {
        Self {
            status_code,
            status_text: status_text.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn status(status_code: u16) -> Self {
        Self::new(status_code, status_text(status_code))
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn content_type(self, mime: &str) -> Self {
        self.header("Content-Type", mime)
    }

    /// Serialize status line and headers (not the body) to bytes, adding
    /// `Content-Length` if not already set. Callers decide separately
    /// whether to write the body afterward — `HEAD` responses send this and
    /// nothing else, even though `Content-Length` still reflects the
    /// GET-equivalent size.
    pub fn head_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128 + self.headers.len() * 32);
        out.extend_from_slice(
            format!("HTTP/1.1 {} {}\r\n", self.status_code, self.status_text).as_bytes(),
        );
        let has_content_length = self
            .headers
            .iter()
            .any(|(k, _)| k.eq_ignore_ascii_case("Content-Length"));
        for (k, v) in &self.headers {
            out.extend_from_slice(format!("{}: {}\r\n", k, v).as_bytes());
        }
        if !has_content_length {
            out.extend_from_slice(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        out
    }

    /// Full response (headers + body) as one buffer, for responses short
    /// enough to not warrant streaming.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.head_bytes();
        out.extend_from_slice(&self.body);
        out
    }
}

pub fn status_text(code: u16) -> &'static str {
    match code {
        200 => "OK",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        413 => "Payload Too Large",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        505 => "HTTP Version Not Supported",
        _ => "Unknown",
    }
}

/// Exact table from `http_router.c::get_mime_type`, including the two
/// entries (`svg`, `ico`) the teacher's own table was missing.
pub fn mime_type_for_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "txt" => "text/plain",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/vnd.microsoft.icon",
        _ => "application/octet-stream",
    }
}

/// Standard HTML error body, matching `send_error_response`'s shape exactly.
pub fn error_body(code: u16) -> Vec<u8> {
    let text = status_text(code);
    format!(
        "<html><head><title>{code} {text}</title></head><body><h1>{code} {text}</h1></body></html>"
    )
    .into_bytes()
}

pub fn error_response(code: u16) -> HttpResponse {
    HttpResponse::status(code)
        .header("Connection", "close")
        .content_type("text/html")
        .body(error_body(code))
}

/// One directory entry for a listing, in the order `readdir` would yield
/// them (no sorting is performed, matching the original).
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Build the directory-listing HTML body, matching
/// `http_router.c::handle_dir_request`'s markup exactly: title/h1 wrapper,
/// a leading `..` entry unless `uri` is the root, one `<li>` per entry with
/// a trailing `/` suffix for directories, and a closing `<hr>`.
pub fn generate_directory_listing(uri: &str, entries: &[DirEntry]) -> Vec<u8> {
    let mut out = String::with_capacity(256 + entries.len() * 48);
    out.push_str(&format!(
        "<html><head><title>Index of {uri}</title></head><body><h1>Index of {uri}</h1><hr><ul>"
    ));
    if uri != "/" {
        out.push_str("<li><a href=\"..\">..</a></li>");
    }
    for entry in entries {
        if entry.name == "." || entry.name == ".." {
            continue;
        }
        let suffix = if entry.is_dir { "/" } else { "" };
        out.push_str(&format!(
            "<li><a href=\"{name}{suffix}\">{name}{suffix}</a></li>",
            name = entry.name,
            suffix = suffix
        ));
    }
    out.push_str("</ul><hr></body></html>");
    out.into_bytes()
}
