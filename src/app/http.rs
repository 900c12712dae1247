//! Minimal HTTP/1.x responder
//!
//! Understands one request line, `GET <uri> HTTP/1.1` (or `HTTP/1.0`), and
//! answers every well-formed request with the same page. Nothing is copied
//! out of the request: the parsed header is a set of spans into the caller's
//! buffer.

use std::io::{Cursor, Write};

use log::{trace, warn};

pub const HTTP_METHOD: &[u8] = b"GET";
pub const HTTP_VER: &str = "HTTP/1.1";
pub const HTTP_VER_COMPATIBLE: &str = "HTTP/1.0";

pub const OK_PAGE: &str =
    "<!DOCTYPE html>\n<html><body><h1>Hello from toy-kernel-net!</h1></body></html>";

/// Status line text for `code`; anything unknown reports 520.
pub const fn status_text(code: u16) -> &'static str {
    match code {
        200 => "200 OK",
        400 => "400 Bad Request",
        404 => "404 Not Found",
        505 => "505 HTTP Version Not Supported",
        _ => "520 Unknown Error",
    }
}

/// A byte range of the request buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub offset: usize,
    pub len: usize,
}

impl Span {
    pub fn of<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        &data[self.offset..self.offset + self.len]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpHeader {
    pub method: Span,
    pub uri: Span,
    pub version: Span,
}

impl HttpHeader {
    /// Parse the request line
    ///
    /// Fails with the status code the request should be answered with.
    pub fn parse(request: &[u8]) -> Result<Self, u16> {
        let mut method = None;
        let mut uri = None;
        let mut start = 0;

        for i in 0..=request.len() {
            if i < request.len() && request[i] != b' ' && request[i] != b'\n' {
                continue;
            }

            let mut span = Span {
                offset: start,
                len: i - start,
            };
            // CRLF line endings leave a carriage return on the last token.
            if span.of(request).last() == Some(&b'\r') {
                span.len -= 1;
            }
            start = i + 1;

            match (method, uri) {
                (None, _) => {
                    if span.of(request) != HTTP_METHOD {
                        warn!("http: only GET requests are supported");
                        return Err(400);
                    }
                    method = Some(span);
                }
                (Some(_), None) => uri = Some(span),
                (Some(method), Some(uri)) => {
                    let version = span.of(request);
                    if version != HTTP_VER.as_bytes() && version != HTTP_VER_COMPATIBLE.as_bytes() {
                        warn!("http: only {} and {} are supported", HTTP_VER, HTTP_VER_COMPATIBLE);
                        return Err(505);
                    }
                    return Ok(HttpHeader {
                        method,
                        uri,
                        version: span,
                    });
                }
            }
        }

        warn!("http: request line incomplete");
        Err(400)
    }
}

/// Answer `request`, writing the response into `reply`
///
/// Returns the number of bytes written.
pub fn http_parse(request: &[u8], reply: &mut [u8]) -> usize {
    trace!("http: parsing request of {} bytes", request.len());

    match HttpHeader::parse(request) {
        Ok(header) => {
            trace!(
                "http: GET {}",
                String::from_utf8_lossy(header.uri.of(request))
            );
            http_reply(200, Some(OK_PAGE), reply)
        }
        Err(code) => http_reply(code, None, reply),
    }
}

/// Write a complete response with status `code` and an optional body
///
/// The response is cut short if `reply` is too small. Returns the number of
/// bytes written.
pub fn http_reply(code: u16, page: Option<&str>, reply: &mut [u8]) -> usize {
    trace!("http: creating {} reply", code);

    let body = page.unwrap_or("");
    let mut cursor = Cursor::new(reply);
    let written = write!(
        cursor,
        "{} {}\nContent-Type: text/html\nContent-Length: {}\n\n{}",
        HTTP_VER,
        status_text(code),
        body.len(),
        body
    );
    // A short buffer stops the write; the cursor still counts what fit.
    if written.is_err() {
        trace!("http: reply truncated at {} bytes", cursor.position());
    }
    cursor.position() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn respond(request: &str) -> String {
        let mut reply = [0u8; 512];
        let len = http_parse(request.as_bytes(), &mut reply);
        String::from_utf8(reply[..len].to_vec()).unwrap()
    }

    #[test]
    fn test_get_is_answered_with_page() {
        let reply = respond("GET /x HTTP/1.1");
        assert!(reply.starts_with("HTTP/1.1 200 OK\n"));
        assert!(reply.contains("Content-Type: text/html\n"));
        assert!(reply.contains(&format!("Content-Length: {}\n\n", OK_PAGE.len())));
        assert!(reply.ends_with(OK_PAGE));
    }

    #[test]
    fn test_http_1_0_is_accepted() {
        assert!(respond("GET / HTTP/1.0\n").starts_with("HTTP/1.1 200 OK"));
    }

    #[test]
    fn test_crlf_request_is_accepted() {
        let reply = respond("GET /index.html HTTP/1.1\r\nHost: 10.0.2.15\r\n\r\n");
        assert!(reply.starts_with("HTTP/1.1 200 OK"));
    }

    #[test]
    fn test_other_methods_get_400() {
        assert_eq!(
            respond("POST /x HTTP/1.1"),
            "HTTP/1.1 400 Bad Request\nContent-Type: text/html\nContent-Length: 0\n\n"
        );
        // Method comparison is exact.
        assert!(respond("GETX /x HTTP/1.1").starts_with("HTTP/1.1 400"));
        assert!(respond("get /x HTTP/1.1").starts_with("HTTP/1.1 400"));
        assert!(respond("Hello, HTTP!").starts_with("HTTP/1.1 400"));
    }

    #[test]
    fn test_unsupported_version_gets_505() {
        assert!(respond("GET /x HTTP/2").starts_with("HTTP/1.1 505 HTTP Version Not Supported\n"));
    }

    #[test]
    fn test_truncated_request_gets_400() {
        assert!(respond("GET /x").starts_with("HTTP/1.1 400"));
        assert!(respond("GET").starts_with("HTTP/1.1 400"));
        assert!(respond("").starts_with("HTTP/1.1 400"));
    }

    #[test]
    fn test_header_spans_point_into_request() {
        let request = b"GET /hello.world HTTP/1.1\n";
        let header = HttpHeader::parse(request).unwrap();
        assert_eq!(header.method.of(request), b"GET");
        assert_eq!(header.uri.of(request), b"/hello.world");
        assert_eq!(header.version, Span { offset: 17, len: 8 });
    }

    #[test]
    fn test_unknown_status_falls_back_to_520() {
        let mut reply = [0u8; 128];
        let len = http_reply(418, None, &mut reply);
        assert!(reply[..len].starts_with(b"HTTP/1.1 520 Unknown Error\n"));
    }

    #[test]
    fn test_reply_length_is_exact_and_bounded() {
        let mut reply = [0u8; 512];
        let len = http_reply(200, Some("<p>hi</p>"), &mut reply);
        let expected = "HTTP/1.1 200 OK\nContent-Type: text/html\nContent-Length: 9\n\n<p>hi</p>";
        assert_eq!(&reply[..len], expected.as_bytes());

        let mut small = [0u8; 10];
        assert_eq!(http_reply(200, Some(OK_PAGE), &mut small), 10);
        assert_eq!(&small, b"HTTP/1.1 2");

        assert_eq!(http_reply(404, None, &mut []), 0);
    }
}
