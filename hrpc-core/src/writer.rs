//! Buffered HTTP response writer
//!
//! Codecs write their output into a `ResponseWriter`: a status line that can be
//! set once, a header map, and a growable body. The pipeline turns the writer
//! into an `http::Response<Bytes>` when the call is complete.
//!
//! The writer implements `std::io::Write`, so encoders such as
//! `flate2::write::GzEncoder` can stream directly into the body.

use bytes::{Bytes, BytesMut};
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, Response, StatusCode};
use std::io;

/// Content type used for plain-text error bodies
pub const TEXT_PLAIN_UTF8: &str = "text/plain; charset=utf-8";

/// In-memory HTTP response under construction
#[derive(Debug, Default)]
pub struct ResponseWriter {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
}

impl ResponseWriter {
    /// Create an empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Response headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable response headers
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Set the status code
    ///
    /// Only the first call has an effect, like an HTTP status line that has
    /// already been sent.
    pub fn write_header(&mut self, status: StatusCode) {
        if self.status.is_none() {
            self.status = Some(status);
        }
    }

    /// Status that will be sent: the explicit one, or 200
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    /// Whether a status or any body bytes have been written
    pub fn is_written(&self) -> bool {
        self.status.is_some() || !self.body.is_empty()
    }

    /// Body bytes written so far
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Finish the response
    pub fn into_response(self) -> Response<Bytes> {
        let mut response = Response::new(self.body.freeze());
        *response.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = self.headers;
        response
    }
}

impl io::Write for ResponseWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_header(StatusCode::OK);
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Write a plain-text error response
pub fn write_error(w: &mut ResponseWriter, status: StatusCode, msg: &str) {
    w.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN_UTF8));
    w.write_header(status);
    w.body.extend_from_slice(msg.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_first_status_wins() {
        let mut w = ResponseWriter::new();
        w.write_header(StatusCode::BAD_REQUEST);
        w.write_header(StatusCode::OK);
        assert_eq!(w.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_body_write_implies_ok() {
        let mut w = ResponseWriter::new();
        assert!(!w.is_written());
        w.write_all(b"hello").unwrap();
        assert!(w.is_written());

        let response = w.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().as_ref(), b"hello");
    }

    #[test]
    fn test_write_error_is_plain_text() {
        let mut w = ResponseWriter::new();
        write_error(&mut w, StatusCode::METHOD_NOT_ALLOWED, "nope");

        let response = w.into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[CONTENT_TYPE], TEXT_PLAIN_UTF8);
        assert_eq!(response.body().as_ref(), b"nope");
    }
}
