//! Response body encoders
//!
//! A codec asks its `EncoderSelector` for an `Encoder` per request and writes
//! the serialized body through it. Two selectors ship with the crate:
//!
//! - `IdentitySelector`: never compresses (codec default)
//! - `CompressionSelector`: gzip or deflate, picked from `Accept-Encoding`

use crate::codec::HttpRequest;
use crate::writer::ResponseWriter;
use flate2::write::{DeflateEncoder, GzEncoder};
use flate2::Compression;
use http::header::{HeaderValue, ACCEPT_ENCODING, CONTENT_ENCODING};
use std::io::{self, Write};

/// Writes a payload to a response through some content encoding
pub trait Encoder: Send + Sync {
    /// Encode `payload` into the writer's body, setting headers as needed
    fn encode(&self, w: &mut ResponseWriter, payload: &[u8]) -> io::Result<()>;
}

/// Chooses an `Encoder` for a request
pub trait EncoderSelector: Send + Sync {
    /// Pick the encoder for this request's response
    fn select(&self, request: &HttpRequest) -> Box<dyn Encoder>;
}

/// Passthrough encoder
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityEncoder;

impl Encoder for IdentityEncoder {
    fn encode(&self, w: &mut ResponseWriter, payload: &[u8]) -> io::Result<()> {
        w.write_all(payload)
    }
}

/// gzip encoder, sets `Content-Encoding: gzip`
#[derive(Debug, Clone, Copy, Default)]
pub struct GzipEncoder;

impl Encoder for GzipEncoder {
    fn encode(&self, w: &mut ResponseWriter, payload: &[u8]) -> io::Result<()> {
        w.headers_mut()
            .insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        let mut encoder = GzEncoder::new(w, Compression::default());
        encoder.write_all(payload)?;
        encoder.finish()?;
        Ok(())
    }
}

/// Raw deflate encoder, sets `Content-Encoding: deflate`
#[derive(Debug, Clone, Copy, Default)]
pub struct FlateEncoder;

impl Encoder for FlateEncoder {
    fn encode(&self, w: &mut ResponseWriter, payload: &[u8]) -> io::Result<()> {
        w.headers_mut()
            .insert(CONTENT_ENCODING, HeaderValue::from_static("deflate"));
        let mut encoder = DeflateEncoder::new(w, Compression::default());
        encoder.write_all(payload)?;
        encoder.finish()?;
        Ok(())
    }
}

/// Selector that always answers with `IdentityEncoder`
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentitySelector;

impl EncoderSelector for IdentitySelector {
    fn select(&self, _request: &HttpRequest) -> Box<dyn Encoder> {
        Box::new(IdentityEncoder)
    }
}

/// Selector honouring `Accept-Encoding`
///
/// The header is split on whitespace and commas; the first token that is
/// exactly `gzip` or `deflate` wins. Quality values are not interpreted, so
/// `gzip;q=0.5` is not recognised.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompressionSelector;

impl EncoderSelector for CompressionSelector {
    fn select(&self, request: &HttpRequest) -> Box<dyn Encoder> {
        match accepted_encoding(request) {
            Some("gzip") => Box::new(GzipEncoder),
            Some("deflate") => Box::new(FlateEncoder),
            _ => Box::new(IdentityEncoder),
        }
    }
}

fn accepted_encoding(request: &HttpRequest) -> Option<&str> {
    let header = request.headers().get(ACCEPT_ENCODING)?.to_str().ok()?;
    header
        .split(|c: char| c.is_whitespace() || c == ',')
        .find(|token| *token == "gzip" || *token == "deflate")
}
