//! JSON-RPC 2.0 codec
//!
//! Implements `Codec` for the JSON-RPC 2.0 wire format:
//!
//! - the body must be a request object with `"jsonrpc": "2.0"`
//! - `params` is decoded straight into the method's argument type
//! - replies and errors are written as response objects echoing `id`
//! - a request without `id` (or with `"id": null`) is a notification: the
//!   method runs but nothing is written, not even an error
//! - errors travel inside the envelope, so the HTTP status is always 200
//!
//! # Error mapping
//!
//! | failure | code |
//! |---------|------|
//! | body is not a request object | `-32700` |
//! | `jsonrpc` is not `"2.0"` | `-32600` |
//! | `params` does not fit the argument type | `-32600` (data: the params) |
//! | method cannot be resolved | `-32601` |
//! | method returned `Error::Rpc(e)` | `e` unchanged |
//! | any other error | `-32000` with the error's text |
//!
//! # Examples
//!
//! ```rust
//! use hrpc_core::codec::Codec;
//! use hrpc_core::json2::Json2Codec;
//! use bytes::Bytes;
//!
//! let codec = Json2Codec::new();
//! let request = http::Request::post("/rpc")
//!     .body(Bytes::from_static(br#"{"jsonrpc":"2.0","method":"Arith.Add","id":1}"#))
//!     .unwrap();
//!
//! let codec_request = codec.new_request(&request);
//! assert_eq!(codec_request.method().unwrap(), "Arith.Add");
//! ```

use crate::codec::{Args, Codec, CodecRequest, HttpRequest};
use crate::compression::{Encoder, EncoderSelector, IdentitySelector};
use crate::error::{codes, Error, Result, RpcError};
use crate::types::{ClientRequest, ServerRequest, ServerResponse, VERSION};
use crate::writer::ResponseWriter;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;
use std::sync::Arc;

/// Content type written on every JSON-RPC response body
pub const APPLICATION_JSON_UTF8: &str = "application/json; charset=utf-8";

/// JSON-RPC 2.0 codec
#[derive(Clone)]
pub struct Json2Codec {
    selector: Arc<dyn EncoderSelector>,
}

impl Json2Codec {
    /// Codec that never compresses responses
    pub fn new() -> Self {
        Self::with_encoder_selector(IdentitySelector)
    }

    /// Codec using `selector` to pick the response body encoding
    pub fn with_encoder_selector(selector: impl EncoderSelector + 'static) -> Self {
        Self {
            selector: Arc::new(selector),
        }
    }
}

impl Default for Json2Codec {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Json2Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Json2Codec").finish_non_exhaustive()
    }
}

impl Codec for Json2Codec {
    fn new_request(&self, request: &HttpRequest) -> Box<dyn CodecRequest> {
        Box::new(Json2CodecRequest::new(
            request,
            self.selector.select(request),
        ))
    }
}

/// Decodes and encodes a single JSON-RPC request
pub struct Json2CodecRequest {
    request: ServerRequest,
    err: Option<RpcError>,
    encoder: Box<dyn Encoder>,
}

impl Json2CodecRequest {
    fn new(request: &HttpRequest, encoder: Box<dyn Encoder>) -> Self {
        let (request, err) = decode_envelope(request.body());
        if let Some(err) = &err {
            tracing::debug!(code = err.code, message = %err.message, "Rejected JSON-RPC envelope");
        }
        Self {
            request,
            err,
            encoder,
        }
    }

    /// The decoded envelope, possibly partial when decoding failed
    pub fn envelope(&self) -> &ServerRequest {
        &self.request
    }

    fn recorded_error(&self) -> Result<()> {
        match &self.err {
            Some(err) => Err(Error::Rpc(err.clone())),
            None => Ok(()),
        }
    }

    fn write_server_response(&self, w: &mut ResponseWriter, res: &ServerResponse) -> Result<()> {
        // Notifications get no response at all.
        if self.request.is_notification() {
            return Ok(());
        }
        w.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON_UTF8));
        let payload = serde_json::to_vec(res).map_err(|e| Error::CodecWrite(e.to_string()))?;
        self.encoder
            .encode(w, &payload)
            .map_err(|e| Error::CodecWrite(e.to_string()))
    }
}

impl CodecRequest for Json2CodecRequest {
    fn method(&self) -> Result<String> {
        self.recorded_error()?;
        Ok(self.request.method.clone())
    }

    fn read_request(&mut self, args: &mut dyn Args) -> Result<()> {
        if self.err.is_none() {
            if let Some(params) = &self.request.params {
                if let Err(e) = args.decode_json(params) {
                    let data = serde_json::from_str(params.get()).unwrap_or(Value::Null);
                    self.err = Some(RpcError::with_data(
                        codes::INVALID_REQUEST,
                        e.to_string(),
                        data,
                    ));
                }
            }
        }
        self.recorded_error()
    }

    fn write_response(&self, w: &mut ResponseWriter, reply: Value) -> Result<()> {
        let res = ServerResponse::success(reply, self.request.id.clone());
        self.write_server_response(w, &res)
    }

    fn write_error(
        &self,
        w: &mut ResponseWriter,
        _status: StatusCode,
        err: &Error,
    ) -> Result<()> {
        let rpc_err = match err {
            Error::Rpc(e) => e.clone(),
            e if e.is_not_found() => RpcError::method_not_found(e.to_string()),
            e => RpcError::server_error(e.to_string()),
        };
        let res = ServerResponse::error(rpc_err, self.request.id.clone());
        self.write_server_response(w, &res)
    }
}

/// Envelope members kept as raw JSON so a type error in one of them does not
/// hide the others.
#[derive(Deserialize)]
struct RawEnvelope<'a> {
    #[serde(borrow, default)]
    jsonrpc: Option<&'a RawValue>,
    #[serde(borrow, default)]
    method: Option<&'a RawValue>,
    #[serde(borrow, default)]
    params: Option<&'a RawValue>,
    #[serde(borrow, default)]
    id: Option<&'a RawValue>,
}

/// Parse a request body into an envelope plus the error to report, if any
///
/// The envelope is filled as far as possible even when decoding fails, so the
/// identifier can still be echoed.
fn decode_envelope(body: &[u8]) -> (ServerRequest, Option<RpcError>) {
    let raw: RawEnvelope<'_> = match serde_json::from_slice(body) {
        Ok(raw) => raw,
        Err(e) => {
            let req = ServerRequest::default();
            let err = RpcError::with_data(codes::PARSE_ERROR, e.to_string(), envelope_data(&req));
            return (req, Some(err));
        }
    };

    let mut first_err = None;
    let mut req = ServerRequest {
        params: raw.params.map(ToOwned::to_owned),
        id: raw.id.map(ToOwned::to_owned),
        ..ServerRequest::default()
    };
    for (slot, value) in [(&mut req.version, raw.jsonrpc), (&mut req.method, raw.method)] {
        if let Some(value) = value {
            match serde_json::from_str::<String>(value.get()) {
                Ok(s) => *slot = s,
                Err(e) => {
                    first_err.get_or_insert(e);
                }
            }
        }
    }

    let err = if let Some(e) = first_err {
        Some(RpcError::with_data(codes::PARSE_ERROR, e.to_string(), envelope_data(&req)))
    } else if req.version != VERSION {
        Some(RpcError::with_data(
            codes::INVALID_REQUEST,
            format!("jsonrpc must be {VERSION}"),
            envelope_data(&req),
        ))
    } else {
        None
    };
    (req, err)
}

fn envelope_data(req: &ServerRequest) -> Value {
    serde_json::to_value(req).unwrap_or(Value::Null)
}

/// Encode a JSON-RPC 2.0 request body
///
/// # Examples
///
/// ```rust
/// use hrpc_core::json2::encode_client_request;
/// use serde_json::json;
///
/// let body = encode_client_request("Arith.Multiply", &json!({"A": 4, "B": 2}), 1).unwrap();
/// let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
/// assert_eq!(value["jsonrpc"], "2.0");
/// assert_eq!(value["id"], 1);
/// ```
pub fn encode_client_request<P>(method: &str, params: &P, id: u64) -> Result<Vec<u8>>
where
    P: Serialize + ?Sized,
{
    let params = serde_json::to_value(params).map_err(|e| Error::CodecWrite(e.to_string()))?;
    let req = ClientRequest {
        version: VERSION.to_string(),
        method: method.to_string(),
        params,
        id,
    };
    serde_json::to_vec(&req).map_err(|e| Error::CodecWrite(e.to_string()))
}

/// Decode a JSON-RPC 2.0 response body into the method's reply type
///
/// An error member is returned as `Error::Rpc`; a missing or null result is a
/// `CodecRead` error.
pub fn decode_client_response<T>(body: &[u8]) -> Result<T>
where
    T: DeserializeOwned,
{
    let res: ServerResponse =
        serde_json::from_slice(body).map_err(|e| Error::CodecRead(e.to_string()))?;
    if let Some(err) = res.error {
        return Err(Error::Rpc(err));
    }
    let result = res
        .result
        .ok_or_else(|| Error::CodecRead("rpc: result is null".to_string()))?;
    serde_json::from_value(result).map_err(|e| Error::CodecRead(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use serde_json::json;

    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct Operands {
        a: i64,
        b: i64,
    }

    fn codec_request(body: &str) -> Box<dyn CodecRequest> {
        let request = http::Request::post("/rpc")
            .body(Bytes::from(body.to_string()))
            .unwrap();
        Json2Codec::new().new_request(&request)
    }

    fn rpc_code(err: Error) -> i32 {
        match err {
            Error::Rpc(e) => e.code,
            other => panic!("expected structured error, got {other:?}"),
        }
    }

    fn written_json(w: ResponseWriter) -> Value {
        serde_json::from_slice(w.body()).unwrap()
    }

    #[test]
    fn test_method_and_params() {
        let mut req = codec_request(
            r#"{"jsonrpc":"2.0","method":"Service1.Multiply","params":{"A":4,"B":2},"id":1}"#,
        );
        assert_eq!(req.method().unwrap(), "Service1.Multiply");

        let mut args: Box<dyn Args> = Box::new(Operands::default());
        req.read_request(args.as_mut()).unwrap();
        let ops = args.as_any().downcast_ref::<Operands>().unwrap();
        assert_eq!((ops.a, ops.b), (4, 2));
    }

    #[test]
    fn test_garbage_body_is_parse_error() {
        let req = codec_request("{not json");
        assert_eq!(rpc_code(req.method().unwrap_err()), codes::PARSE_ERROR);
    }

    #[test]
    fn test_non_object_body_is_parse_error() {
        let req = codec_request("[1,2,3]");
        assert_eq!(rpc_code(req.method().unwrap_err()), codes::PARSE_ERROR);
    }

    #[test]
    fn test_wrong_version_is_invalid_request() {
        let req = codec_request(r#"{"jsonrpc":"1.0","method":"A.B","id":1}"#);
        let err = req.method().unwrap_err();
        match err {
            Error::Rpc(e) => {
                assert_eq!(e.code, codes::INVALID_REQUEST);
                assert_eq!(e.message, "jsonrpc must be 2.0");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_type_error_keeps_id() {
        let req = codec_request(r#"{"jsonrpc":"2.0","method":42,"id":"abc"}"#);
        assert_eq!(rpc_code(req.method().unwrap_err()), codes::PARSE_ERROR);

        let mut w = ResponseWriter::new();
        req.write_error(&mut w, StatusCode::BAD_REQUEST, &req.method().unwrap_err())
            .unwrap();
        assert_eq!(written_json(w)["id"], "abc");
    }

    #[test]
    fn test_params_mismatch_is_invalid_request_with_data() {
        let mut req =
            codec_request(r#"{"jsonrpc":"2.0","method":"A.B","params":["x"],"id":1}"#);
        let mut args: Box<dyn Args> = Box::new(Operands::default());
        match req.read_request(args.as_mut()).unwrap_err() {
            Error::Rpc(e) => {
                assert_eq!(e.code, codes::INVALID_REQUEST);
                assert_eq!(e.data, Some(json!(["x"])));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_absent_params_keep_zero_value() {
        let mut req = codec_request(r#"{"jsonrpc":"2.0","method":"A.B","id":1}"#);
        let mut args: Box<dyn Args> = Box::new(Operands::default());
        req.read_request(args.as_mut()).unwrap();
        assert_eq!(args.as_any().downcast_ref::<Operands>().unwrap().a, 0);
    }

    #[test]
    fn test_write_response_echoes_id() {
        let req = codec_request(r#"{"jsonrpc":"2.0","method":"A.B","id":"req-1"}"#);
        let mut w = ResponseWriter::new();
        req.write_response(&mut w, json!({"Result": 8})).unwrap();

        assert_eq!(w.headers()[CONTENT_TYPE], APPLICATION_JSON_UTF8);
        assert_eq!(
            written_json(w),
            json!({"jsonrpc": "2.0", "result": {"Result": 8}, "id": "req-1"})
        );
    }

    #[test]
    fn test_bare_error_becomes_server_error() {
        let req = codec_request(r#"{"jsonrpc":"2.0","method":"A.B","id":3}"#);
        let mut w = ResponseWriter::new();
        req.write_error(&mut w, StatusCode::BAD_REQUEST, &Error::other("response error"))
            .unwrap();

        assert_eq!(w.status(), StatusCode::OK);
        assert_eq!(
            written_json(w),
            json!({"jsonrpc": "2.0", "error": {"code": -32000, "message": "response error"}, "id": 3})
        );
    }

    #[test]
    fn test_structured_error_is_forwarded() {
        let req = codec_request(r#"{"jsonrpc":"2.0","method":"A.B","id":3}"#);
        let mut w = ResponseWriter::new();
        let err = Error::Rpc(RpcError::with_data(1001, "insufficient funds", json!(50)));
        req.write_error(&mut w, StatusCode::BAD_REQUEST, &err).unwrap();

        assert_eq!(
            written_json(w)["error"],
            json!({"code": 1001, "message": "insufficient funds", "data": 50})
        );
    }

    #[test]
    fn test_not_found_maps_to_method_not_found() {
        let req = codec_request(r#"{"jsonrpc":"2.0","method":"A.B","id":3}"#);
        let mut w = ResponseWriter::new();
        let err = Error::MethodNotFound("rpc: can't find service method \"A.B\"".into());
        req.write_error(&mut w, StatusCode::BAD_REQUEST, &err).unwrap();
        assert_eq!(written_json(w)["error"]["code"], codes::METHOD_NOT_FOUND);
    }

    #[test]
    fn test_notification_writes_nothing() {
        for body in [
            r#"{"jsonrpc":"2.0","method":"A.B"}"#,
            r#"{"jsonrpc":"2.0","method":"A.B","id":null}"#,
        ] {
            let req = codec_request(body);
            let mut w = ResponseWriter::new();
            req.write_response(&mut w, json!(1)).unwrap();
            req.write_error(&mut w, StatusCode::BAD_REQUEST, &Error::other("x"))
                .unwrap();
            assert!(!w.is_written());
            assert!(w.headers().get(CONTENT_TYPE).is_none());
        }
    }

    #[test]
    fn test_client_helpers() {
        let body = encode_client_request("A.B", &json!({"A": 1}), 9).unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, json!({"jsonrpc": "2.0", "method": "A.B", "params": {"A": 1}, "id": 9}));

        let ok: i64 = decode_client_response(br#"{"jsonrpc":"2.0","result":8,"id":9}"#).unwrap();
        assert_eq!(ok, 8);

        let err = decode_client_response::<i64>(
            br#"{"jsonrpc":"2.0","error":{"code":-32000,"message":"boom"},"id":9}"#,
        )
        .unwrap_err();
        assert_eq!(rpc_code(err), codes::SERVER_ERROR);

        let err =
            decode_client_response::<i64>(br#"{"jsonrpc":"2.0","result":null,"id":9}"#).unwrap_err();
        assert!(matches!(err, Error::CodecRead(_)));
    }
}
