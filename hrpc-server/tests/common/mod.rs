//! Shared fixtures for hrpc-server integration tests

#![allow(dead_code)]

use bytes::Bytes;
use hrpc_core::writer::{self, ResponseWriter};
use hrpc_core::{Args, Codec, CodecRequest, Error, HttpRequest, Json2Codec, Result, RpcError};
use hrpc_macros::service;
use hrpc_server::{Server, ServerBuilder};
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const JSON: &str = "application/json";
pub const MOCK: &str = "application/x-mock";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Service1Request {
    pub a: i64,
    pub b: i64,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Service1Response {
    pub result: i64,
}

/// Test service counting how many times a method body actually ran
#[derive(Default)]
pub struct Service1 {
    calls: AtomicUsize,
}

#[service]
impl Service1 {
    pub async fn multiply(&self, args: Service1Request) -> Result<Service1Response> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Service1Response {
            result: args.a * args.b,
        })
    }

    pub async fn response_error(&self, _args: Service1Request) -> Result<Service1Response> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::other("response error"))
    }

    pub async fn structured_error(&self, args: Service1Request) -> Result<Service1Response> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RpcError::with_data(1001, "insufficient funds", serde_json::json!({ "B": args.b })).into())
    }

    pub async fn path(&self, request: &HttpRequest, _args: ()) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(request.uri().path().to_string())
    }

    pub async fn explode(&self, _args: ()) -> Result<()> {
        panic!("boom");
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Codec that takes the method from `X-Method` and the arguments from the raw
/// body, and reports errors as plain text with the dispatcher's status.
pub struct MockCodec;

impl Codec for MockCodec {
    fn new_request(&self, request: &HttpRequest) -> Box<dyn CodecRequest> {
        Box::new(MockCodecRequest {
            method: request
                .headers()
                .get("x-method")
                .and_then(|value| value.to_str().ok())
                .map(str::to_string),
            body: request.body().clone(),
        })
    }
}

struct MockCodecRequest {
    method: Option<String>,
    body: Bytes,
}

impl CodecRequest for MockCodecRequest {
    fn method(&self) -> Result<String> {
        self.method
            .clone()
            .ok_or_else(|| Error::CodecRequestMethod("mock: missing X-Method header".to_string()))
    }

    fn read_request(&mut self, args: &mut dyn Args) -> Result<()> {
        if self.body.is_empty() {
            return Ok(());
        }
        let text = std::str::from_utf8(&self.body).map_err(|e| Error::CodecRead(e.to_string()))?;
        let raw = RawValue::from_string(text.to_string()).map_err(|e| Error::CodecRead(e.to_string()))?;
        args.decode_json(&raw)
            .map_err(|e| Error::CodecRead(e.to_string()))
    }

    fn write_response(&self, w: &mut ResponseWriter, reply: Value) -> Result<()> {
        let body = serde_json::to_vec(&reply).map_err(|e| Error::CodecWrite(e.to_string()))?;
        w.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(JSON));
        std::io::Write::write_all(w, &body).map_err(|e| Error::CodecWrite(e.to_string()))
    }

    fn write_error(&self, w: &mut ResponseWriter, status: StatusCode, err: &Error) -> Result<()> {
        writer::write_error(w, status, &err.to_string());
        Ok(())
    }
}

/// Builder with the JSON-RPC codec and the mock codec registered
pub fn builder() -> ServerBuilder {
    Server::builder()
        .codec(Json2Codec::new(), JSON)
        .codec(MockCodec, MOCK)
}

/// Build `builder` and register a fresh `Service1`
pub fn server_with(builder: ServerBuilder) -> (Server, Arc<Service1>) {
    let server = builder.build().unwrap();
    let service = Arc::new(Service1::default());
    server
        .register_shared_service(Arc::clone(&service), None)
        .unwrap();
    (server, service)
}

pub fn server() -> (Server, Arc<Service1>) {
    server_with(builder())
}

pub fn post(content_type: &str, body: impl Into<Bytes>) -> HttpRequest {
    http::Request::post("/rpc")
        .header(CONTENT_TYPE, content_type)
        .body(body.into())
        .unwrap()
}

pub fn post_mock(method: &str, body: &'static str) -> HttpRequest {
    http::Request::post("/rpc")
        .header(CONTENT_TYPE, MOCK)
        .header("x-method", method)
        .body(Bytes::from_static(body.as_bytes()))
        .unwrap()
}

pub fn json_rpc(method: &str, params: Value, id: Value) -> HttpRequest {
    let mut envelope = serde_json::json!({ "jsonrpc": "2.0", "method": method, "params": params });
    if !id.is_null() {
        envelope["id"] = id;
    }
    post(JSON, serde_json::to_vec(&envelope).unwrap())
}

pub fn body_json(response: &Response<Bytes>) -> Value {
    serde_json::from_slice(response.body()).unwrap()
}

pub fn body_text(response: &Response<Bytes>) -> String {
    String::from_utf8(response.body().to_vec()).unwrap()
}
