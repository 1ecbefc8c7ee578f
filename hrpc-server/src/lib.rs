//! HTTP RPC dispatcher
//!
//! This crate turns plain async methods on registered objects into RPC
//! endpoints reachable over HTTP POST. Request bodies are decoded by a
//! pluggable codec chosen by `Content-Type`; replies and errors are encoded by
//! the same codec.
//!
//! # Core Features
//!
//! - **Registry**: services register their method tables under `Service/method` keys, plus aliases
//! - **Codecs**: any number of `Codec`s keyed by content type; `hrpc_core::Json2Codec` speaks JSON-RPC 2.0
//! - **Hooks**: intercept, before, validate and after extension points around each call
//! - **Transport**: a hyper HTTP/1.1 accept loop, or `Server::handle` for embedding
//! - **Observability**: a span per request and optional OpenTelemetry metrics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use hrpc_core::Json2Codec;
//! use hrpc_server::{MethodDef, Server, Service};
//! use futures::FutureExt;
//! use serde::Deserialize;
//!
//! #[derive(Default, Deserialize)]
//! struct Operands { a: i64, b: i64 }
//!
//! struct Arith;
//!
//! impl Service for Arith {
//!     fn type_name() -> &'static str { "Arith" }
//!
//!     fn methods() -> Vec<MethodDef<Self>> {
//!         vec![MethodDef::new("add", |_: &Self, args: Operands| {
//!             async move { Ok::<_, hrpc_core::Error>(args.a + args.b) }.boxed()
//!         })]
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::builder()
//!         .bind_str("127.0.0.1:8080")?
//!         .codec(Json2Codec::new(), "application/json")
//!         .build()?;
//!     server.register_service(Arith, None)?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Request Pipeline
//!
//! `Server::handle` processes one buffered request:
//!
//! 1. Reject anything but POST (405)
//! 2. Pick the codec by content type (415 if none matches)
//! 3. Let the codec extract the method name and decode the arguments
//! 4. Resolve the method in the registry
//! 5. Run the intercept, before and validate hooks
//! 6. Invoke the method
//! 7. Let the codec encode the reply or error, then run the after hook
//!
//! Failures in steps 3 and 4 are encoded by the codec with status 400 and skip
//! the hooks. Every response carries `X-Content-Type-Options: nosniff`.

mod builder;
mod connection;
mod handler;
mod hooks;
mod metrics;
mod registry;

pub use builder::{ServerBuilder, DEFAULT_MAX_BODY_SIZE};
pub use handler::{MethodDef, MethodResult, Service};
pub use hooks::{Hooks, RequestInfo};
pub use metrics::ServerMetrics;
pub use registry::{MethodSpec, Registry, ServiceInfo};

pub use futures::future::BoxFuture;
pub use hrpc_core::HttpRequest;

#[doc(hidden)]
pub mod __private {
    pub use futures::FutureExt;
}

use bytes::Bytes;
use futures::FutureExt;
use hrpc_core::writer::{self, ResponseWriter};
use hrpc_core::{Codec, CodecRequest, Error, Result};
use http::header::{HeaderValue, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS};
use http::{Method, Response, StatusCode};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::Instrument;

pub(crate) struct Inner {
    pub(crate) codecs: HashMap<String, Arc<dyn Codec>>,
    pub(crate) registry: Registry,
    pub(crate) hooks: Hooks,
    pub(crate) metrics: Option<Arc<ServerMetrics>>,
    pub(crate) addr: Option<SocketAddr>,
    pub(crate) max_body_size: usize,
}

/// HTTP RPC server
///
/// Cheap to clone: every clone shares the same registry, codecs and hooks.
///
/// # Lifecycle
///
/// 1. **Build**: create the server with `Server::builder()`
/// 2. **Register**: add services, single methods and aliases
/// 3. **Serve**: `run()` / `serve(listener)`, or call `handle` from another HTTP stack
///
/// Registration may continue while the server is serving.
#[derive(Clone)]
pub struct Server {
    inner: Arc<Inner>,
}

// What the pipeline learned about a request, for metrics.
#[derive(Default)]
struct Outcome {
    method: Option<String>,
    error: Option<&'static str>,
}

impl Server {
    /// Create a new server builder
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Register every method of `receiver`
    ///
    /// `name` overrides the service name derived from `S::type_name()`.
    pub fn register_service<S: Service>(&self, receiver: S, name: Option<&str>) -> Result<()> {
        self.register_shared_service(Arc::new(receiver), name)
    }

    /// Register every method of a shared receiver
    pub fn register_shared_service<S: Service>(
        &self,
        receiver: Arc<S>,
        name: Option<&str>,
    ) -> Result<()> {
        self.inner.registry.register(receiver, name)?;
        self.record_registered();
        Ok(())
    }

    /// Register one method of `receiver` under an explicit dispatch key
    pub fn register_method<S: Service>(
        &self,
        receiver: Arc<S>,
        key: &str,
        method_name: &str,
    ) -> Result<()> {
        self.inner.registry.register_method(receiver, key, method_name)?;
        self.record_registered();
        Ok(())
    }

    /// Make `alias` resolve to the method registered under `target`
    pub fn register_alias(&self, alias: &str, target: &str) -> Result<()> {
        self.inner.registry.register_alias(alias, target)
    }

    /// Whether `method` resolves to a registered method
    ///
    /// Accepts dispatch keys, dotted `Service.Method` names and aliases.
    pub fn has_method(&self, method: &str) -> bool {
        self.inner.registry.has_method(method)
    }

    /// Sorted dispatch keys of every registered method
    pub fn methods(&self) -> Vec<String> {
        self.inner.registry.methods()
    }

    /// The method registry
    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// Bind address configured on the builder
    pub fn addr(&self) -> Option<SocketAddr> {
        self.inner.addr
    }

    /// Request body limit in bytes
    pub fn max_body_size(&self) -> usize {
        self.inner.max_body_size
    }

    fn record_registered(&self) {
        if let Some(metrics) = &self.inner.metrics {
            metrics.record_registered(self.inner.registry.len());
        }
    }

    /// Bind the builder's address and serve forever
    pub async fn run(&self) -> Result<()> {
        let addr = self
            .inner
            .addr
            .ok_or_else(|| Error::Internal("No bind address specified".to_string()))?;
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serve HTTP/1.1 connections accepted from `listener`
    ///
    /// Each connection runs on its own task. Only an accept failure ends the
    /// loop.
    #[tracing::instrument(skip(self, listener), name = "server.serve")]
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(addr = %addr, methods = self.inner.registry.len(), "Server listening");
        }

        loop {
            let (stream, peer) = listener.accept().await?;
            tracing::debug!(peer = %peer, "New connection accepted");

            let server = self.clone();
            tokio::spawn(async move {
                connection::serve_connection(server, stream, peer).await;
            });
        }
    }

    /// Dispatch one buffered HTTP request
    pub async fn handle(&self, request: HttpRequest) -> Response<Bytes> {
        let started = Instant::now();
        let span = tracing::info_span!(
            "rpc.request",
            http.method = %request.method(),
            rpc.method = tracing::field::Empty,
            status = tracing::field::Empty,
        );

        let mut outcome = Outcome::default();
        let mut response = self
            .dispatch(request, &mut outcome)
            .instrument(span.clone())
            .await;
        response
            .headers_mut()
            .insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));

        let status = response.status();
        span.record("status", status.as_u16());
        if let Some(metrics) = &self.inner.metrics {
            let method = outcome.method.as_deref().unwrap_or("unknown");
            metrics.record_request(method, status.as_u16(), started.elapsed().as_secs_f64());
            if let Some(kind) = outcome.error {
                metrics.record_error(kind);
            }
        }
        response
    }

    /// Plain-text response for a failure that never reached a codec
    pub(crate) fn reject(&self, err: &Error) -> Response<Bytes> {
        tracing::warn!(error = %err, kind = err.kind(), "Request rejected");
        if let Some(metrics) = &self.inner.metrics {
            metrics.record_request("unknown", err.status().as_u16(), 0.0);
            metrics.record_error(err.kind());
        }
        let mut w = ResponseWriter::new();
        writer::write_error(&mut w, err.status(), &err.to_string());
        let mut response = w.into_response();
        response
            .headers_mut()
            .insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
        response
    }

    fn codec_for(&self, content_type: &str) -> Option<&Arc<dyn Codec>> {
        let codecs = &self.inner.codecs;
        if content_type.is_empty() && codecs.len() == 1 {
            return codecs.values().next();
        }
        codecs.get(&content_type.to_ascii_lowercase())
    }

    async fn dispatch(&self, request: HttpRequest, outcome: &mut Outcome) -> Response<Bytes> {
        let mut w = ResponseWriter::new();

        if let Err(err) = require_post(request.method()) {
            return plain_error(w, err, outcome);
        }

        let content_type = request
            .headers()
            .get(CONTENT_TYPE)
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
            .unwrap_or_default();
        let content_type = content_type.split(';').next().unwrap_or_default().trim();
        let Some(codec) = self.codec_for(content_type) else {
            let err = Error::UnsupportedMediaType(format!(
                "rpc: unrecognized Content-Type: {}",
                content_type
            ));
            return plain_error(w, err, outcome);
        };

        let mut codec_req = codec.new_request(&request);
        let method = match codec_req.method() {
            Ok(method) => method,
            Err(err) => return codec_error(codec_req.as_ref(), w, err, outcome),
        };
        tracing::Span::current().record("rpc.method", method.as_str());

        let spec = match self.inner.registry.get(&method) {
            Ok((_, spec)) => spec,
            Err(err) => return codec_error(codec_req.as_ref(), w, err, outcome),
        };
        // Only registered keys become metric labels.
        outcome.method = Some(spec.key().to_string());
        let mut args = spec.new_args();
        if let Err(err) = codec_req.read_request(&mut *args) {
            return codec_error(codec_req.as_ref(), w, err, outcome);
        }
        tracing::debug!(key = spec.key(), "Arguments decoded");

        let hooks = &self.inner.hooks;
        let decoded_body = request.body().clone();
        let mut info = RequestInfo::new(method, request);
        hooks.run_intercept(&mut info);
        hooks.run_before(&mut info);

        if info.request.body() != &decoded_body {
            tracing::debug!(key = spec.key(), "Request body rewritten by hooks; decoding again");
            codec_req = codec.new_request(&info.request);
            let mut fresh = spec.new_args();
            let redecoded = codec_req.method().and_then(|method| {
                if method != info.method {
                    return Err(Error::CodecRequestMethod(format!(
                        "rpc: hook changed method from {:?} to {:?}",
                        info.method, method
                    )));
                }
                codec_req.read_request(&mut *fresh)
            });
            match redecoded {
                Ok(()) => args = fresh,
                Err(err) => info.error = Some(err),
            }
        }

        if info.error.is_none() {
            if let Err(err) = hooks.run_validate(&info, args.as_any()) {
                tracing::debug!(key = spec.key(), error = %err, "Arguments rejected by validate hook");
                info.error = Some(err);
            }
        }

        let reply = match info.error.take() {
            Some(err) => Err(err),
            None => AssertUnwindSafe(spec.call(&info.request, args))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    tracing::error!(key = spec.key(), "Method panicked");
                    Err(Error::Internal(format!(
                        "rpc: method {:?} panicked",
                        spec.key()
                    )))
                }),
        };

        let written = match reply {
            Ok(reply) => codec_req.write_response(&mut w, reply),
            Err(err) => {
                outcome.error = Some(err.kind());
                let written = codec_req.write_error(&mut w, StatusCode::BAD_REQUEST, &err);
                info.error = Some(err);
                written
            }
        };
        if let Err(err) = written {
            tracing::warn!(key = spec.key(), error = %err, "Failed to encode response");
            if !w.is_written() {
                writer::write_error(&mut w, StatusCode::BAD_REQUEST, &err.to_string());
            }
        }

        info.status_code = w.status();
        hooks.run_after(&info);
        w.into_response()
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut content_types: Vec<&String> = self.inner.codecs.keys().collect();
        content_types.sort();
        f.debug_struct("Server")
            .field("addr", &self.inner.addr)
            .field("codecs", &content_types)
            .field("registry", &self.inner.registry)
            .field("hooks", &self.inner.hooks)
            .field("max_body_size", &self.inner.max_body_size)
            .finish()
    }
}

/// Only POST reaches a codec
pub(crate) fn require_post(method: &Method) -> Result<()> {
    if *method == Method::POST {
        return Ok(());
    }
    Err(Error::HttpMethodNotAllowed(format!(
        "rpc: POST method required, received {}",
        method
    )))
}

fn plain_error(mut w: ResponseWriter, err: Error, outcome: &mut Outcome) -> Response<Bytes> {
    tracing::warn!(error = %err, "Request rejected");
    outcome.error = Some(err.kind());
    writer::write_error(&mut w, err.status(), &err.to_string());
    w.into_response()
}

fn codec_error(
    codec_req: &dyn CodecRequest,
    mut w: ResponseWriter,
    err: Error,
    outcome: &mut Outcome,
) -> Response<Bytes> {
    tracing::debug!(error = %err, kind = err.kind(), "Request failed before invocation");
    outcome.error = Some(err.kind());
    if let Err(write_err) = codec_req.write_error(&mut w, StatusCode::BAD_REQUEST, &err) {
        tracing::warn!(error = %write_err, "Failed to encode error response");
        if !w.is_written() {
            writer::write_error(&mut w, StatusCode::BAD_REQUEST, &write_err.to_string());
        }
    }
    w.into_response()
}
