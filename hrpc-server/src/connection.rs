//! HTTP connection handling
//!
//! Each accepted TCP stream is served as HTTP/1.1 by hyper. Every request on
//! the connection is a dispatch request: its body is collected up to the
//! server's size limit and the buffered request is handed to `Server::handle`.
//!
//! # Error Handling
//!
//! - Method other than POST: 405, before the body is read
//! - Body over the limit: 413 `rpc: request body too large`
//! - Body read failure: 400 `rpc: failed to read request body: <err>`
//! - Connection failures are logged; they never reach the accept loop.

use crate::Server;
use bytes::Bytes;
use hrpc_core::Error;
use http::{Request, Response};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use tokio::net::TcpStream;

/// Serve one TCP connection until the peer closes it
pub(crate) async fn serve_connection(server: Server, stream: TcpStream, peer: SocketAddr) {
    let io = TokioIo::new(stream);
    let service = service_fn(move |request| {
        let server = server.clone();
        async move { Ok::<_, Infallible>(handle_request(&server, request, peer).await) }
    });

    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
        if err.is_incomplete_message() {
            tracing::debug!(peer = %peer, error = %err, "Client disconnected");
        } else {
            tracing::error!(peer = %peer, error = %err, "Error serving connection");
        }
    }
}

async fn handle_request(
    server: &Server,
    request: Request<Incoming>,
    peer: SocketAddr,
) -> Response<Full<Bytes>> {
    let (parts, body) = request.into_parts();
    // Checked before collecting so an oversized body cannot turn 405 into 413.
    if let Err(err) = crate::require_post(&parts.method) {
        return server.reject(&err).map(Full::new);
    }
    let response = match Limited::new(body, server.max_body_size()).collect().await {
        Ok(collected) => {
            server
                .handle(Request::from_parts(parts, collected.to_bytes()))
                .await
        }
        Err(err) => {
            tracing::debug!(peer = %peer, error = %err, "Failed to collect request body");
            server.reject(&body_error(&*err))
        }
    };
    response.map(Full::new)
}

fn body_error(err: &(dyn std::error::Error + Send + Sync + 'static)) -> Error {
    if err.downcast_ref::<LengthLimitError>().is_some() {
        Error::PayloadTooLarge("rpc: request body too large".to_string())
    } else {
        Error::CodecRead(format!("rpc: failed to read request body: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_body_error_classification() {
        let body = Limited::new(Full::new(Bytes::from_static(b"too long")), 4);
        let limit_err = body.collect().await.unwrap_err();
        let err = body_error(&*limit_err);
        assert!(matches!(err, Error::PayloadTooLarge(_)));
        assert_eq!(err.status(), http::StatusCode::PAYLOAD_TOO_LARGE);

        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err = body_error(&io);
        assert_eq!(err.to_string(), "rpc: failed to read request body: eof");
    }
}
