//! Core types for hrpc
//!
//! Everything the dispatcher and its codecs share:
//!
//! - **Error handling**: the dispatcher's `Error` enum and the JSON-RPC `RpcError` object
//! - **Codec**: the `Codec` / `CodecRequest` traits and the `Args` argument buffer
//! - **JSON-RPC 2.0**: envelope types and the `Json2Codec` implementation
//! - **Writer**: the buffered `ResponseWriter` codecs write into
//! - **Compression**: `Accept-Encoding` based response encoders
//! - **Observability**: OpenTelemetry bootstrap for traces, metrics and logs
//!
//! The crate knows nothing about sockets. `hrpc-server` owns the registry,
//! the dispatch pipeline and the HTTP transport.
//!
//! # Example
//!
//! ```rust
//! use hrpc_core::json2::{decode_client_response, encode_client_request};
//! use serde_json::json;
//!
//! let body = encode_client_request("Arith.Multiply", &json!({"A": 4, "B": 2}), 1).unwrap();
//! assert!(!body.is_empty());
//!
//! let product: i64 = decode_client_response(br#"{"jsonrpc":"2.0","result":8,"id":1}"#).unwrap();
//! assert_eq!(product, 8);
//! ```

pub mod codec;
pub mod compression;
pub mod error;
pub mod json2;
pub mod observability;
pub mod types;
pub mod writer;

pub use codec::{Args, Codec, CodecRequest, HttpRequest};
pub use compression::{CompressionSelector, Encoder, EncoderSelector, IdentitySelector};
pub use error::{codes, Error, Result, RpcError};
pub use json2::Json2Codec;
pub use observability::{init_observability, shutdown_observability, ObservabilityConfig};
pub use types::EmptyResponse;
pub use writer::ResponseWriter;
