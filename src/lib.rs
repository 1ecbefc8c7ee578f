//! hrpc - RPC over HTTP POST
//!
//! This is the main convenience crate that re-exports all hrpc sub-crates.
//!
//! # Architecture
//!
//! hrpc is organized into modular crates:
//!
//! - **hrpc-core**: error taxonomy, codec traits, the JSON-RPC 2.0 codec, compression, observability
//! - **hrpc-server**: method registry, hooks, dispatch pipeline and the hyper transport
//! - **hrpc-macros**: the `#[service]` attribute macro
//!
//! Code generated by `#[service]` refers to `::hrpc_server`, so crates using
//! the macro depend on `hrpc-server` directly.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use hrpc::{service, Json2Codec, Server};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Default, Deserialize)]
//! #[serde(rename_all = "PascalCase")]
//! struct Operands { a: i64, b: i64 }
//!
//! #[derive(Serialize)]
//! #[serde(rename_all = "PascalCase")]
//! struct Product { result: i64 }
//!
//! struct Arith;
//!
//! #[service]
//! impl Arith {
//!     pub async fn multiply(&self, args: Operands) -> hrpc::Result<Product> {
//!         Ok(Product { result: args.a * args.b })
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
//!     // curl -d '{"jsonrpc":"2.0","method":"Arith.Multiply","params":{"A":4,"B":2},"id":1}' \
//!     //      -H 'Content-Type: application/json' http://127.0.0.1:8080/
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

// Re-export all public APIs from sub-crates
pub use hrpc_core as core;
pub use hrpc_macros as macros;
pub use hrpc_server as server;

// Convenience re-exports of the most commonly used items
pub use hrpc_core::{Error, Json2Codec, Result, RpcError};
pub use hrpc_macros::service;
pub use hrpc_server::{Hooks, RequestInfo, Server, ServerBuilder};
