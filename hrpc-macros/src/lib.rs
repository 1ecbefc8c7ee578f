//! Procedural macros for the hrpc dispatcher
//!
//! # Available Macros
//!
//! ## `#[service]` - RPC service from an `impl` block
//!
//! Implements `hrpc_server::Service` for the self type of an inherent `impl`
//! block. Every `pub async fn` taking `&self`, an optional `&HttpRequest` and
//! one owned argument, and returning a `Result`, becomes an RPC method. Its
//! wire name is the lowerCamelCase form of the Rust name, so `response_error`
//! is called as `Service.ResponseError` or `Service/responseError`.
//!
//! Other items in the block are left untouched and are not registered.
//!
//! # Benefits Over Manual Implementation
//!
//! Without the macro, you'd write:
//!
//! ```ignore
//! impl Service for Arith {
//!     fn type_name() -> &'static str { "Arith" }
//!
//!     fn methods() -> Vec<MethodDef<Self>> {
//!         vec![MethodDef::new("multiply", |svc: &Self, args: Operands| {
//!             svc.multiply(args).boxed()
//!         })]
//!     }
//! }
//! ```
//!
//! With the macro, the method table follows the `impl` block automatically.
//!
//! # Examples
//!
//! ```ignore
//! use hrpc_core::{HttpRequest, Result};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Default, Deserialize)]
//! struct Operands { a: i64, b: i64 }
//!
//! #[derive(Serialize)]
//! struct Product { result: i64 }
//!
//! struct Arith;
//!
//! #[hrpc::service]
//! impl Arith {
//!     pub async fn multiply(&self, args: Operands) -> Result<Product> {
//!         Ok(Product { result: args.a * args.b })
//!     }
//!
//!     // HTTP-aware: receives the request as well
//!     pub async fn user_agent(&self, req: &HttpRequest, _args: ()) -> Result<String> {
//!         Ok(format!("{:?}", req.headers().get("user-agent")))
//!     }
//! }
//!
//! #[hrpc::service(name = "Calculator")]
//! impl Calc {
//!     // registered as "Calculator/..."
//! }
//! ```

mod service;

use proc_macro::TokenStream;

/// Implement `hrpc_server::Service` for the self type of an `impl` block
///
/// Accepts an optional `name = "..."` argument overriding the inferred type
/// name.
#[proc_macro_attribute]
pub fn service(attr: TokenStream, item: TokenStream) -> TokenStream {
    service::service_impl(attr, item)
}
