//! JSON-RPC 2.0 envelopes
//!
//! The request and response objects exchanged by the JSON-RPC 2.0 codec.
//! `params` and `id` are kept as raw JSON text: parameters are decoded
//! straight into the method's argument type, and the identifier is echoed
//! back byte-for-byte without any type checking.
//!
//! # Examples
//!
//! ```rust
//! use hrpc_core::types::ServerRequest;
//!
//! let req: ServerRequest =
//!     serde_json::from_str(r#"{"jsonrpc":"2.0","method":"Arith.Add","id":"7"}"#).unwrap();
//! assert_eq!(req.method, "Arith.Add");
//! assert_eq!(req.id.unwrap().get(), r#""7""#);
//! ```

use crate::error::RpcError;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;

/// The only protocol version the codec accepts
pub const VERSION: &str = "2.0";

/// A JSON-RPC request as received by the server
///
/// Every field defaults when missing so that a partially valid body still
/// yields an envelope; validation of the version happens in the codec.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerRequest {
    /// Protocol version, must be `"2.0"`
    #[serde(rename = "jsonrpc", default)]
    pub version: String,

    /// Name of the method to invoke, in `Service.Method` notation
    #[serde(default)]
    pub method: String,

    /// Structured parameter value, `None` when absent or `null`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Box<RawValue>>,

    /// Request identifier, `None` for notifications
    #[serde(default)]
    pub id: Option<Box<RawValue>>,
}

impl ServerRequest {
    /// A request without identifier expects no response
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// A JSON-RPC response as written by the server
///
/// Exactly one of `result` and `error` is set. The constructors enforce it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerResponse {
    /// Protocol version, always `"2.0"`
    #[serde(rename = "jsonrpc")]
    pub version: String,

    /// Value returned by the method, omitted on error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error object, omitted on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,

    /// Identifier copied from the request
    #[serde(default)]
    pub id: Option<Box<RawValue>>,
}

impl ServerResponse {
    /// Successful response carrying `result`
    pub fn success(result: Value, id: Option<Box<RawValue>>) -> Self {
        Self {
            version: VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Error response carrying `error`
    pub fn error(error: RpcError, id: Option<Box<RawValue>>) -> Self {
        Self {
            version: VERSION.to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }
}

/// A JSON-RPC request as sent by a client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRequest {
    /// Protocol version, always `"2.0"`
    #[serde(rename = "jsonrpc")]
    pub version: String,

    /// Method to invoke
    pub method: String,

    /// Method parameters
    pub params: Value,

    /// Request identifier
    pub id: u64,
}

/// Reply type for methods that have nothing to return
///
/// Serializes as `{}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyResponse {}
