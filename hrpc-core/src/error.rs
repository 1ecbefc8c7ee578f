//! Error types for hrpc
//!
//! Two error shapes live here:
//!
//! - **Error**: the dispatcher's error enum. Every failure the registry, the
//!   pipeline or a codec can produce is one of its variants.
//! - **RpcError**: the structured JSON-RPC 2.0 error object. Methods return it
//!   (wrapped in `Error::Rpc`) when they want full control over the code and
//!   data that reach the wire.
//!
//! # Wrapping rule
//!
//! A codec that speaks a structured error format forwards `Error::Rpc` as-is and
//! wraps every other variant into a generic server error using the variant's
//! `Display` text. That is the only conversion performed anywhere.
//!
//! # Examples
//!
//! ```rust
//! use hrpc_core::{Error, RpcError};
//! use http::StatusCode;
//!
//! let bare = Error::other("response error");
//! assert_eq!(bare.to_string(), "response error");
//!
//! let structured: Error = RpcError::invalid_params("B must be positive").into();
//! assert_eq!(structured.status(), StatusCode::BAD_REQUEST);
//! ```

use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Result type for hrpc operations
pub type Result<T> = std::result::Result<T, Error>;

/// JSON-RPC 2.0 reserved error codes.
pub mod codes {
    /// Invalid JSON was received.
    pub const PARSE_ERROR: i32 = -32700;
    /// The JSON sent is not a valid request object.
    pub const INVALID_REQUEST: i32 = -32600;
    /// The method does not exist or is not available.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid method parameters.
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal JSON-RPC error.
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Generic error raised by user code.
    pub const SERVER_ERROR: i32 = -32000;
}

/// Dispatcher error type
///
/// Each variant carries the complete, human readable message. The message is
/// what plain-text responses contain and what the JSON-RPC codec places in
/// the `message` field of a wrapped server error, so it is built once, where
/// the failure is detected.
///
/// # Categories
///
/// - **Transport**: `HttpMethodNotAllowed`, `UnsupportedMediaType`, `PayloadTooLarge`
/// - **Codec**: `MethodMalformed`, `CodecRequestMethod`, `CodecRead`, `CodecWrite`
/// - **Lookup**: `ServiceNotFound`, `MethodNotFound`
/// - **Setup**: `Registration`, `Io`
/// - **Call**: `Rpc`, `Application`, `Internal`
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Structured JSON-RPC error, forwarded to the wire verbatim
    #[error("JSON-RPC error: {0}")]
    Rpc(#[from] RpcError),

    /// The codec produced a method name the registry cannot interpret
    #[error("{0}")]
    MethodMalformed(String),

    /// No service is registered under the requested name
    #[error("{0}")]
    ServiceNotFound(String),

    /// The service exists but has no such method, or the key is unknown
    #[error("{0}")]
    MethodNotFound(String),

    /// The HTTP method was not POST
    #[error("{0}")]
    HttpMethodNotAllowed(String),

    /// No codec is registered for the request's content type
    #[error("{0}")]
    UnsupportedMediaType(String),

    /// The request body exceeded the configured limit
    #[error("{0}")]
    PayloadTooLarge(String),

    /// The codec could not extract a method name
    #[error("{0}")]
    CodecRequestMethod(String),

    /// The codec could not decode the method arguments
    #[error("{0}")]
    CodecRead(String),

    /// The codec failed to encode the reply or error
    #[error("{0}")]
    CodecWrite(String),

    /// A service, method or alias could not be registered
    #[error("{0}")]
    Registration(String),

    /// Unexpected failure inside the dispatcher or a method
    #[error("{0}")]
    Internal(String),

    /// Error returned by application code that carries no code of its own
    #[error("{0}")]
    Application(String),

    /// Socket level failure while binding or accepting
    #[error("IO error: {0}")]
    Io(String),
}

impl Error {
    /// Create a bare application error from a message.
    ///
    /// This is what service methods and validate hooks usually return. The
    /// JSON-RPC codec sends it as a server error (`-32000`) whose message is
    /// exactly `msg`.
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Application(msg.into())
    }

    /// HTTP status the dispatcher associates with this error
    ///
    /// Codecs are free to override it; the JSON-RPC codec always answers 200.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::HttpMethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Error::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Error::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Error::Registration(_) | Error::Internal(_) | Error::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Stable, low-cardinality label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Rpc(_) => "rpc",
            Error::MethodMalformed(_) => "method_malformed",
            Error::ServiceNotFound(_) => "service_not_found",
            Error::MethodNotFound(_) => "method_not_found",
            Error::HttpMethodNotAllowed(_) => "http_method_not_allowed",
            Error::UnsupportedMediaType(_) => "unsupported_media_type",
            Error::PayloadTooLarge(_) => "payload_too_large",
            Error::CodecRequestMethod(_) => "codec_request_method",
            Error::CodecRead(_) => "codec_read",
            Error::CodecWrite(_) => "codec_write",
            Error::Registration(_) => "registration",
            Error::Internal(_) => "internal",
            Error::Application(_) => "application",
            Error::Io(_) => "io",
        }
    }

    /// Whether this error means the requested method could not be resolved
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::MethodMalformed(_) | Error::ServiceNotFound(_) | Error::MethodNotFound(_)
        )
    }
}

/// JSON-RPC 2.0 error object
///
/// The exact wire shape of the `error` member of a response: a numeric code,
/// a short message and optional free-form data. `data` is omitted from the
/// JSON when it is `None`.
///
/// # Examples
///
/// ```rust
/// use hrpc_core::RpcError;
/// use serde_json::json;
///
/// let err = RpcError::with_data(1001, "insufficient funds", json!({"balance": 50}));
/// assert_eq!(err.code, 1001);
/// assert_eq!(err.to_string(), "[1001] insufficient funds");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    /// Error code
    pub code: i32,
    /// Short description of the error
    pub message: String,
    /// Additional information about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    /// Create an error object without data
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create an error object carrying additional data
    pub fn with_data(code: i32, message: impl Into<String>, data: Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Invalid JSON was received (`-32700`)
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(codes::PARSE_ERROR, message)
    }

    /// The request object is not valid (`-32600`)
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(codes::INVALID_REQUEST, message)
    }

    /// The method could not be resolved (`-32601`)
    pub fn method_not_found(message: impl Into<String>) -> Self {
        Self::new(codes::METHOD_NOT_FOUND, message)
    }

    /// The parameters are not acceptable to the method (`-32602`)
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(codes::INVALID_PARAMS, message)
    }

    /// Internal JSON-RPC error (`-32603`)
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(codes::INTERNAL_ERROR, message)
    }

    /// Generic error raised by user code (`-32000`)
    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(codes::SERVER_ERROR, message)
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}
