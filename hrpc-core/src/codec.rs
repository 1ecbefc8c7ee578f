//! Codec abstraction
//!
//! A `Codec` turns an HTTP request into a `CodecRequest`: a per-request object
//! that knows which method is being called, how to decode its arguments and
//! how to encode the reply or an error onto the response. The dispatcher picks
//! a codec by `Content-Type` and never looks at the body itself.
//!
//! # Argument buffers
//!
//! The dispatcher allocates a zero-valued argument value for the target method
//! and hands it to the codec as `&mut dyn Args`. JSON based codecs call
//! `Args::decode_json`; other codecs downcast through `Args::as_any_mut` to the
//! concrete type they know how to fill.
//!
//! # Examples
//!
//! ```rust
//! use hrpc_core::codec::Args;
//! use serde::Deserialize;
//! use serde_json::value::RawValue;
//!
//! #[derive(Debug, Default, Deserialize)]
//! struct Pair { a: i32, b: i32 }
//!
//! let mut args: Box<dyn Args> = Box::new(Pair::default());
//! let raw = RawValue::from_string(r#"{"a":4,"b":2}"#.to_string()).unwrap();
//! args.decode_json(&raw).unwrap();
//!
//! let pair = args.as_any().downcast_ref::<Pair>().unwrap();
//! assert_eq!(pair.a * pair.b, 8);
//! ```

use crate::error::{Error, Result};
use crate::writer::ResponseWriter;
use bytes::Bytes;
use http::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::value::RawValue;
use serde_json::Value;
use std::any::Any;

/// A fully buffered HTTP request, as seen by codecs, hooks and methods
pub type HttpRequest = http::Request<Bytes>;

/// Type-erased argument buffer
///
/// Implemented for every `DeserializeOwned + Send + 'static` type.
pub trait Args: Any + Send {
    /// Replace the value with one decoded from JSON text
    fn decode_json(&mut self, params: &RawValue) -> serde_json::Result<()>;

    /// Borrow as `Any` for downcasting
    fn as_any(&self) -> &dyn Any;

    /// Mutably borrow as `Any` for downcasting
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Convert into a boxed `Any` to recover the concrete value
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

impl<T> Args for T
where
    T: DeserializeOwned + Send + 'static,
{
    fn decode_json(&mut self, params: &RawValue) -> serde_json::Result<()> {
        *self = serde_json::from_str(params.get())?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

/// Produces a `CodecRequest` for each incoming request
pub trait Codec: Send + Sync {
    /// Bind a codec request to `request`
    ///
    /// Implementations typically parse the body eagerly and remember any
    /// failure, reporting it from `method()`.
    fn new_request(&self, request: &HttpRequest) -> Box<dyn CodecRequest>;
}

/// Decoder/encoder bound to a single request
pub trait CodecRequest: Send {
    /// Name of the method to call, in `Service.Method` notation
    fn method(&self) -> Result<String>;

    /// Fill `args` from the request
    fn read_request(&mut self, args: &mut dyn Args) -> Result<()>;

    /// Encode a successful reply
    fn write_response(&self, w: &mut ResponseWriter, reply: Value) -> Result<()>;

    /// Encode an error
    ///
    /// `status` is the dispatcher's suggestion; codecs whose wire format
    /// carries errors in the body may ignore it.
    fn write_error(&self, w: &mut ResponseWriter, status: StatusCode, err: &Error)
        -> Result<()>;
}
