//! Service and method definitions
//!
//! A service is any type implementing `Service`: it names itself and lists its
//! callable methods as `MethodDef` values. Each `MethodDef` wraps a closure
//! with one of two fixed shapes:
//!
//! - **transport-agnostic**: `fn(&S, A) -> BoxFuture<Result<R>>`
//! - **HTTP-aware**: `fn(&S, &HttpRequest, A) -> BoxFuture<Result<R>>`
//!
//! `A` is the argument type (`DeserializeOwned + Default`): the dispatcher
//! allocates `A::default()` for every call and lets the codec fill it. `R` is
//! the reply type (`Serialize`). Both shapes are checked by the compiler, so a
//! `MethodDef` can never be ill-formed at runtime.
//!
//! You rarely build `MethodDef`s by hand: the `#[service]` macro from
//! `hrpc-macros` generates the `Service` impl from an `impl` block.
//!
//! # Examples
//!
//! ```rust
//! use futures::FutureExt;
//! use hrpc_server::{MethodDef, Service};
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
//! impl Arith {
//!     async fn multiply(&self, args: Operands) -> hrpc_core::Result<Product> {
//!         Ok(Product { result: args.a * args.b })
//!     }
//! }
//!
//! impl Service for Arith {
//!     fn type_name() -> &'static str {
//!         "Arith"
//!     }
//!
//!     fn methods() -> Vec<MethodDef<Self>> {
//!         vec![MethodDef::new("multiply", |svc: &Self, args: Operands| {
//!             svc.multiply(args).boxed()
//!         })]
//!     }
//! }
//! ```

use crate::registry::{MethodSpec, ServiceInfo};
use futures::future::BoxFuture;
use hrpc_core::{Args, Error, HttpRequest, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::any::type_name;
use std::sync::Arc;

/// Future returned by an invoked method, resolving to the serialized reply
pub type MethodResult<'a> = BoxFuture<'a, Result<Value>>;

type ErasedFn<S> =
    dyn for<'a> Fn(&'a S, &'a HttpRequest, Box<dyn Args>) -> MethodResult<'a> + Send + Sync;

/// A receiver type exposing RPC methods
pub trait Service: Sized + Send + Sync + 'static {
    /// Name used when the service is registered without an explicit one
    ///
    /// Must start with an uppercase letter to be accepted.
    fn type_name() -> &'static str;

    /// The method table
    fn methods() -> Vec<MethodDef<Self>>;
}

/// One entry of a service's method table
pub struct MethodDef<S> {
    name: String,
    pass_request: bool,
    args_type: &'static str,
    reply_type: &'static str,
    new_args: fn() -> Box<dyn Args>,
    call: Arc<ErasedFn<S>>,
}

impl<S: Service> MethodDef<S> {
    /// Define a transport-agnostic method
    pub fn new<A, R, F>(name: impl Into<String>, f: F) -> Self
    where
        A: DeserializeOwned + Default + Send + 'static,
        R: Serialize + Send + 'static,
        F: for<'a> Fn(&'a S, A) -> BoxFuture<'a, Result<R>> + Send + Sync + 'static,
    {
        let call = erase::<S, _>(move |svc, _request, args| {
            let future = downcast_args::<A>(args).map(|args| f(svc, args));
            Box::pin(async move { to_reply(future?.await?) })
        });
        Self::from_parts::<A, R>(name.into(), false, call)
    }

    /// Define a method that also receives the HTTP request
    pub fn with_request<A, R, F>(name: impl Into<String>, f: F) -> Self
    where
        A: DeserializeOwned + Default + Send + 'static,
        R: Serialize + Send + 'static,
        F: for<'a> Fn(&'a S, &'a HttpRequest, A) -> BoxFuture<'a, Result<R>>
            + Send
            + Sync
            + 'static,
    {
        let call = erase::<S, _>(move |svc, request, args| {
            let future = downcast_args::<A>(args).map(|args| f(svc, request, args));
            Box::pin(async move { to_reply(future?.await?) })
        });
        Self::from_parts::<A, R>(name.into(), true, call)
    }

    fn from_parts<A, R>(name: String, pass_request: bool, call: Arc<ErasedFn<S>>) -> Self
    where
        A: DeserializeOwned + Default + Send + 'static,
    {
        Self {
            name,
            pass_request,
            args_type: type_name::<A>(),
            reply_type: type_name::<R>(),
            new_args: new_args::<A>,
            call,
        }
    }

    /// Method name as written in the method table
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the method receives the HTTP request
    pub fn pass_request(&self) -> bool {
        self.pass_request
    }

    /// Bind the method to a receiver, producing a registry entry
    pub(crate) fn bind(
        self,
        service: Arc<ServiceInfo>,
        method: String,
        receiver: Arc<S>,
    ) -> MethodSpec {
        MethodSpec::new(
            service,
            method,
            self.args_type,
            self.reply_type,
            self.pass_request,
            Box::new(BoundMethod {
                receiver,
                new_args: self.new_args,
                call: self.call,
            }),
        )
    }
}

impl<S> Clone for MethodDef<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            pass_request: self.pass_request,
            args_type: self.args_type,
            reply_type: self.reply_type,
            new_args: self.new_args,
            call: Arc::clone(&self.call),
        }
    }
}

impl<S> std::fmt::Debug for MethodDef<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodDef")
            .field("name", &self.name)
            .field("pass_request", &self.pass_request)
            .field("args_type", &self.args_type)
            .field("reply_type", &self.reply_type)
            .finish()
    }
}

/// A method bound to its receiver, callable without knowing `S`
pub(crate) trait Invoke: Send + Sync {
    fn new_args(&self) -> Box<dyn Args>;

    fn call<'a>(&'a self, request: &'a HttpRequest, args: Box<dyn Args>) -> MethodResult<'a>;
}

struct BoundMethod<S> {
    receiver: Arc<S>,
    new_args: fn() -> Box<dyn Args>,
    call: Arc<ErasedFn<S>>,
}

impl<S: Service> Invoke for BoundMethod<S> {
    fn new_args(&self) -> Box<dyn Args> {
        (self.new_args)()
    }

    fn call<'a>(&'a self, request: &'a HttpRequest, args: Box<dyn Args>) -> MethodResult<'a> {
        (self.call)(self.receiver.as_ref(), request, args)
    }
}

// Pins the closure to the higher-ranked signature stored in `MethodDef`.
fn erase<S, F>(f: F) -> Arc<ErasedFn<S>>
where
    F: for<'a> Fn(&'a S, &'a HttpRequest, Box<dyn Args>) -> MethodResult<'a>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

fn new_args<A>() -> Box<dyn Args>
where
    A: DeserializeOwned + Default + Send + 'static,
{
    Box::new(A::default())
}

fn downcast_args<A: 'static>(args: Box<dyn Args>) -> Result<A> {
    args.into_any()
        .downcast::<A>()
        .map(|args| *args)
        .map_err(|_| {
            Error::Internal(format!(
                "rpc: argument buffer is not a {}",
                type_name::<A>()
            ))
        })
}

fn to_reply<R: Serialize>(reply: R) -> Result<Value> {
    serde_json::to_value(reply).map_err(|e| Error::CodecWrite(e.to_string()))
}
