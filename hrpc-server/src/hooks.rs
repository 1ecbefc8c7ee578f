//! Request hooks
//!
//! Four optional extension points run around every dispatched call, in this
//! order:
//!
//! 1. **intercept**: may replace the HTTP request wholesale
//! 2. **before**: may mutate the request in place, body included
//! 3. **validate**: sees the decoded arguments; an error skips the call
//! 4. **after**: observes the final outcome and status code
//!
//! Each phase holds at most one hook. Setting a phase twice keeps the last one.
//! Requests rejected before a method is resolved (wrong HTTP method, unknown
//! content type, undecodable envelope, unknown method) never reach the hooks.
//!
//! # Examples
//!
//! ```rust
//! use hrpc_server::Hooks;
//!
//! let hooks = Hooks::new()
//!     .before(|info| {
//!         info.request
//!             .headers_mut()
//!             .insert("x-trace", http::HeaderValue::from_static("1"));
//!     })
//!     .after(|info| {
//!         tracing::info!(method = %info.method, status = %info.status_code, "call finished");
//!     });
//! assert!(hooks.has_before());
//! ```

use hrpc_core::{Error, HttpRequest, Result};
use http::StatusCode;
use std::any::Any;
use std::sync::Arc;

/// Request-scoped context handed to hooks
#[derive(Debug)]
pub struct RequestInfo {
    /// Method name as sent by the client
    pub method: String,
    /// The live HTTP request
    pub request: HttpRequest,
    /// Error of the call so far
    pub error: Option<Error>,
    /// Status code of the response, final once `after` runs
    pub status_code: StatusCode,
}

impl RequestInfo {
    pub fn new(method: impl Into<String>, request: HttpRequest) -> Self {
        Self {
            method: method.into(),
            request,
            error: None,
            status_code: StatusCode::OK,
        }
    }
}

type InterceptFn = dyn Fn(&RequestInfo) -> Option<HttpRequest> + Send + Sync;
type BeforeFn = dyn Fn(&mut RequestInfo) + Send + Sync;
type ValidateFn = dyn Fn(&RequestInfo, &dyn Any) -> Result<()> + Send + Sync;
type AfterFn = dyn Fn(&RequestInfo) + Send + Sync;

/// The hook set of a server
#[derive(Clone, Default)]
pub struct Hooks {
    intercept: Option<Arc<InterceptFn>>,
    before: Option<Arc<BeforeFn>>,
    validate: Option<Arc<ValidateFn>>,
    after: Option<Arc<AfterFn>>,
}

impl Hooks {
    /// No hooks
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the intercept hook
    ///
    /// Returning `Some(request)` replaces the request seen by later phases and
    /// by the method.
    pub fn intercept<F>(mut self, f: F) -> Self
    where
        F: Fn(&RequestInfo) -> Option<HttpRequest> + Send + Sync + 'static,
    {
        self.intercept = Some(Arc::new(f));
        self
    }

    /// Set the before hook
    ///
    /// If it changes the request body, the arguments are decoded again from the
    /// new body. The new body must name the same method; otherwise the call
    /// fails without invoking anything.
    pub fn before<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut RequestInfo) + Send + Sync + 'static,
    {
        self.before = Some(Arc::new(f));
        self
    }

    /// Set the validate hook
    ///
    /// The second argument is the decoded argument value; downcast it to the
    /// method's argument type.
    pub fn validate<F>(mut self, f: F) -> Self
    where
        F: Fn(&RequestInfo, &dyn Any) -> Result<()> + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(f));
        self
    }

    /// Set the after hook
    pub fn after<F>(mut self, f: F) -> Self
    where
        F: Fn(&RequestInfo) + Send + Sync + 'static,
    {
        self.after = Some(Arc::new(f));
        self
    }

    pub fn has_intercept(&self) -> bool {
        self.intercept.is_some()
    }

    pub fn has_before(&self) -> bool {
        self.before.is_some()
    }

    pub fn has_validate(&self) -> bool {
        self.validate.is_some()
    }

    pub fn has_after(&self) -> bool {
        self.after.is_some()
    }

    pub(crate) fn run_intercept(&self, info: &mut RequestInfo) {
        if let Some(intercept) = &self.intercept {
            if let Some(request) = intercept(info) {
                tracing::debug!(method = %info.method, "Request replaced by intercept hook");
                info.request = request;
            }
        }
    }

    pub(crate) fn run_before(&self, info: &mut RequestInfo) {
        if let Some(before) = &self.before {
            before(info);
        }
    }

    pub(crate) fn run_validate(&self, info: &RequestInfo, args: &dyn Any) -> Result<()> {
        match &self.validate {
            Some(validate) => validate(info, args),
            None => Ok(()),
        }
    }

    pub(crate) fn run_after(&self, info: &RequestInfo) {
        if let Some(after) = &self.after {
            after(info);
        }
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("intercept", &self.has_intercept())
            .field("before", &self.has_before())
            .field("validate", &self.has_validate())
            .field("after", &self.has_after())
            .finish()
    }
}
