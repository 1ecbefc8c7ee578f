//! Server builder for constructing RPC servers
//!
//! The builder pattern provides a fluent API for configuring and creating
//! a `Server`. It allows you to:
//! - Set the bind address used by `Server::run`
//! - Register codecs by content type
//! - Install hooks
//! - Limit request body size
//! - Enable observability
//!
//! Services are registered on the built `Server`, not on the builder.
//!
//! # Examples
//!
//! ```rust,no_run
//! use hrpc_core::Json2Codec;
//! use hrpc_server::Server;
//!
//! # async fn example() -> hrpc_core::Result<()> {
//! let server = Server::builder()
//!     .bind_str("127.0.0.1:8080")?
//!     .codec(Json2Codec::new(), "application/json")
//!     .max_body_size(64 * 1024)
//!     .after(|info| tracing::info!(method = %info.method, "done"))
//!     .with_default_observability()
//!     .build()?;
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

use crate::hooks::{Hooks, RequestInfo};
use crate::{Inner, Server, ServerMetrics};
use hrpc_core::{Codec, Error, HttpRequest, ObservabilityConfig, Result};
use std::any::Any;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

/// Default limit on request body size: 1 MiB
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Builder for constructing an RPC server
pub struct ServerBuilder {
    addr: Option<SocketAddr>,
    codecs: HashMap<String, Arc<dyn Codec>>,
    hooks: Hooks,
    max_body_size: usize,
    observability_config: Option<ObservabilityConfig>,
    service_name: Option<String>,
}

impl ServerBuilder {
    /// Create a new server builder
    pub fn new() -> Self {
        Self {
            addr: None,
            codecs: HashMap::new(),
            hooks: Hooks::new(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            observability_config: None,
            service_name: None,
        }
    }

    /// Set the bind address for the server
    pub fn bind(mut self, addr: impl Into<SocketAddr>) -> Self {
        self.addr = Some(addr.into());
        self
    }

    /// Set the bind address from a string (e.g., "127.0.0.1:8080")
    pub fn bind_str(mut self, addr: &str) -> Result<Self> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|e| Error::Internal(format!("Invalid address: {}", e)))?;
        self.addr = Some(addr);
        Ok(self)
    }

    /// Register a codec for a content type
    ///
    /// Content types are matched case-insensitively. Registering the same
    /// content type again replaces the codec.
    pub fn codec(mut self, codec: impl Codec + 'static, content_type: &str) -> Self {
        self.codecs
            .insert(content_type.to_ascii_lowercase(), Arc::new(codec));
        self
    }

    /// Set the intercept hook (replaces any previous one)
    pub fn intercept<F>(mut self, f: F) -> Self
    where
        F: Fn(&RequestInfo) -> Option<HttpRequest> + Send + Sync + 'static,
    {
        self.hooks = self.hooks.intercept(f);
        self
    }

    /// Set the before hook (replaces any previous one)
    pub fn before<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut RequestInfo) + Send + Sync + 'static,
    {
        self.hooks = self.hooks.before(f);
        self
    }

    /// Set the validate hook (replaces any previous one)
    pub fn validate<F>(mut self, f: F) -> Self
    where
        F: Fn(&RequestInfo, &dyn Any) -> Result<()> + Send + Sync + 'static,
    {
        self.hooks = self.hooks.validate(f);
        self
    }

    /// Set the after hook (replaces any previous one)
    pub fn after<F>(mut self, f: F) -> Self
    where
        F: Fn(&RequestInfo) + Send + Sync + 'static,
    {
        self.hooks = self.hooks.after(f);
        self
    }

    /// Replace the whole hook set
    pub fn hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Set the request body limit in bytes (default: 1 MiB)
    pub fn max_body_size(mut self, limit: usize) -> Self {
        self.max_body_size = limit;
        self
    }

    /// Enable OpenTelemetry observability with custom configuration
    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability_config = Some(config);
        self
    }

    /// Enable OpenTelemetry observability with default configuration
    pub fn with_default_observability(mut self) -> Self {
        self.observability_config = Some(ObservabilityConfig::default());
        self
    }

    /// Set service name for observability (used if observability is enabled)
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Build the server
    ///
    /// No socket is opened here; see `Server::serve` and `Server::run`.
    pub fn build(self) -> Result<Server> {
        let metrics = if let Some(mut config) = self.observability_config {
            if let Some(name) = self.service_name {
                config.service_name = name;
            }

            hrpc_core::init_observability(config.clone()).map_err(|e| {
                Error::Internal(format!("Failed to initialize observability: {}", e))
            })?;

            Some(Arc::new(ServerMetrics::new(config.service_name)))
        } else {
            None
        };

        if self.codecs.is_empty() {
            tracing::warn!("Server built without codecs; every request will be rejected with 415");
        }

        Ok(Server {
            inner: Arc::new(Inner {
                codecs: self.codecs,
                registry: Default::default(),
                hooks: self.hooks,
                metrics,
                addr: self.addr,
                max_body_size: self.max_body_size,
            }),
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
