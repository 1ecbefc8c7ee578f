//! Method registry
//!
//! The registry maps dispatch keys (`Service/method`) and aliases to bound
//! method descriptors. It is owned by one `Server` and only grows: there is no
//! deregistration.
//!
//! # Keys
//!
//! `register` stores every method of a service under
//! `<service name>/<method name>`, where the method name has its first
//! character lower-cased. Lookups accept that canonical form as well as the
//! dotted `Service.Method` form used on the wire, so both `Arith/multiply` and
//! `Arith.Multiply` resolve to the same entry.
//!
//! # Locking
//!
//! One mutex covers methods and aliases. It is held for map access only,
//! never while decoding or invoking.

use crate::handler::{Invoke, MethodResult, Service};
use hrpc_core::{Args, Error, HttpRequest, Result};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A registered receiver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    /// Name the service is registered under
    pub name: String,
    /// Rust type name of the receiver
    pub type_name: &'static str,
}

impl ServiceInfo {
    pub fn new(name: impl Into<String>, type_name: &'static str) -> Self {
        Self {
            name: name.into(),
            type_name,
        }
    }
}

/// Method descriptor: one entry of the dispatch table
pub struct MethodSpec {
    /// Owning service
    pub service: Arc<ServiceInfo>,
    /// Method part of the dispatch key
    pub name: String,
    /// Dispatch key the method is stored under
    pub key: String,
    /// Type name of the argument value
    pub args_type: &'static str,
    /// Type name of the reply value
    pub reply_type: &'static str,
    /// Whether the method receives the HTTP request
    pub pass_request: bool,
    invoker: Box<dyn Invoke>,
}

impl MethodSpec {
    pub(crate) fn new(
        service: Arc<ServiceInfo>,
        name: String,
        args_type: &'static str,
        reply_type: &'static str,
        pass_request: bool,
        invoker: Box<dyn Invoke>,
    ) -> Self {
        let key = format!("{}/{}", service.name, name);
        Self {
            service,
            name,
            key,
            args_type,
            reply_type,
            pass_request,
            invoker,
        }
    }

    /// Dispatch key of this method
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Allocate a zero-valued argument buffer
    pub fn new_args(&self) -> Box<dyn Args> {
        self.invoker.new_args()
    }

    /// Invoke the method
    pub fn call<'a>(&'a self, request: &'a HttpRequest, args: Box<dyn Args>) -> MethodResult<'a> {
        self.invoker.call(request, args)
    }
}

impl std::fmt::Debug for MethodSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodSpec")
            .field("key", &self.key)
            .field("service", &self.service.name)
            .field("args_type", &self.args_type)
            .field("reply_type", &self.reply_type)
            .field("pass_request", &self.pass_request)
            .finish()
    }
}

#[derive(Default)]
struct State {
    methods: HashMap<String, Arc<MethodSpec>>,
    aliases: HashMap<String, String>,
}

impl State {
    fn lookup(&self, key: &str) -> Option<&Arc<MethodSpec>> {
        self.methods
            .get(key)
            .or_else(|| dotted_to_key(key).and_then(|key| self.methods.get(&key)))
    }

    fn has_service(&self, name: &str) -> bool {
        self.methods.values().any(|spec| spec.service.name == name)
    }

    // A method key is taken by an existing method, or by an alias that
    // resolves by name to the same key.
    fn is_method_taken(&self, key: &str) -> bool {
        self.methods.contains_key(key)
            || self
                .aliases
                .keys()
                .any(|alias| alias == key || dotted_to_key(alias).as_deref() == Some(key))
    }

    // An alias is taken by another alias or by any name `lookup` resolves.
    fn is_alias_taken(&self, alias: &str) -> bool {
        self.aliases.contains_key(alias) || self.lookup(alias).is_some()
    }
}

/// Service and method registry
#[derive(Default)]
pub struct Registry {
    state: Mutex<State>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register every method of `receiver`
    ///
    /// With no explicit `name` the service is named after `S::type_name()`.
    /// Either name must start with an uppercase letter. The call is atomic: if
    /// any resulting key is already taken, nothing is registered.
    pub fn register<S: Service>(&self, receiver: Arc<S>, name: Option<&str>) -> Result<()> {
        let type_name = S::type_name();
        let service_name = match name.filter(|name| !name.is_empty()) {
            Some(name) if is_exported(name) => name,
            Some(_) => {
                return Err(Error::Registration(format!(
                    "rpc: no service name for type {:?}",
                    type_name
                )))
            }
            None if is_exported(type_name) => type_name,
            None => {
                return Err(Error::Registration(format!(
                    "rpc: type {:?} is not exported",
                    type_name
                )))
            }
        };

        let service = Arc::new(ServiceInfo::new(service_name, type_name));
        let mut specs = Vec::new();
        for def in S::methods() {
            let Some(method) = lower_first(def.name()) else {
                tracing::debug!(method = def.name(), "Skipping method with non-ASCII name");
                continue;
            };
            specs.push(def.bind(Arc::clone(&service), method, Arc::clone(&receiver)));
        }

        if specs.is_empty() {
            return Err(Error::Registration(format!(
                "rpc: {:?} has no exported methods of suitable type",
                service_name
            )));
        }

        let mut state = self.lock();
        let mut batch = HashSet::new();
        for spec in &specs {
            if state.is_method_taken(&spec.key) || !batch.insert(spec.key.as_str()) {
                return Err(Error::Registration(format!(
                    "rpc: service method already defined: {:?}",
                    spec.key
                )));
            }
        }
        let count = specs.len();
        for spec in specs {
            state.methods.insert(spec.key.clone(), Arc::new(spec));
        }
        drop(state);

        tracing::info!(service = %service.name, methods = count, "Registered service");
        Ok(())
    }

    /// Register a single method of `receiver` under an explicit key
    ///
    /// `method_name` is matched against the method table as written or with its
    /// first character lower-cased, so `Multiply` finds `multiply`.
    pub fn register_method<S: Service>(
        &self,
        receiver: Arc<S>,
        key: &str,
        method_name: &str,
    ) -> Result<()> {
        if key.is_empty() {
            return Err(Error::Registration(
                "rpc: service method name must not be empty".to_string(),
            ));
        }

        let lowered = lower_first(method_name);
        let def = S::methods()
            .into_iter()
            .find(|def| def.name() == method_name || lowered.as_deref() == Some(def.name()))
            .ok_or_else(|| {
                Error::Registration(format!("rpc: service method not found: {:?}", method_name))
            })?;

        let (service_name, method) = key.rsplit_once('/').unwrap_or((S::type_name(), key));
        let service = Arc::new(ServiceInfo::new(service_name, S::type_name()));
        let mut spec = def.bind(service, method.to_string(), receiver);
        spec.key = key.to_string();

        let mut state = self.lock();
        if state.is_method_taken(key) {
            return Err(Error::Registration(format!(
                "rpc: service method already defined: {:?}",
                key
            )));
        }
        state.methods.insert(key.to_string(), Arc::new(spec));
        drop(state);

        tracing::info!(key, method = method_name, "Registered method");
        Ok(())
    }

    /// Make `alias` resolve to the method registered under `target`
    ///
    /// `target` must already exist and may be given in dotted form. Aliases
    /// are resolved with one level of indirection.
    pub fn register_alias(&self, alias: &str, target: &str) -> Result<()> {
        let mut state = self.lock();
        let target_key = state
            .lookup(target)
            .map(|spec| spec.key.clone())
            .ok_or_else(|| {
                Error::Registration(format!(
                    "rpc: service method {} for alias not found",
                    target
                ))
            })?;
        if state.is_alias_taken(alias) {
            return Err(Error::Registration(format!(
                "rpc: service method alias {} already defined",
                alias
            )));
        }
        state.aliases.insert(alias.to_string(), target_key.clone());
        drop(state);

        tracing::info!(alias, target = %target_key, "Registered alias");
        Ok(())
    }

    /// Resolve a method by alias, dispatch key or dotted name
    pub fn get(&self, key: &str) -> Result<(Arc<ServiceInfo>, Arc<MethodSpec>)> {
        let state = self.lock();
        let key = state.aliases.get(key).map(String::as_str).unwrap_or(key);
        if let Some(spec) = state.lookup(key) {
            return Ok((Arc::clone(&spec.service), Arc::clone(spec)));
        }

        let Some((service, _)) = key.rsplit_once(|c| c == '/' || c == '.') else {
            return Err(Error::MethodMalformed(format!(
                "rpc: service/method request ill-formed: {:?}",
                key
            )));
        };
        let msg = format!("rpc: can't find service method {:?}", key);
        if state.has_service(service) {
            Err(Error::MethodNotFound(msg))
        } else {
            Err(Error::ServiceNotFound(msg))
        }
    }

    /// Whether `key` resolves to a method
    pub fn has_method(&self, key: &str) -> bool {
        self.get(key).is_ok()
    }

    /// Sorted dispatch keys of every registered method
    pub fn methods(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().methods.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of registered methods, aliases excluded
    pub fn len(&self) -> usize {
        self.lock().methods.len()
    }

    /// Whether no method is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("Registry")
            .field("methods", &state.methods.len())
            .field("aliases", &state.aliases.len())
            .finish()
    }
}

fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

/// Lower-case the first character; `None` for empty or non-ASCII names.
fn lower_first(name: &str) -> Option<String> {
    if name.is_empty() || !name.is_ascii() {
        return None;
    }
    let mut lowered = name.to_string();
    lowered[..1].make_ascii_lowercase();
    Some(lowered)
}

// "Service.Method" -> "Service/method"
fn dotted_to_key(name: &str) -> Option<String> {
    let (service, method) = name.rsplit_once('.')?;
    Some(format!("{}/{}", service, lower_first(method)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::MethodDef;
    use futures::FutureExt;
    use serde::Deserialize;

    #[derive(Default, Deserialize)]
    struct Operands {
        a: i64,
        b: i64,
    }

    struct Arith;

    impl Arith {
        async fn multiply(&self, args: Operands) -> Result<i64> {
            Ok(args.a * args.b)
        }

        async fn add(&self, args: Operands) -> Result<i64> {
            Ok(args.a + args.b)
        }
    }

    impl Service for Arith {
        fn type_name() -> &'static str {
            "Arith"
        }

        fn methods() -> Vec<MethodDef<Self>> {
            vec![
                MethodDef::new("Multiply", |svc: &Self, args: Operands| {
                    svc.multiply(args).boxed()
                }),
                MethodDef::new("add", |svc: &Self, args: Operands| svc.add(args).boxed()),
                MethodDef::new("plüs", |svc: &Self, args: Operands| svc.add(args).boxed()),
            ]
        }
    }

    #[allow(non_camel_case_types)]
    struct hidden;

    impl Service for hidden {
        fn type_name() -> &'static str {
            "hidden"
        }

        fn methods() -> Vec<MethodDef<Self>> {
            vec![MethodDef::new("noop", |_: &Self, _: ()| {
                async { Ok::<_, Error>(()) }.boxed()
            })]
        }
    }

    struct Empty;

    impl Service for Empty {
        fn type_name() -> &'static str {
            "Empty"
        }

        fn methods() -> Vec<MethodDef<Self>> {
            Vec::new()
        }
    }

    #[test]
    fn test_register_uses_type_name_and_lowercases_methods() {
        let registry = Registry::new();
        registry.register(Arc::new(Arith), None).unwrap();

        assert_eq!(registry.methods(), vec!["Arith/add", "Arith/multiply"]);
        assert!(registry.has_method("Arith/multiply"));
        assert!(registry.has_method("Arith.Multiply"));
        assert!(registry.has_method("Arith.add"));
        assert!(!registry.has_method("Arith/plüs"));
    }

    #[test]
    fn test_register_with_explicit_name() {
        let registry = Registry::new();
        registry.register(Arc::new(Arith), Some("Calc")).unwrap();
        let (service, spec) = registry.get("Calc.Multiply").unwrap();
        assert_eq!(service.name, "Calc");
        assert_eq!(service.type_name, "Arith");
        assert_eq!(spec.key(), "Calc/multiply");
    }

    #[test]
    fn test_register_naming_errors() {
        let registry = Registry::new();

        let err = registry.register(Arc::new(hidden), None).unwrap_err();
        assert_eq!(err.to_string(), r#"rpc: type "hidden" is not exported"#);

        let err = registry.register(Arc::new(Arith), Some("calc")).unwrap_err();
        assert_eq!(err.to_string(), r#"rpc: no service name for type "Arith""#);

        let err = registry.register(Arc::new(Empty), None).unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"rpc: "Empty" has no exported methods of suitable type"#
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_registration_is_rejected_atomically() {
        let registry = Registry::new();
        registry
            .register_method(Arc::new(Arith), "Arith/add", "add")
            .unwrap();

        let err = registry.register(Arc::new(Arith), None).unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"rpc: service method already defined: "Arith/add""#
        );
        assert_eq!(registry.methods(), vec!["Arith/add"]);
    }

    #[test]
    fn test_register_method_errors() {
        let registry = Registry::new();

        let err = registry
            .register_method(Arc::new(Arith), "", "add")
            .unwrap_err();
        assert_eq!(err.to_string(), "rpc: service method name must not be empty");

        let err = registry
            .register_method(Arc::new(Arith), "Arith/divide", "Divide")
            .unwrap_err();
        assert_eq!(err.to_string(), r#"rpc: service method not found: "Divide""#);
    }

    #[test]
    fn test_register_method_under_custom_key() {
        let registry = Registry::new();
        registry
            .register_method(Arc::new(Arith), "Math/times", "Multiply")
            .unwrap();

        let (service, spec) = registry.get("Math/times").unwrap();
        assert_eq!(service.name, "Math");
        assert_eq!(spec.key(), "Math/times");
        assert!(registry.has_method("Math.Times"));
    }

    #[test]
    fn test_alias_resolution() {
        let registry = Registry::new();

        let err = registry.register_alias("mul", "Arith/multiply").unwrap_err();
        assert_eq!(
            err.to_string(),
            "rpc: service method Arith/multiply for alias not found"
        );

        registry.register(Arc::new(Arith), None).unwrap();
        registry.register_alias("mul", "Arith.Multiply").unwrap();

        let (_, direct) = registry.get("Arith/multiply").unwrap();
        let (_, aliased) = registry.get("mul").unwrap();
        assert!(Arc::ptr_eq(&direct, &aliased));

        let err = registry.register_alias("mul", "Arith/add").unwrap_err();
        assert_eq!(err.to_string(), "rpc: service method alias mul already defined");

        let err = registry.register_alias("Arith/add", "Arith/multiply").unwrap_err();
        assert!(matches!(err, Error::Registration(_)));

        // The dotted form of a method key is the method itself.
        let err = registry.register_alias("Arith.Add", "Arith/multiply").unwrap_err();
        assert_eq!(err.to_string(), "rpc: service method alias Arith.Add already defined");
        let (_, add) = registry.get("Arith.Add").unwrap();
        assert_eq!(add.key(), "Arith/add");

        // An alias claims the keys its dotted form resolves to.
        registry.register_alias("Calc.Multiply", "Arith/multiply").unwrap();
        let err = registry.register(Arc::new(Arith), Some("Calc")).unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"rpc: service method already defined: "Calc/multiply""#
        );
        assert!(!registry.has_method("Calc/add"));
    }

    #[test]
    fn test_get_not_found() {
        let registry = Registry::new();
        registry.register(Arc::new(Arith), None).unwrap();

        let err = registry.get("Arith.Divide").unwrap_err();
        assert_eq!(err.to_string(), r#"rpc: can't find service method "Arith.Divide""#);
        assert!(matches!(err, Error::MethodNotFound(_)));

        let err = registry.get("Geometry/area").unwrap_err();
        assert_eq!(err.to_string(), r#"rpc: can't find service method "Geometry/area""#);
        assert!(matches!(err, Error::ServiceNotFound(_)));

        let err = registry.get("multiply").unwrap_err();
        assert!(matches!(err, Error::MethodMalformed(_)));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_lower_first() {
        assert_eq!(lower_first("Multiply").as_deref(), Some("multiply"));
        assert_eq!(lower_first("X").as_deref(), Some("x"));
        assert_eq!(lower_first("already").as_deref(), Some("already"));
        assert_eq!(lower_first(""), None);
        assert_eq!(lower_first("Ünïcode"), None);
        assert_eq!(dotted_to_key("a.b.C").as_deref(), Some("a.b/c"));
    }
}
