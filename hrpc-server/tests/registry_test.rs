//! Registration API integration tests

mod common;

use common::{builder, server, Service1};
use hrpc_macros::service;
use hrpc_server::Service;
use std::sync::Arc;

#[test]
fn test_service_macro_method_table() {
    let names: Vec<String> = Service1::methods()
        .iter()
        .map(|def| def.name().to_string())
        .collect();
    assert_eq!(
        names,
        vec!["multiply", "responseError", "structuredError", "path", "explode"]
    );
    assert_eq!(Service1::type_name(), "Service1");

    let path = Service1::methods().remove(3);
    assert!(path.pass_request());
}

#[test]
fn test_has_method_after_register() {
    let (server, _) = server();

    assert!(server.has_method("Service1.Multiply"));
    assert!(server.has_method("Service1/multiply"));
    assert!(server.has_method("Service1.ResponseError"));
    assert!(!server.has_method("Service1.Calls"));
    assert!(!server.has_method("Service2.Multiply"));
    assert_eq!(server.methods().len(), 5);
}

#[test]
fn test_duplicate_service_is_rejected() {
    let (server, _) = server();

    let err = server
        .register_service(Service1::default(), None)
        .unwrap_err();
    assert!(err
        .to_string()
        .starts_with("rpc: service method already defined: \"Service1/"));
    assert_eq!(server.methods().len(), 5);

    // Same methods under another name are fine.
    server
        .register_service(Service1::default(), Some("Other"))
        .unwrap();
    assert!(server.has_method("Other.Multiply"));
    assert_eq!(server.methods().len(), 10);
}

#[test]
fn test_register_method_and_alias() {
    let server = builder().build().unwrap();
    let service = Arc::new(Service1::default());

    let err = server.register_alias("times", "Math/times").unwrap_err();
    assert_eq!(
        err.to_string(),
        "rpc: service method Math/times for alias not found"
    );

    server
        .register_method(Arc::clone(&service), "Math/times", "Multiply")
        .unwrap();
    assert_eq!(server.methods(), vec!["Math/times"]);

    server.register_alias("times", "Math/times").unwrap();
    assert!(server.has_method("times"));

    let (_, direct) = server.registry().get("Math/times").unwrap();
    let (_, aliased) = server.registry().get("times").unwrap();
    assert!(Arc::ptr_eq(&direct, &aliased));
    assert_eq!(aliased.service.name, "Math");

    let err = server.register_alias("times", "Math/times").unwrap_err();
    assert_eq!(err.to_string(), "rpc: service method alias times already defined");
}

struct Named;

#[service(name = "Calculator")]
impl Named {
    pub async fn add(&self, args: (i64, i64)) -> hrpc_core::Result<i64> {
        Ok(args.0 + args.1)
    }

    // Not an RPC method: returns no Result.
    pub async fn describe(&self, _args: ()) -> String {
        "calculator".to_string()
    }
}

#[tokio::test]
async fn test_service_macro_name_override() {
    assert_eq!(Named::type_name(), "Calculator");
    assert_eq!(Named::methods().len(), 1);
    assert_eq!(Named.describe(()).await, "calculator");

    let server = builder().build().unwrap();
    server.register_service(Named, None).unwrap();
    assert_eq!(server.methods(), vec!["Calculator/add"]);
}

#[test]
fn test_invalid_service_name() {
    let server = builder().build().unwrap();
    let err = server
        .register_service(Service1::default(), Some("lowercase"))
        .unwrap_err();
    assert_eq!(err.to_string(), "rpc: no service name for type \"Service1\"");
    assert!(server.methods().is_empty());
}
