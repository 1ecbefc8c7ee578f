//! Calculator service over JSON-RPC 2.0
//!
//! Run with `cargo run --example calculator`, then:
//!
//! ```text
//! curl -s -H 'Content-Type: application/json' \
//!      -d '{"jsonrpc":"2.0","method":"Arith.Multiply","params":{"A":6,"B":7},"id":1}' \
//!      http://127.0.0.1:8080/
//! ```

use hrpc::core::{CompressionSelector, HttpRequest};
use hrpc::{service, Error, Json2Codec, RpcError, Server};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Operands {
    a: i64,
    b: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Answer {
    result: i64,
}

#[derive(Default)]
struct Arith {
    calls: AtomicU64,
}

#[service]
impl Arith {
    pub async fn multiply(&self, args: Operands) -> hrpc::Result<Answer> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let result = args
            .a
            .checked_mul(args.b)
            .ok_or_else(|| RpcError::invalid_params("product overflows"))?;
        Ok(Answer { result })
    }

    pub async fn divide(&self, args: Operands) -> hrpc::Result<Answer> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if args.b == 0 {
            return Err(RpcError::invalid_params("division by zero").into());
        }
        let result = args
            .a
            .checked_div(args.b)
            .ok_or_else(|| RpcError::invalid_params("quotient overflows"))?;
        Ok(Answer { result })
    }

    pub async fn calls(&self, _args: ()) -> hrpc::Result<u64> {
        Ok(self.calls.load(Ordering::Relaxed))
    }

    pub async fn user_agent(&self, request: &HttpRequest, _args: ()) -> hrpc::Result<String> {
        Ok(request
            .headers()
            .get("user-agent")
            .and_then(|value| value.to_str().ok())
            .unwrap_or("unknown")
            .to_string())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let server = Server::builder()
        .bind_str("127.0.0.1:8080")?
        .codec(
            Json2Codec::with_encoder_selector(CompressionSelector),
            "application/json",
        )
        .validate(|_, args| match args.downcast_ref::<Operands>() {
            Some(operands) if operands.a.checked_mul(operands.b).is_none() => {
                Err(Error::other("operands overflow"))
            }
            _ => Ok(()),
        })
        .after(|info| {
            tracing::info!(
                method = %info.method,
                status = %info.status_code,
                error = ?info.error,
                "Call finished"
            );
        })
        .build()?;

    server.register_service(Arith::default(), None)?;
    server.register_alias("mul", "Arith/multiply")?;
    tracing::info!(methods = ?server.methods(), "Calculator ready on http://127.0.0.1:8080/");

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Shutting down"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_divide_rejects_overflow_and_zero() {
        let arith = Arith::default();

        let answer = arith.divide(Operands { a: 9, b: -3 }).await.unwrap();
        assert_eq!(answer.result, -3);

        for (a, b) in [(i64::MIN, -1), (1, 0)] {
            match arith.divide(Operands { a, b }).await.unwrap_err() {
                Error::Rpc(err) => assert_eq!(err.code, hrpc::core::codes::INVALID_PARAMS),
                other => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(arith.calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_multiply_rejects_overflow() {
        let arith = Arith::default();
        let err = arith
            .multiply(Operands { a: i64::MAX, b: 2 })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Rpc(_)));
    }
}
