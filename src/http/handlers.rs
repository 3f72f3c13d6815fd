//! Built-in handlers served by the `jsonhttp` binary.

use serde::Serialize;
use serde_json::Value;

use crate::dispatch::Fault;
use crate::http::request::{JsonRequest, QueryRequest};
use crate::http::response::Envelope;

/// Reply with the request's JSON body as `data`. A malformed body is a 400.
pub async fn echo(request: JsonRequest) -> Result<Envelope, Fault> {
    let value: Value = request.decode()?;
    Ok(Envelope::success(value))
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health(_request: QueryRequest) -> Result<Envelope<Health>, Fault> {
    Ok(Envelope::success(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};
    use serde_json::json;

    fn json_request(body: &'static str) -> JsonRequest {
        let (parts, ()) = Request::post("/echo").body(()).unwrap().into_parts();
        JsonRequest::new(parts, body.into())
    }

    #[tokio::test]
    async fn test_echo_returns_body() {
        let env = echo(json_request(r#"{"a":[1,2]}"#)).await.unwrap();
        assert_eq!(env, Envelope::success(json!({"a": [1, 2]})));
    }

    #[tokio::test]
    async fn test_echo_rejects_malformed_json() {
        let fault = echo(json_request("{nope")).await.unwrap_err();
        assert_eq!(fault.status(), Some(StatusCode::BAD_REQUEST));
    }

    #[tokio::test]
    async fn test_health() {
        let (parts, ()) = Request::get("/health").body(()).unwrap().into_parts();
        let env = health(QueryRequest::new(parts)).await.unwrap();
        assert!(env.success);
        assert_eq!(env.data.unwrap().status, "ok");
    }
}
