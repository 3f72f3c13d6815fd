//! End-to-end tests over a real listener.

use std::time::Duration;

use serde_json::{json, Value};

use jsonhttp::http::handlers;
use jsonhttp::{Envelope, Fault, FormRequest, JsonRequest};

mod common;
use common::{server, spawn};

#[tokio::test]
async fn test_echo_and_health() {
    let (addr, shutdown) = spawn(
        server(3)
            .handle("/echo", handlers::echo)
            .handle_get("/health", handlers::health),
    )
    .await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/echo"))
        .json(&json!({"a": 1}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.headers().contains_key("x-request-id"));
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"success": true, "code": 0, "data": {"a": 1}}));

    let body: Value = client
        .get(format!("http://{addr}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["status"], "ok");

    shutdown.trigger();
}

#[tokio::test]
async fn test_client_ip_is_captured() {
    let (addr, _shutdown) = spawn(server(1).handle("/ip", |request: JsonRequest| async move {
        Ok::<_, Fault>(Envelope::success(request.ip().to_string()))
    }))
    .await;

    let body: Value = reqwest::Client::new()
        .post(format!("http://{addr}/ip"))
        .body("{}")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"], "127.0.0.1");
}

#[tokio::test]
async fn test_multipart_upload() {
    let (addr, _shutdown) = spawn(server(1).handle_form(
        "/upload",
        |request: FormRequest| async move {
            let form = request.form();
            let owner = form
                .value("owner")
                .ok_or_else(|| Fault::bad_request("missing owner"))?;
            let files: Vec<Value> = form
                .files("doc")
                .iter()
                .map(|f| json!({"name": f.file_name, "size": f.content.len()}))
                .collect();
            Ok::<_, Fault>(Envelope::success(json!({"owner": owner, "files": files})))
        },
    ))
    .await;
    let client = reqwest::Client::new();

    let form = reqwest::multipart::Form::new()
        .text("owner", "imchuncai")
        .part(
            "doc",
            reqwest::multipart::Part::bytes(vec![0u8; 16]).file_name("blob.bin"),
        );
    let body: Value = client
        .post(format!("http://{addr}/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        body["data"],
        json!({"owner": "imchuncai", "files": [{"name": "blob.bin", "size": 16}]})
    );

    let form = reqwest::multipart::Form::new().text("other", "x");
    let response = client
        .post(format!("http://{addr}/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_graceful_shutdown_stops_accepting() {
    let (addr, shutdown) = spawn(server(1).handle("/echo", handlers::echo)).await;
    shutdown.trigger();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let result = reqwest::Client::new()
        .post(format!("http://{addr}/echo"))
        .body("{}")
        .send()
        .await;
    assert!(result.is_err());
}
