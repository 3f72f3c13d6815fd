//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;

use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceExt;

use jsonhttp::{Server, ServerConfig, Shutdown};

/// A server with the given retry budget on an unbound address.
pub fn server(max_tries: i64) -> Server {
    Server::new(ServerConfig::new("127.0.0.1:0", max_tries)).unwrap()
}

/// Drive one request through the router without a socket.
pub async fn send(router: Router, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, body)
}

pub fn post_json(uri: &str, body: &'static str) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

/// Serve on an ephemeral port; the server stops when the returned
/// coordinator is triggered or dropped.
pub async fn spawn(server: Server) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let signal = shutdown.signal();
    tokio::spawn(async move {
        server.run(listener, signal).await.unwrap();
    });
    (addr, shutdown)
}
