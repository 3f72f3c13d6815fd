//! Request adapters.
//!
//! # Responsibilities
//! - Turn the raw axum request into the normalized view a handler receives
//! - Buffer the body once so retries reuse it
//! - Expose the request head and the caller's IP to handlers
//!
//! # Design Decisions
//! - One adapter type per input shape (JSON body, multipart form, query string)
//! - Decoding failures are client faults (400); unreadable bodies are server faults (500)
//! - Normalized requests are cheap to clone (`Bytes` / `Arc`)

use std::future::Future;
use std::net::SocketAddr;
use std::ops::Deref;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{request::Parts, HeaderMap, Method, Uri},
};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::LimitsConfig;
use crate::dispatch::{Fault, FaultExt};
use crate::http::multipart::{parse_multipart, MultipartForm};

/// Why a raw request could not be normalized. The handler is never invoked.
#[derive(Debug, Error)]
pub enum AdaptError {
    #[error("failed to read request body: {0}")]
    Body(#[source] axum::Error),

    #[error("request is not multipart/form-data: {0}")]
    NotMultipart(#[source] multer::Error),

    #[error("malformed multipart body: {0}")]
    Multipart(#[source] multer::Error),
}

/// A normalized request shape the dispatch loop can build and hand to handlers.
pub trait Adapt: Clone + Send + Sync + Sized + 'static {
    /// Label used in logs and metrics.
    const SHAPE: &'static str;

    /// Consume the raw request. Called once per incoming request.
    fn adapt(
        parts: Parts,
        body: Body,
        limits: &LimitsConfig,
    ) -> impl Future<Output = Result<Self, AdaptError>> + Send;

    fn common(&self) -> &CommonRequest;
}

/// Request head and caller address shared by every shape.
#[derive(Debug, Clone)]
pub struct CommonRequest {
    parts: Arc<Parts>,
    ip: String,
}

impl CommonRequest {
    pub fn new(parts: Parts) -> Self {
        let ip = remote_ip(&parts);
        Self {
            parts: Arc::new(parts),
            ip,
        }
    }

    /// The originating request head, including extensions set by middleware.
    pub fn parts(&self) -> &Parts {
        &self.parts
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// Caller IP without the port. Empty when the listener did not record
    /// connection info.
    pub fn ip(&self) -> &str {
        &self.ip
    }
}

fn remote_ip(parts: &Parts) -> String {
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default()
}

/// Request whose body is a JSON document.
#[derive(Debug, Clone)]
pub struct JsonRequest {
    common: CommonRequest,
    data: Bytes,
}

impl JsonRequest {
    pub fn new(parts: Parts, data: Bytes) -> Self {
        Self {
            common: CommonRequest::new(parts),
            data,
        }
    }

    /// The raw buffered body.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Deserialize the body. A malformed body aborts with 400.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, Fault> {
        serde_json::from_slice(&self.data).bad_request()
    }
}

impl Adapt for JsonRequest {
    const SHAPE: &'static str = "json";

    async fn adapt(parts: Parts, body: Body, limits: &LimitsConfig) -> Result<Self, AdaptError> {
        let data = axum::body::to_bytes(body, limits.body_limit_bytes)
            .await
            .map_err(AdaptError::Body)?;
        Ok(Self::new(parts, data))
    }

    fn common(&self) -> &CommonRequest {
        &self.common
    }
}

impl Deref for JsonRequest {
    type Target = CommonRequest;

    fn deref(&self) -> &CommonRequest {
        &self.common
    }
}

/// Request whose body is a `multipart/form-data` form.
#[derive(Debug, Clone)]
pub struct FormRequest {
    common: CommonRequest,
    form: Arc<MultipartForm>,
}

impl FormRequest {
    pub fn new(parts: Parts, form: MultipartForm) -> Self {
        Self {
            common: CommonRequest::new(parts),
            form: Arc::new(form),
        }
    }

    /// The parsed form: text values and uploaded files.
    pub fn form(&self) -> &MultipartForm {
        &self.form
    }
}

impl Adapt for FormRequest {
    const SHAPE: &'static str = "form";

    async fn adapt(parts: Parts, body: Body, limits: &LimitsConfig) -> Result<Self, AdaptError> {
        let form = parse_multipart(&parts.headers, body, limits.multipart_max_memory_bytes).await?;
        Ok(Self::new(parts, form))
    }

    fn common(&self) -> &CommonRequest {
        &self.common
    }
}

impl Deref for FormRequest {
    type Target = CommonRequest;

    fn deref(&self) -> &CommonRequest {
        &self.common
    }
}

/// Request carrying its input in the query string. The body is ignored.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    common: CommonRequest,
}

impl QueryRequest {
    pub fn new(parts: Parts) -> Self {
        Self {
            common: CommonRequest::new(parts),
        }
    }

    /// The undecoded query string, without the leading `?`.
    pub fn raw_query(&self) -> &str {
        self.common.uri().query().unwrap_or("")
    }

    /// Map query parameters onto `T` by field name. A mismatch aborts with 400.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, Fault> {
        serde_urlencoded::from_str(self.raw_query()).bad_request()
    }
}

impl Adapt for QueryRequest {
    const SHAPE: &'static str = "query";

    async fn adapt(parts: Parts, _body: Body, _limits: &LimitsConfig) -> Result<Self, AdaptError> {
        Ok(Self::new(parts))
    }

    fn common(&self) -> &CommonRequest {
        &self.common
    }
}

impl Deref for QueryRequest {
    type Target = CommonRequest;

    fn deref(&self) -> &CommonRequest {
        &self.common
    }
}
