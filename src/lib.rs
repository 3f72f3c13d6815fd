//! JSON-over-HTTP server toolkit.
//!
//! Handlers receive a normalized request (JSON body, multipart form or query
//! string) and return an [`Envelope`], a [`FileResponse`] or a [`Redirect`].
//! Every handler runs under a dispatch loop that retries transient failures a
//! bounded number of times and turns faults and panics into HTTP statuses.

pub mod config;
pub mod dispatch;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::{ConfigError, ServerConfig};
pub use dispatch::{Classify, Dispatcher, Fault, FaultExt, FaultKind, SqlStateClassifier};
pub use http::{
    Endpoint, Envelope, FailCode, FileResponse, FormRequest, JsonRequest, QueryRequest, Redirect,
    Server, ServerError,
};
pub use lifecycle::Shutdown;
