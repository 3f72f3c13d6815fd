//! The per-request retry and recovery loop.

use std::any::Any;
use std::backtrace::Backtrace;
use std::num::NonZeroU32;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::{future::BoxFuture, FutureExt};

use crate::config::{ConfigError, LimitsConfig, ServerConfig, ValidationError};
use crate::dispatch::classify::Classify;
use crate::dispatch::fault::{Fault, FaultKind};
use crate::dispatch::panic;
use crate::http::request::Adapt;
use crate::http::request_id::request_id;
use crate::http::response::Respond;
use crate::observability::metrics;

/// Body written when every attempt ended in a transient failure.
pub const BUSY_BODY: &str = r#"{"ok":false,"msg":"Server is busy, please try later!"}"#;

/// A type-erased user handler: normalized request in, reply or fault out.
pub type Handler<R, O> = Arc<dyn Fn(R) -> BoxFuture<'static, Result<O, Fault>> + Send + Sync>;

/// What a single handler attempt ended with.
enum Attempt<O> {
    Reply(O),
    Abort(StatusCode),
    Retry,
    Fail,
}

/// Wraps handlers with bounded retry on transient failures and fault recovery.
///
/// Built once at startup and shared read-only by every request task. The retry
/// counter itself lives on the stack of [`Dispatcher::run`], one per request.
pub struct Dispatcher {
    max_tries: NonZeroU32,
    classifier: Option<Arc<dyn Classify>>,
    limits: LimitsConfig,
}

impl Dispatcher {
    pub fn new(max_tries: NonZeroU32) -> Self {
        panic::install_hook();
        Self {
            max_tries,
            classifier: None,
            limits: LimitsConfig::default(),
        }
    }

    /// Build from configuration, rejecting a non-positive retry budget.
    pub fn from_config(config: &ServerConfig) -> Result<Self, ConfigError> {
        let max_tries = config.dispatch.max_tries().ok_or_else(|| {
            ConfigError::Validation(vec![ValidationError {
                field: "dispatch.max_tries",
                message: format!("must be positive, got {}", config.dispatch.max_tries),
            }])
        })?;
        Ok(Self::new(max_tries).with_limits(config.limits.clone()))
    }

    /// Consult `classifier` for faults the handler did not classify itself.
    pub fn with_classifier(mut self, classifier: impl Classify) -> Self {
        self.classifier = Some(Arc::new(classifier));
        self
    }

    pub fn with_limits(mut self, limits: LimitsConfig) -> Self {
        self.limits = limits;
        self
    }

    pub fn max_tries(&self) -> NonZeroU32 {
        self.max_tries
    }

    pub fn limits(&self) -> &LimitsConfig {
        &self.limits
    }

    /// Adapt the raw request, then run the handler under the retry loop.
    pub async fn dispatch<R, O>(&self, request: Request<Body>, handler: &Handler<R, O>) -> Response
    where
        R: Adapt,
        O: Respond,
    {
        let start = Instant::now();
        let request_id = request_id(request.headers()).to_string();
        let path = request.uri().path().to_string();
        let (parts, body) = request.into_parts();

        let response = match R::adapt(parts, body, &self.limits).await {
            Ok(normalized) => self.run(normalized, handler, &request_id).await,
            Err(e) => {
                tracing::error!(
                    request_id = %request_id,
                    shape = R::SHAPE,
                    path = %path,
                    error = %e,
                    "Failed to adapt request"
                );
                metrics::record_outcome(R::SHAPE, "adapt_error");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        };

        metrics::record_duration(R::SHAPE, start);
        response
    }

    /// The retry loop over an already adapted request.
    ///
    /// Each attempt gets a clone of `request`; the body is never re-read.
    pub async fn run<R, O>(&self, request: R, handler: &Handler<R, O>, request_id: &str) -> Response
    where
        R: Adapt,
        O: Respond,
    {
        let mut tries = self.max_tries.get();
        let mut attempt = 0u32;

        while tries > 0 {
            attempt += 1;
            metrics::record_attempt(R::SHAPE);

            match self.attempt(request.clone(), handler, request_id, attempt).await {
                Attempt::Reply(reply) => {
                    metrics::record_outcome(R::SHAPE, "ok");
                    return reply.respond(request.common().parts());
                }
                Attempt::Abort(status) => {
                    metrics::record_outcome(R::SHAPE, "coded");
                    return status.into_response();
                }
                Attempt::Fail => {
                    metrics::record_outcome(R::SHAPE, "server_error");
                    return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                }
                Attempt::Retry => tries -= 1,
            }
        }

        tracing::warn!(
            request_id = %request_id,
            shape = R::SHAPE,
            attempts = attempt,
            "Retry budget exhausted, responding busy"
        );
        metrics::record_outcome(R::SHAPE, "busy");
        busy_response()
    }

    /// One handler invocation inside the recovery boundary.
    async fn attempt<R, O>(
        &self,
        request: R,
        handler: &Handler<R, O>,
        request_id: &str,
        attempt: u32,
    ) -> Attempt<O>
    where
        R: Adapt,
    {
        let outcome = AssertUnwindSafe(async { handler(request).await })
            .catch_unwind()
            .await;

        let fault = match outcome {
            Ok(Ok(reply)) => return Attempt::Reply(reply),
            Ok(Err(fault)) => fault,
            Err(payload) => {
                let backtrace = panic::take_backtrace().unwrap_or_else(Backtrace::force_capture);
                tracing::error!(
                    request_id = %request_id,
                    shape = R::SHAPE,
                    attempt,
                    panic = %panic_message(payload.as_ref()),
                    backtrace = %backtrace,
                    "Handler panicked"
                );
                return Attempt::Fail;
            }
        };

        match self.classify(&fault) {
            FaultKind::Coded(status) => {
                tracing::warn!(
                    request_id = %request_id,
                    shape = R::SHAPE,
                    attempt,
                    status = status.as_u16(),
                    cause = %fault.cause(),
                    backtrace = %fault.backtrace(),
                    "Handler aborted"
                );
                Attempt::Abort(status)
            }
            FaultKind::Transient => {
                tracing::warn!(
                    request_id = %request_id,
                    shape = R::SHAPE,
                    attempt,
                    cause = %fault.cause(),
                    backtrace = %fault.backtrace(),
                    "Transient failure, retrying"
                );
                Attempt::Retry
            }
            FaultKind::Unclassified => {
                tracing::error!(
                    request_id = %request_id,
                    shape = R::SHAPE,
                    attempt,
                    cause = %fault.cause(),
                    backtrace = %fault.backtrace(),
                    "Handler failed"
                );
                Attempt::Fail
            }
        }
    }

    /// Explicit classifications win; only unclassified faults reach the classifier.
    fn classify(&self, fault: &Fault) -> FaultKind {
        match (fault.kind(), &self.classifier) {
            (FaultKind::Unclassified, Some(classifier)) if classifier.is_transient(fault.cause()) => {
                FaultKind::Transient
            }
            (kind, _) => kind,
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("max_tries", &self.max_tries)
            .field("classifier", &self.classifier.is_some())
            .field("limits", &self.limits)
            .finish()
    }
}

/// Degraded-mode reply once the retry budget is spent. Status stays 200.
pub fn busy_response() -> Response {
    ([(header::CONTENT_TYPE, "application/json")], BUSY_BODY).into_response()
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_body_literal() {
        let value: serde_json::Value = serde_json::from_str(BUSY_BODY).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"ok": false, "msg": "Server is busy, please try later!"})
        );
    }

    #[test]
    fn test_classifier_only_sees_unclassified() {
        let dispatcher = Dispatcher::new(NonZeroU32::MIN)
            .with_classifier(|_: &(dyn std::error::Error + 'static)| true);

        assert_eq!(dispatcher.classify(&Fault::new("x")), FaultKind::Transient);
        assert_eq!(
            dispatcher.classify(&Fault::bad_request("x")),
            FaultKind::Coded(StatusCode::BAD_REQUEST)
        );
    }

    #[test]
    fn test_without_classifier_unclassified_stays() {
        let dispatcher = Dispatcher::new(NonZeroU32::MIN);
        assert_eq!(dispatcher.classify(&Fault::new("x")), FaultKind::Unclassified);
        assert_eq!(dispatcher.classify(&Fault::transient("x")), FaultKind::Transient);
    }

    #[test]
    fn test_from_config_rejects_zero() {
        let config = ServerConfig::new("127.0.0.1:0", 0);
        assert!(matches!(
            Dispatcher::from_config(&config),
            Err(ConfigError::Validation(_))
        ));

        let config = ServerConfig::new("127.0.0.1:0", 2);
        assert_eq!(Dispatcher::from_config(&config).unwrap().max_tries().get(), 2);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
