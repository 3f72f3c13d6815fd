//! Dispatch subsystem: retry and fault recovery around user handlers.
//!
//! # Data Flow
//! ```text
//! Request<Body>
//!     → Adapt::adapt (JSON body / multipart form / query string)
//!     → dispatcher.rs retry loop, counter = max_tries:
//!         handler(request.clone()) inside catch_unwind
//!           Ok(reply)             → reply.respond()            (done)
//!           Fault::Coded(status)  → status, warn log           (done)
//!           transient             → warn log, counter -= 1     (again)
//!           unclassified / panic  → 500, error log             (done)
//!     → counter exhausted → BUSY_BODY with status 200
//! ```
//!
//! # Design Decisions
//! - Faults are returned values, not unwinds; `catch_unwind` only guards real panics
//! - Client faults are never retried, transient backend conflicts always are
//! - Retries are immediate and reuse the adapted request
//! - The reply is consumed by `Respond::respond`, so it is written exactly once

pub mod classify;
pub mod dispatcher;
pub mod fault;
mod panic;

pub use classify::{Classify, SqlStateClassifier, LOCK_NOT_AVAILABLE, SERIALIZATION_FAILURE};
pub use dispatcher::{busy_response, Dispatcher, Handler, BUSY_BODY};
pub use fault::{BoxError, Fault, FaultExt, FaultKind};
