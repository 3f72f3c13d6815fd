//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatch loop produces:
//!     → logging.rs (structured log events keyed by request id)
//!     → metrics.rs (attempt and outcome counters, latency histogram)
//!
//! Consumers:
//!     → stdout, or a daily rolling file
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Request ID is attached to every dispatch log line
//! - Metric updates are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;

pub use self::logging::{init_logging, LoggingError, LoggingGuard};
pub use self::metrics::init_metrics;
