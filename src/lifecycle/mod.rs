//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGHUP/SIGINT/SIGTERM/SIGQUIT → log → exit with status 5
//!
//! Shutdown (shutdown.rs):
//!     trigger() → serve loop stops accepting → in-flight requests drain
//! ```
//!
//! # Design Decisions
//! - `Server::listen` exits on signals; `Server::run` takes an explicit
//!   shutdown future for embedding and tests

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::{exit_on_termination, EXIT_STATUS};
