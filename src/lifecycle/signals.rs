//! OS signal handling.
//!
//! # Responsibilities
//! - Register handlers for SIGHUP, SIGINT, SIGTERM and SIGQUIT
//! - Log the received signal, flush the log writer and terminate the process
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - No draining: in-flight requests are abandoned

use std::io;

use crate::observability::logging;

/// Process exit status after a termination signal.
pub const EXIT_STATUS: i32 = 5;

/// Spawn one task per signal; the first delivery ends the process.
///
/// Must be called from within a Tokio runtime.
#[cfg(unix)]
pub fn exit_on_termination() -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let kinds = [
        (SignalKind::hangup(), "SIGHUP"),
        (SignalKind::interrupt(), "SIGINT"),
        (SignalKind::terminate(), "SIGTERM"),
        (SignalKind::quit(), "SIGQUIT"),
    ];

    for (kind, name) in kinds {
        let mut stream = signal(kind)?;
        tokio::spawn(async move {
            if stream.recv().await.is_some() {
                exit(name);
            }
        });
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn exit_on_termination() -> io::Result<()> {
    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            exit("ctrl-c");
        }
    });
    Ok(())
}

fn exit(signal: &str) -> ! {
    tracing::info!(signal, status = EXIT_STATUS, "Signal received, exiting");
    // process::exit skips destructors; drain the log writer by hand.
    logging::flush();
    std::process::exit(EXIT_STATUS)
}
