//! Backtraces for panics caught by the dispatch loop.
//!
//! A `catch_unwind` payload carries only the panic message; the stack is gone
//! by the time the unwind is caught. A process-wide panic hook records a
//! backtrace in a thread local at the panic site, which the recovery branch
//! takes on the same thread. The previously installed hook still runs.

use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic;
use std::sync::Once;

thread_local! {
    static LAST_PANIC: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
}

static INSTALL: Once = Once::new();

/// Install the recording hook. Idempotent.
pub(crate) fn install_hook() {
    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            LAST_PANIC.with(|slot| *slot.borrow_mut() = Some(Backtrace::force_capture()));
            previous(info);
        }));
    });
}

/// Backtrace of the most recent panic on this thread, if not already taken.
pub(crate) fn take_backtrace() -> Option<Backtrace> {
    LAST_PANIC.with(|slot| slot.borrow_mut().take())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::backtrace::BacktraceStatus;

    #[test]
    fn test_hook_records_backtrace() {
        install_hook();
        let _ = take_backtrace();

        let result = panic::catch_unwind(|| panic!("handler bug"));
        assert!(result.is_err());

        let backtrace = take_backtrace().unwrap();
        assert_eq!(backtrace.status(), BacktraceStatus::Captured);
        assert!(take_backtrace().is_none());
    }
}
