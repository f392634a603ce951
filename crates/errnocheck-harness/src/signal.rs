//! Routing of termination signals into an orderly teardown.
//!
//! The handler only records which signal arrived. The runner polls
//! [`interrupted`] between scenarios and iterations and unwinds through the
//! normal teardown path, so mounts and the scratch directory are never left
//! behind by a Ctrl-C.

use std::sync::atomic::{AtomicI32, Ordering};

use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

use crate::error::SetupError;

/// Signals that end a run early.
pub const HANDLED: [Signal; 4] = [
    Signal::SIGINT,
    Signal::SIGTERM,
    Signal::SIGHUP,
    Signal::SIGQUIT,
];

static PENDING: AtomicI32 = AtomicI32::new(0);

extern "C" fn record(signum: libc::c_int) {
    PENDING.store(signum, Ordering::SeqCst);
}

/// Install the recording handler for every signal in [`HANDLED`].
pub fn install() -> Result<(), SetupError> {
    let action = SigAction::new(
        SigHandler::Handler(record),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    for signal in HANDLED {
        // SAFETY: `record` only performs an atomic store, which is
        // async-signal-safe.
        unsafe { sigaction(signal, &action) }
            .map_err(|errno| SetupError::Signal { signal, errno })?;
    }
    tracing::debug!(signals = ?HANDLED, "signal handlers installed");
    Ok(())
}

/// The first handled signal delivered since the last [`reset`], if any.
pub fn interrupted() -> Option<Signal> {
    decode(PENDING.load(Ordering::SeqCst))
}

fn decode(raw: libc::c_int) -> Option<Signal> {
    match raw {
        0 => None,
        raw => Signal::try_from(raw).ok(),
    }
}

/// Forget a previously recorded signal.
pub fn reset() {
    PENDING.store(0, Ordering::SeqCst);
}
