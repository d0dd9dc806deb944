//! Cooperative cancellation for the delegated build.
//!
//! A [`CancellationToken`] records the first signal that asked the run to
//! stop. The command runner polls it while waiting on `ruby-build`; the
//! orchestrator checks it between phases.

use crate::error::{InstallerError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

/// Shared slot holding the signal that cancelled the run, or 0.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    signal: Arc<AtomicI32>,
}

impl CancellationToken {
    /// Creates a token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `signal` unless an earlier one was recorded.
    pub fn cancel(&self, signal: i32) {
        // Only the first signal counts.
        let _ = self
            .signal
            .compare_exchange(0, signal, Ordering::SeqCst, Ordering::SeqCst);
    }

    /// The recorded signal, if cancelled.
    #[must_use]
    pub fn signal(&self) -> Option<i32> {
        match self.signal.load(Ordering::SeqCst) {
            0 => None,
            signal => Some(signal),
        }
    }

    /// Whether the run has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.signal().is_some()
    }

    /// Fails with [`InstallerError::Interrupted`] once cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::Interrupted`] carrying the recorded signal.
    pub fn check(&self) -> Result<()> {
        match self.signal() {
            Some(signal) => Err(InstallerError::Interrupted { signal }),
            None => Ok(()),
        }
    }
}

#[cfg(unix)]
static SIGNAL_TOKEN: std::sync::OnceLock<CancellationToken> = std::sync::OnceLock::new();

#[cfg(unix)]
extern "C" fn record_signal(signal: libc::c_int) {
    if let Some(token) = SIGNAL_TOKEN.get() {
        token.cancel(signal);
    }
}

/// Routes SIGINT and SIGTERM into `token` instead of terminating.
///
/// Only the first token passed in a process receives signals.
///
/// # Errors
///
/// Returns the OS error if a handler cannot be installed.
#[cfg(unix)]
pub fn arm_signal_handlers(token: &CancellationToken) -> Result<()> {
    if SIGNAL_TOKEN.set(token.clone()).is_err() {
        log::debug!("signal handlers already armed");
        return Ok(());
    }
    for signal in [libc::SIGINT, libc::SIGTERM] {
        let handler = record_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
        // SAFETY: `record_signal` only performs an atomic load and a
        // compare-exchange, both async-signal-safe.
        let previous = unsafe { libc::signal(signal, handler) };
        if previous == libc::SIG_ERR {
            return Err(std::io::Error::last_os_error().into());
        }
    }
    Ok(())
}

/// Signals are not routed on this platform.
///
/// # Errors
///
/// Never fails.
#[cfg(not(unix))]
pub fn arm_signal_handlers(_token: &CancellationToken) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_is_not_cancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());
    }

    #[test]
    fn first_signal_wins_and_clones_share_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel(15);
        token.cancel(2);
        assert_eq!(token.signal(), Some(15));
        assert!(matches!(
            token.check(),
            Err(InstallerError::Interrupted { signal: 15 })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn armed_handler_records_sigterm() {
        let token = CancellationToken::new();
        arm_signal_handlers(&token).expect("arm handlers");
        // SAFETY: a handler for SIGTERM was installed above.
        let rc = unsafe { libc::raise(libc::SIGTERM) };
        assert_eq!(rc, 0);
        assert_eq!(token.signal(), Some(libc::SIGTERM));
    }
}
