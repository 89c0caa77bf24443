//! Single-fire broadcast stop signal.
//!
//! The signal is split into one [`StopTrigger`] and any number of
//! [`StopListener`]s. Only the trigger can fire it, and firing consumes the
//! trigger, so the signal goes off at most once. Once fired every listener,
//! current or cloned later, observes "stopped" forever.

use tokio_util::sync::CancellationToken;

/// Create a connected trigger/listener pair.
pub fn stop_signal() -> (StopTrigger, StopListener) {
    let token = CancellationToken::new();
    (
        StopTrigger {
            token: token.clone(),
        },
        StopListener { token },
    )
}

/// Write side of the stop signal.
///
/// Dropping the trigger fires the signal as well, so listeners are released
/// even if the owner unwinds before reaching [`StopTrigger::fire`].
#[derive(Debug)]
pub struct StopTrigger {
    token: CancellationToken,
}

impl StopTrigger {
    /// Fire the signal.
    pub fn fire(self) {
        tracing::debug!("stop signal fired");
        // Drop does the cancel.
    }

    /// Hand out another read handle.
    pub fn listener(&self) -> StopListener {
        StopListener {
            token: self.token.clone(),
        }
    }
}

impl Drop for StopTrigger {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Read side of the stop signal. Cheap to clone.
#[derive(Debug, Clone)]
pub struct StopListener {
    token: CancellationToken,
}

impl StopListener {
    /// Non-blocking check.
    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until the signal fires. Returns immediately if it already has.
    pub async fn stopped(&self) {
        self.token.cancelled().await
    }
}
