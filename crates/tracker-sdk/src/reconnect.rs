//! Reconnect policy: which faults lead to a new connection attempt, and when.

use std::time::Duration;

use crate::types::Fault;

/// Controls how the session reconnects after a teardown.
///
/// The delay is fixed: it does not grow across repeated failures and there is
/// no attempt ceiling. Reconnection continues for as long as the session
/// stays active.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Delay before reconnecting after a close the session did not request.
    pub close_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            close_delay: Duration::from_secs(2),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the next attempt after `fault`, or `None` when the fault
    /// alone never schedules a reconnect.
    pub fn delay_for(&self, fault: &Fault) -> Option<Duration> {
        match fault {
            Fault::UnexpectedClose | Fault::EmptyDeviceList => Some(self.close_delay),
            Fault::WatchdogTimeout => Some(Duration::ZERO),
            // Recovery comes from the close that follows, or from the watchdog.
            Fault::Transport(_) | Fault::Protocol(_) => None,
        }
    }
}
