//! Single-shot liveness deadline.

use tokio::time::Instant;

/// Which liveness-critical step armed the watchdog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogStage {
    Handshake,
    Polling,
}

impl WatchdogStage {
    pub fn as_str(self) -> &'static str {
        match self {
            WatchdogStage::Handshake => "handshake",
            WatchdogStage::Polling => "polling",
        }
    }
}

/// At most one outstanding deadline. Arming replaces any previous deadline.
#[derive(Debug, Default)]
pub struct Watchdog {
    armed: Option<(Instant, WatchdogStage)>,
    arm_count: u64,
}

impl Watchdog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, stage: WatchdogStage, deadline: Instant) {
        self.armed = Some((deadline, stage));
        self.arm_count += 1;
    }

    pub fn clear(&mut self) {
        self.armed = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.armed.map(|(d, _)| d)
    }

    pub fn stage(&self) -> Option<WatchdogStage> {
        self.armed.map(|(_, s)| s)
    }

    /// How many times the watchdog has been armed over its lifetime.
    pub fn arm_count(&self) -> u64 {
        self.arm_count
    }

    /// Disarm and return the stage if the deadline has passed.
    pub fn take_expired(&mut self, now: Instant) -> Option<WatchdogStage> {
        match self.armed {
            Some((deadline, stage)) if deadline <= now => {
                self.armed = None;
                Some(stage)
            }
            _ => None,
        }
    }
}
