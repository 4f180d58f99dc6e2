use std::time::Duration;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Polling / liveness timing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Poll cadence.
    #[serde(default = "d_500")]
    pub interval_ms: u64,
    /// Handshake and steady-state watchdog timeout.
    #[serde(default = "d_5000")]
    pub timeout_ms: u64,
    /// Delay between consecutive read requests inside one poll cycle.
    #[serde(default = "d_10")]
    pub stagger_ms: u64,
    /// Pause between the attach request and the first poll cycle.
    #[serde(default = "d_500")]
    pub settle_ms: u64,
    /// Fixed backoff after an unexpected close.
    #[serde(default = "d_2000")]
    pub reconnect_delay_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            timeout_ms: 5000,
            stagger_ms: 10,
            settle_ms: 500,
            reconnect_delay_ms: 2000,
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_10() -> u64 {
    10
}
fn d_500() -> u64 {
    500
}
fn d_2000() -> u64 {
    2000
}
fn d_5000() -> u64 {
    5000
}
