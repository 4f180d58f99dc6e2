use serde::Serialize;

/// Structured trace events emitted by the tracker session lifecycle.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    ConnectAttempt {
        url: String,
        generation: u64,
        attempt: u32,
    },
    HandshakeCompleted {
        device: String,
        devices_listed: usize,
        generation: u64,
    },
    PollCycleStarted {
        cycle: u64,
        addresses: usize,
        discarded_pending: usize,
    },
    WatchdogExpired {
        phase: String,
        generation: u64,
    },
    ConnectionClosed {
        generation: u64,
        fault: Option<String>,
    },
    ReconnectScheduled {
        delay_ms: u64,
        attempt: u32,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        match self {
            // Fires every poll interval.
            Self::PollCycleStarted { .. } => tracing::debug!(trace_event = %json, "at_event"),
            _ => tracing::info!(trace_event = %json, "at_event"),
        }
    }
}
