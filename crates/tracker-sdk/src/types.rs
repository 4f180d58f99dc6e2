//! Core types: session phases, consumer notifications, faults, and errors.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Status notifications delivered to the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Connecting,
    Connected,
    Disconnected,
    Error,
    NoDevice,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Connecting => "connecting",
            Status::Connected => "connected",
            Status::Disconnected => "disconnected",
            Status::Error => "error",
            Status::NoDevice => "no_device",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the session is in its connection lifecycle.
///
/// `Idle` and `Disconnected` are the only phases held while the session is
/// inactive. `Disconnected` is also held while active when waiting out a
/// reconnect backoff or after an open attempt failed outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionPhase {
    #[default]
    Idle,
    Connecting,
    AwaitingDeviceList,
    Attaching,
    Polling,
    Disconnected,
}

impl ConnectionPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionPhase::Idle => "idle",
            ConnectionPhase::Connecting => "connecting",
            ConnectionPhase::AwaitingDeviceList => "awaiting_device_list",
            ConnectionPhase::Attaching => "attaching",
            ConnectionPhase::Polling => "polling",
            ConnectionPhase::Disconnected => "disconnected",
        }
    }

    /// Inbound binary frames are read replies only in these phases.
    pub fn reads_memory(self) -> bool {
        matches!(self, ConnectionPhase::Attaching | ConnectionPhase::Polling)
    }
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observed stat value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatValue {
    pub key: String,
    pub value: u8,
    pub observed_at: DateTime<Utc>,
}

/// Everything the session reports to its consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Status { status: Status },
    Value(StatValue),
}

/// Why a connection was torn down (or why an attempt did not start).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Open failure or an error event on a live connection.
    #[error("transport: {0}")]
    Transport(String),
    /// Malformed device-list reply.
    #[error("protocol: {0}")]
    Protocol(String),
    #[error("no device listed")]
    EmptyDeviceList,
    #[error("watchdog timeout")]
    WatchdogTimeout,
    /// Any close not requested by `stop()`.
    #[error("connection closed unexpectedly")]
    UnexpectedClose,
}

/// Top-level SDK error.
#[derive(thiserror::Error, Debug)]
pub enum TrackerError {
    #[error("config: {0}")]
    Config(String),
    #[error("websocket: {0}")]
    WebSocket(String),
    #[error(transparent)]
    Protocol(#[from] at_protocol::ProtocolError),
    #[error("not connected")]
    NotConnected,
    #[error("session task has exited")]
    SessionClosed,
}
