//! `at-tracker-sdk`: live memory polling against a device-control server.
//!
//! A session keeps one WebSocket connection to a local device-control
//! server, attaches to the first listed device, and reads a configurable set
//! of single-byte stats on a fixed cadence, reporting every observed value.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │  Your tracker (UI / CLI)                                  │
//! │                                                           │
//! │   let session = SessionBuilder::new()                     │
//! │       .host("localhost")                                  │
//! │       .selection(["deaths", "bonks"])                     │
//! │       .build()?                                           │
//! │       .spawn();                                           │
//! │   session.controller.start()?;                            │
//! │   while let Some(ev) = session.events.recv().await { … }  │
//! └───────────────────────────┬───────────────────────────────┘
//!                             │ commands / events
//! ┌───────────────────────────▼───────────────────────────────┐
//! │  Session actor (one task)                                 │
//! │   Transport · Watchdog · PollScheduler · PendingReadQueue │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! # Connection flow
//!
//! 1. Connect WS to `ws://<host>:<port>`; on open report `connecting`
//! 2. Optionally send `Name`, then `DeviceList`; arm the handshake watchdog
//! 3. On the device list: `Attach` to the first device, report `connected`
//!    (an empty list reports `no_device` and reconnects after the backoff)
//! 4. After the settle delay, poll every interval: re-arm the watchdog,
//!    discard unanswered reads, send one staggered `GetAddress` per stat
//! 5. Each binary reply answers the oldest outstanding read
//! 6. Unexpected close: reconnect after a fixed backoff; watchdog expiry:
//!    reconnect immediately; `stop()`: never reconnect

mod actor;
pub mod builder;
pub mod controller;
pub mod correlator;
pub mod handshake;
pub mod poll;
pub mod reconnect;
pub mod session;
mod transport;
pub mod types;
pub mod watchdog;

// ── Re-exports for ergonomic imports ─────────────────────────────────

pub use builder::SessionBuilder;
pub use controller::SessionController;
pub use reconnect::ReconnectPolicy;
pub use session::{SessionConfig, SessionEvents, SessionHandle};
pub use types::{ConnectionPhase, Fault, SessionEvent, StatValue, Status, TrackerError};

// Re-export domain types so trackers rarely need at-domain directly.
pub use at_domain::config::TrackerConfig;
pub use at_domain::{AddressRegistry, AddressTable};
