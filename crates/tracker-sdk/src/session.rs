//! Resolved session settings and the entry point that spawns a session.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::actor::SessionActor;
use crate::controller::SessionController;
use crate::reconnect::ReconnectPolicy;
use crate::types::{ConnectionPhase, SessionEvent};

/// Status and value notifications, in the order the session produced them.
pub type SessionEvents = mpsc::UnboundedReceiver<SessionEvent>;

/// A fully-resolved session configuration.
///
/// Create via [`SessionBuilder`](crate::builder::SessionBuilder).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) app_name: Option<String>,
    pub(crate) selection: Vec<String>,
    pub(crate) poll_interval: Duration,
    pub(crate) timeout: Duration,
    pub(crate) stagger: Duration,
    pub(crate) settle_delay: Duration,
    pub(crate) reconnect: ReconnectPolicy,
}

impl SessionConfig {
    /// Start a new builder.
    pub fn builder() -> crate::builder::SessionBuilder {
        crate::builder::SessionBuilder::new()
    }

    /// WebSocket URL for the current target. A bare IPv6 literal is
    /// bracketed so the port stays unambiguous.
    pub fn url(&self) -> String {
        if self.host.starts_with("ws://") || self.host.starts_with("wss://") {
            format!("{}:{}", self.host.trim_end_matches('/'), self.port)
        } else if self.host.contains(':') && !self.host.starts_with('[') {
            format!("ws://[{}]:{}", self.host, self.port)
        } else {
            format!("ws://{}:{}", self.host, self.port)
        }
    }

    /// Spawn the session task. The session starts inactive; call
    /// [`SessionController::start`] to connect.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(self) -> SessionHandle {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (phase_tx, phase_rx) = watch::channel(ConnectionPhase::Idle);
        let shutdown = CancellationToken::new();

        let session_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("tracker_session", session_id = %session_id);
        let actor = SessionActor::new(self, cmd_rx, event_tx, phase_tx, shutdown.clone());
        let task = tokio::spawn(actor.run().instrument(span));

        SessionHandle {
            controller: SessionController::new(cmd_tx, phase_rx, shutdown),
            events: event_rx,
            task,
        }
    }
}

/// Everything returned by [`SessionConfig::spawn`].
pub struct SessionHandle {
    pub controller: SessionController,
    pub events: SessionEvents,
    pub task: JoinHandle<()>,
}
