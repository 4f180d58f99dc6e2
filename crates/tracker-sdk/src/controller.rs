//! The handle external callers use to drive a session.

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::actor::Command;
use crate::types::{ConnectionPhase, TrackerError};

/// Cloneable handle to a running session.
///
/// Every method only enqueues a command, so calls never block and are safe
/// from any phase. `start`, `stop` and `set_selection` are idempotent.
#[derive(Clone)]
pub struct SessionController {
    commands: mpsc::UnboundedSender<Command>,
    phase: watch::Receiver<ConnectionPhase>,
    shutdown: CancellationToken,
}

impl SessionController {
    pub(crate) fn new(
        commands: mpsc::UnboundedSender<Command>,
        phase: watch::Receiver<ConnectionPhase>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            commands,
            phase,
            shutdown,
        }
    }

    /// Activate the session and connect. No-op when already active.
    pub fn start(&self) -> Result<(), TrackerError> {
        self.send(Command::Start)
    }

    /// Deactivate the session: cancel every timer, discard pending reads,
    /// close the connection, and never reconnect until the next `start`.
    pub fn stop(&self) -> Result<(), TrackerError> {
        self.send(Command::Stop)
    }

    /// Replace the optional stats to poll. Mandatory stats are always
    /// polled and unknown keys are ignored. Takes effect at the next poll
    /// cycle.
    pub fn set_selection<I, S>(&self, keys: I) -> Result<(), TrackerError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.send(Command::SetSelection(
            keys.into_iter().map(Into::into).collect(),
        ))
    }

    /// Change the server for subsequent connections. The current
    /// connection, if any, is left alone.
    pub fn set_host(&self, host: impl Into<String>, port: u16) -> Result<(), TrackerError> {
        self.send(Command::SetHost {
            host: host.into(),
            port,
        })
    }

    pub fn phase(&self) -> ConnectionPhase {
        *self.phase.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<ConnectionPhase> {
        self.phase.clone()
    }

    /// Stop the session and end its task.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    fn send(&self, cmd: Command) -> Result<(), TrackerError> {
        self.commands
            .send(cmd)
            .map_err(|_| TrackerError::SessionClosed)
    }
}
