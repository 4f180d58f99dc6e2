//! The session state machine.
//!
//! One task owns every piece of mutable session state and reacts to three
//! sources: controller commands, connection events, and its own deadlines
//! (watchdog, settle, cadence tick, staggered sends, reconnect backoff).
//! Nothing else touches the transport handle or the pending-read queue.

use at_domain::trace::TraceEvent;
use at_domain::{AddressRegistry, AddressTable};
use at_protocol::Request;
use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::correlator::{Correlation, PendingReadQueue};
use crate::handshake::{self, HandshakeOutcome};
use crate::poll::{PollScheduler, ScheduledRead};
use crate::session::SessionConfig;
use crate::transport::{Inbound, LinkEvent, Transport, WsStream};
use crate::types::{ConnectionPhase, Fault, SessionEvent, StatValue, Status};
use crate::watchdog::{Watchdog, WatchdogStage};

/// Requests from a [`SessionController`](crate::SessionController).
#[derive(Debug)]
pub(crate) enum Command {
    Start,
    Stop,
    SetSelection(Vec<String>),
    SetHost { host: String, port: u16 },
}

pub(crate) struct SessionActor {
    config: SessionConfig,
    registry: AddressRegistry,
    table: AddressTable,
    /// Selection applied at the start of the next poll cycle.
    staged_table: Option<AddressTable>,

    active: bool,
    phase: ConnectionPhase,
    transport: Transport,
    pending: PendingReadQueue,
    scheduler: PollScheduler,
    watchdog: Watchdog,
    settle_at: Option<Instant>,
    reconnect_at: Option<Instant>,
    /// Last instant the connection proved alive while polling.
    last_progress: Instant,
    attempt: u32,

    commands: mpsc::UnboundedReceiver<Command>,
    inbound: mpsc::UnboundedReceiver<Inbound>,
    events: mpsc::UnboundedSender<SessionEvent>,
    phase_tx: watch::Sender<ConnectionPhase>,
    shutdown: CancellationToken,
}

impl SessionActor {
    pub fn new(
        config: SessionConfig,
        commands: mpsc::UnboundedReceiver<Command>,
        events: mpsc::UnboundedSender<SessionEvent>,
        phase_tx: watch::Sender<ConnectionPhase>,
        shutdown: CancellationToken,
    ) -> Self {
        let registry = AddressRegistry::new();
        let table = registry.active_table(&config.selection);
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let transport = Transport::new(inbound_tx, config.timeout);
        let scheduler = PollScheduler::new(config.poll_interval, config.stagger);

        Self {
            config,
            registry,
            table,
            staged_table: None,
            active: false,
            phase: ConnectionPhase::Idle,
            transport,
            pending: PendingReadQueue::new(),
            scheduler,
            watchdog: Watchdog::new(),
            settle_at: None,
            reconnect_at: None,
            last_progress: Instant::now(),
            attempt: 0,
            commands,
            inbound,
            events,
            phase_tx,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::debug!(keys = ?self.table.keys(), "session actor started");
        while self.step().await {}
        self.stop();
        tracing::debug!("session actor exited");
    }

    /// Handle the next command, connection event or deadline. Returns
    /// `false` once the session should exit.
    async fn step(&mut self) -> bool {
        let wake = self.next_deadline();
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return false,
            cmd = self.commands.recv() => match cmd {
                Some(cmd) => self.handle_command(cmd),
                None => return false,
            },
            Some(inbound) = self.inbound.recv() => self.handle_inbound(inbound).await,
            _ = sleep_until(wake) => self.fire_timers(Instant::now()).await,
        }
        true
    }

    // ── Commands ─────────────────────────────────────────────────────

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Start => self.start(),
            Command::Stop => self.stop(),
            Command::SetSelection(keys) => self.set_selection(keys),
            Command::SetHost { host, port } => {
                tracing::info!(host = %host, port, "connection target updated");
                self.config.host = host;
                self.config.port = port;
            }
        }
    }

    fn start(&mut self) {
        if self.active {
            return;
        }
        tracing::info!(url = %self.config.url(), "session started");
        self.active = true;
        self.connect();
    }

    fn stop(&mut self) {
        if self.active {
            tracing::info!("session stopped");
        }
        self.active = false;
        self.reconnect_at = None;
        self.reset_link_state();
        if self.transport.close() {
            self.notify(Status::Disconnected);
        }
        self.set_phase(ConnectionPhase::Idle);
    }

    fn set_selection(&mut self, keys: Vec<String>) {
        let unknown = self.registry.unknown_keys(&keys);
        if !unknown.is_empty() {
            tracing::debug!(?unknown, "ignoring unknown stat keys");
        }
        let table = self.registry.active_table(&keys);
        tracing::info!(keys = ?table.keys(), "selection updated");
        if self.phase == ConnectionPhase::Polling {
            self.staged_table = Some(table);
        } else {
            self.table = table;
            self.staged_table = None;
        }
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    fn connect(&mut self) {
        if !self.active || !self.transport.is_closed() {
            return;
        }
        let url = self.config.url();
        match self.transport.open(&url) {
            Ok(generation) => {
                self.attempt += 1;
                TraceEvent::ConnectAttempt {
                    url,
                    generation,
                    attempt: self.attempt,
                }
                .emit();
                self.set_phase(ConnectionPhase::Connecting);
            }
            Err(e) => {
                let fault = Fault::Transport(e.to_string());
                tracing::warn!(url = %url, error = %fault, "cannot open connection");
                self.notify(Status::Error);
                self.set_phase(ConnectionPhase::Disconnected);
            }
        }
    }

    async fn on_open(&mut self, generation: u64, ws: WsStream) {
        if !self.transport.adopt(generation, ws) {
            return;
        }
        tracing::info!(generation, "connection open");
        self.notify(Status::Connecting);

        if let Some(name) = self.config.app_name.clone() {
            if !self.send(Request::name(name)).await {
                return;
            }
        }
        if !self.send(Request::device_list()).await {
            return;
        }
        self.set_phase(ConnectionPhase::AwaitingDeviceList);
        self.watchdog
            .arm(WatchdogStage::Handshake, Instant::now() + self.config.timeout);
        self.log_watchdog_armed();
    }

    async fn on_device_list(&mut self, text: &str) {
        match handshake::on_device_list(text) {
            HandshakeOutcome::Malformed(e) => {
                let fault = Fault::Protocol(e.to_string());
                tracing::warn!(error = %fault, "unreadable device list, waiting for watchdog");
            }
            HandshakeOutcome::NoDevice => {
                tracing::warn!("server lists no devices");
                self.notify(Status::NoDevice);
                self.teardown(Fault::EmptyDeviceList);
            }
            HandshakeOutcome::Attach { device, listed } => {
                if !self.send(Request::attach(device.clone())).await {
                    return;
                }
                self.watchdog.clear();
                self.attempt = 0;
                TraceEvent::HandshakeCompleted {
                    device,
                    devices_listed: listed,
                    generation: self.transport.generation(),
                }
                .emit();
                self.notify(Status::Connected);
                self.set_phase(ConnectionPhase::Attaching);
                self.settle_at = Some(Instant::now() + self.config.settle_delay);
            }
        }
    }

    /// Drop all per-connection state: timers, cadence, queued sends, pending reads.
    fn reset_link_state(&mut self) {
        self.watchdog.clear();
        self.scheduler.stop();
        self.settle_at = None;
        self.pending.clear();
    }

    /// Tear down the live connection because of `fault` and, if the session
    /// is still active, arrange the next attempt per the reconnect policy.
    fn teardown(&mut self, fault: Fault) {
        let generation = self.transport.generation();
        self.reset_link_state();
        let had_link = self.transport.close();

        TraceEvent::ConnectionClosed {
            generation,
            fault: Some(fault.to_string()),
        }
        .emit();

        if had_link && fault != Fault::EmptyDeviceList {
            self.notify(Status::Disconnected);
        }
        self.set_phase(ConnectionPhase::Disconnected);

        if !self.active {
            return;
        }
        match self.config.reconnect.delay_for(&fault) {
            Some(delay) if delay.is_zero() => self.connect(),
            Some(delay) => {
                TraceEvent::ReconnectScheduled {
                    delay_ms: delay.as_millis() as u64,
                    attempt: self.attempt + 1,
                }
                .emit();
                self.reconnect_at = Some(Instant::now() + delay);
            }
            None => {}
        }
    }

    // ── Inbound ──────────────────────────────────────────────────────

    async fn handle_inbound(&mut self, inbound: Inbound) {
        let Inbound { generation, event } = inbound;
        if !self.transport.is_current(generation) {
            tracing::trace!(generation, "dropping event from stale connection");
            return;
        }

        match event {
            LinkEvent::Opened(ws) => self.on_open(generation, ws).await,
            LinkEvent::ConnectFailed(e) => {
                tracing::warn!(generation, error = %e, "connect failed");
                self.notify(Status::Error);
                self.teardown(Fault::UnexpectedClose);
            }
            LinkEvent::Text(text) => {
                if self.phase == ConnectionPhase::AwaitingDeviceList {
                    self.on_device_list(&text).await;
                } else {
                    tracing::debug!(phase = %self.phase, text = %text, "ignoring text frame");
                }
            }
            LinkEvent::Binary(payload) => {
                if self.phase.reads_memory() {
                    self.on_read_reply(&payload);
                } else {
                    tracing::debug!(phase = %self.phase, bytes = payload.len(), "ignoring binary frame");
                }
            }
            LinkEvent::Error(e) => {
                tracing::warn!(generation, error = %Fault::Transport(e), "connection error");
                self.notify(Status::Error);
            }
            LinkEvent::Closed => {
                tracing::info!(generation, "connection closed by peer");
                self.teardown(Fault::UnexpectedClose);
            }
        }
    }

    fn on_read_reply(&mut self, payload: &[u8]) {
        match self.pending.correlate(payload) {
            Correlation::Matched {
                key,
                address,
                value,
            } => {
                self.last_progress = Instant::now();
                tracing::trace!(key = %key, address = %at_protocol::format_address(address), value, "read reply");
                let _ = self.events.send(SessionEvent::Value(StatValue {
                    key,
                    value,
                    observed_at: Utc::now(),
                }));
            }
            Correlation::Empty { key, address } => {
                self.last_progress = Instant::now();
                tracing::warn!(key = %key, address = %at_protocol::format_address(address), "empty read reply");
            }
            Correlation::Unmatched => {
                tracing::debug!(bytes = payload.len(), "read reply with nothing pending, dropped");
            }
        }
    }

    // ── Timers ───────────────────────────────────────────────────────

    fn next_deadline(&self) -> Option<Instant> {
        [
            self.watchdog.deadline(),
            self.settle_at,
            self.reconnect_at,
            self.scheduler.next_deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    async fn fire_timers(&mut self, now: Instant) {
        if self.reconnect_at.is_some_and(|t| t <= now) {
            self.reconnect_at = None;
            self.connect();
        }

        if let Some(stage) = self.watchdog.take_expired(now) {
            tracing::warn!(stage = stage.as_str(), phase = %self.phase, "watchdog expired");
            TraceEvent::WatchdogExpired {
                phase: self.phase.to_string(),
                generation: self.transport.generation(),
            }
            .emit();
            self.teardown(Fault::WatchdogTimeout);
        }

        if self.settle_at.is_some_and(|t| t <= now) {
            self.settle_at = None;
            self.begin_polling(now);
        }

        while let Some(read) = self.scheduler.pop_due(now) {
            if !self.send_read(read).await {
                break;
            }
        }

        if self.scheduler.tick_due(now) {
            self.poll_tick(now);
        }
    }

    fn begin_polling(&mut self, now: Instant) {
        if !self.transport.is_open() {
            return;
        }
        tracing::info!(
            interval_ms = self.config.poll_interval.as_millis() as u64,
            addresses = self.table.len(),
            "polling started"
        );
        self.set_phase(ConnectionPhase::Polling);
        self.last_progress = now;
        self.scheduler.start(now);
    }

    fn poll_tick(&mut self, now: Instant) {
        if !self.transport.is_open() {
            self.scheduler.stop();
            return;
        }
        if let Some(table) = self.staged_table.take() {
            self.table = table;
        }

        // The deadline counts from the last sign of life, so a server that
        // stops answering reads trips it even though ticks keep coming.
        self.watchdog
            .arm(WatchdogStage::Polling, self.last_progress + self.config.timeout);
        self.log_watchdog_armed();

        let discarded = self.pending.clear();
        let cycle = self
            .scheduler
            .begin_cycle(now, &self.table, self.transport.generation());
        TraceEvent::PollCycleStarted {
            cycle,
            addresses: self.table.len(),
            discarded_pending: discarded,
        }
        .emit();
    }

    /// Fire one staggered send. Returns `false` if the connection went away.
    async fn send_read(&mut self, read: ScheduledRead) -> bool {
        if !self.active
            || !self.transport.is_open()
            || !self.transport.is_current(read.generation)
            || read.cycle != self.scheduler.cycle()
        {
            return self.transport.is_open();
        }
        // Enqueue before sending: the reply can never beat its entry.
        self.pending.push(read.key.as_str(), read.address);
        tracing::trace!(key = %read.key, cycle = read.cycle, "read request");
        self.send(Request::get_address(read.address)).await
    }

    // ── Helpers ──────────────────────────────────────────────────────

    /// Send on the live connection. A send failure is a transport error
    /// followed by a close; returns `false` once that teardown has run.
    async fn send(&mut self, request: Request) -> bool {
        match self.transport.send(&request).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(opcode = ?request.opcode, error = %e, "send failed");
                self.notify(Status::Error);
                self.teardown(Fault::UnexpectedClose);
                false
            }
        }
    }

    fn log_watchdog_armed(&self) {
        if let Some(stage) = self.watchdog.stage() {
            tracing::trace!(
                stage = stage.as_str(),
                arms = self.watchdog.arm_count(),
                "watchdog armed"
            );
        }
    }

    fn notify(&self, status: Status) {
        tracing::info!(status = %status, "status");
        let _ = self.events.send(SessionEvent::Status { status });
    }

    fn set_phase(&mut self, phase: ConnectionPhase) {
        if self.phase != phase {
            tracing::debug!(from = %self.phase, to = %phase, "phase");
            self.phase = phase;
            self.phase_tx.send_replace(phase);
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
