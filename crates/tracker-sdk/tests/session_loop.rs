//! Integration test: boots an in-process WebSocket server that simulates a
//! device-control server, connects a real session, and asserts the
//! handshake, polling, correlation and recovery behavior end to end.
//!
//! Timing constants are shortened so each scenario runs in well under a
//! few seconds.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use at_protocol::{Opcode, Request, ResultsReply};
use at_tracker_sdk::{
    ConnectionPhase, SessionBuilder, SessionEvent, SessionEvents, SessionHandle, Status,
};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

const INTERVAL: Duration = Duration::from_millis(100);
const TIMEOUT: Duration = Duration::from_millis(600);
const STAGGER: Duration = Duration::from_millis(5);
const SETTLE: Duration = Duration::from_millis(30);
const BACKOFF: Duration = Duration::from_millis(300);

// ── Fake server ─────────────────────────────────────────────────────────

/// How one accepted connection behaves.
#[derive(Clone)]
enum Behavior {
    /// List `devices` and answer every read from `memory` (missing = 0).
    Device {
        devices: Vec<String>,
        memory: HashMap<u32, u8>,
    },
    /// List `devices`, then never answer a read.
    MuteReads { devices: Vec<String> },
    /// Answer `DeviceList` with a reply that does not parse.
    Garbage,
    /// Never reply to anything.
    Silent,
}

fn device(memory: &[(u32, u8)]) -> Behavior {
    Behavior::Device {
        devices: vec!["SD2SNES".into(), "EMU".into()],
        memory: memory.iter().copied().collect(),
    }
}

#[derive(Debug)]
enum Observed {
    Connected { conn: usize, kill: CancellationToken },
    Request { conn: usize, request: Request },
    Disconnected { conn: usize },
}

/// Boots a fake server on an ephemeral port. Connection `i` uses
/// `behaviors[i]`, or the last behavior once the list runs out.
async fn start_fake_server(behaviors: Vec<Behavior>) -> (SocketAddr, mpsc::UnboundedReceiver<Observed>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut conn = 0usize;
        while let Ok((stream, _peer)) = listener.accept().await {
            let behavior = behaviors
                .get(conn)
                .or(behaviors.last())
                .cloned()
                .unwrap();
            let tx = tx.clone();
            let id = conn;
            conn += 1;

            tokio::spawn(async move {
                let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                let (mut sink, mut stream) = ws.split();
                let kill = CancellationToken::new();
                let _ = tx.send(Observed::Connected {
                    conn: id,
                    kill: kill.clone(),
                });

                loop {
                    let msg = tokio::select! {
                        _ = kill.cancelled() => {
                            let _ = sink.close().await;
                            break;
                        }
                        msg = stream.next() => msg,
                    };
                    let text = match msg {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                        Some(Ok(_)) => continue,
                    };
                    let Ok(request) = serde_json::from_str::<Request>(&text) else {
                        continue;
                    };
                    let _ = tx.send(Observed::Request {
                        conn: id,
                        request: request.clone(),
                    });

                    let reply = match (&behavior, request.opcode) {
                        (Behavior::Device { devices, .. }, Opcode::DeviceList)
                        | (Behavior::MuteReads { devices }, Opcode::DeviceList) => {
                            let body = ResultsReply {
                                results: devices.clone(),
                            };
                            Some(Message::Text(serde_json::to_string(&body).unwrap()))
                        }
                        (Behavior::Garbage, Opcode::DeviceList) => {
                            Some(Message::Text(r#"{"Results": 12}"#.into()))
                        }
                        (Behavior::Device { memory, .. }, Opcode::GetAddress) => {
                            let address = u32::from_str_radix(&request.operands[0], 16).unwrap();
                            let value = memory.get(&address).copied().unwrap_or(0);
                            Some(Message::Binary(vec![value]))
                        }
                        _ => None,
                    };
                    if let Some(reply) = reply {
                        if sink.send(reply).await.is_err() {
                            break;
                        }
                    }
                }
                let _ = tx.send(Observed::Disconnected { conn: id });
            });
        }
    });

    (addr, rx)
}

// ── Helpers ─────────────────────────────────────────────────────────────

fn session(addr: SocketAddr, selection: &[&str]) -> SessionHandle {
    SessionBuilder::new()
        .host(addr.ip().to_string())
        .port(addr.port())
        .selection(selection.iter().copied())
        .poll_interval(INTERVAL)
        .timeout(TIMEOUT)
        .stagger(STAGGER)
        .settle_delay(SETTLE)
        .reconnect_delay(BACKOFF)
        .build()
        .unwrap()
        .spawn()
}

async fn next_observed(rx: &mut mpsc::UnboundedReceiver<Observed>) -> Observed {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timeout waiting for server observation")
        .expect("server channel closed")
}

/// Next status event, skipping values.
async fn next_status(events: &mut SessionEvents) -> Status {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        match tokio::time::timeout_at(deadline, events.recv()).await {
            Ok(Some(SessionEvent::Status { status })) => return status,
            Ok(Some(SessionEvent::Value(_))) => continue,
            Ok(None) => panic!("event channel closed"),
            Err(_) => panic!("timeout waiting for status"),
        }
    }
}

/// Skip observations until a connection with index `conn` is accepted.
async fn wait_connected(rx: &mut mpsc::UnboundedReceiver<Observed>, conn: usize) -> CancellationToken {
    loop {
        if let Observed::Connected { conn: c, kill } = next_observed(rx).await {
            if c == conn {
                return kill;
            }
        }
    }
}

/// Collect the requests of connection `conn` until `n` have been seen.
async fn requests(rx: &mut mpsc::UnboundedReceiver<Observed>, conn: usize, n: usize) -> Vec<Request> {
    let mut out = Vec::new();
    while out.len() < n {
        if let Observed::Request { conn: c, request } = next_observed(rx).await {
            if c == conn {
                out.push(request);
            }
        }
    }
    out
}

// ── Tests ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn handshake_attaches_first_device_and_polls() {
    let (addr, mut server) = start_fake_server(vec![device(&[(0xF5F449, 5)])]).await;
    let mut s = session(addr, &["deaths", "not_a_stat"]);
    s.controller.start().unwrap();

    wait_connected(&mut server, 0).await;
    let reqs = requests(&mut server, 0, 6).await;

    assert_eq!(reqs[0], Request::device_list());
    assert_eq!(reqs[1], Request::attach("SD2SNES"));
    let reads: Vec<_> = reqs[2..].iter().map(|r| r.operands.clone()).collect();
    assert_eq!(
        reads,
        vec![
            vec!["F50000", "1"],
            vec!["F50010", "1"],
            vec!["F50019", "1"],
            vec!["F5F449", "1"],
        ]
    );

    assert_eq!(next_status(&mut s.events).await, Status::Connecting);
    assert_eq!(next_status(&mut s.events).await, Status::Connected);

    // The fourth reply of the cycle answers the deaths read.
    let deaths = loop {
        match tokio::time::timeout(Duration::from_secs(5), s.events.recv()).await {
            Ok(Some(SessionEvent::Value(v))) if v.key == "deaths" => break v,
            Ok(Some(_)) => continue,
            other => panic!("expected deaths value, got {other:?}"),
        }
    };
    assert_eq!(deaths.value, 5);
    assert_eq!(s.controller.phase(), ConnectionPhase::Polling);

    s.controller.shutdown();
    let _ = tokio::time::timeout(Duration::from_secs(5), s.task).await;
}

#[tokio::test]
async fn healthy_polling_never_trips_the_watchdog() {
    let (addr, mut server) = start_fake_server(vec![device(&[])]).await;
    let mut s = session(addr, &[]);
    s.controller.start().unwrap();

    assert_eq!(next_status(&mut s.events).await, Status::Connecting);
    assert_eq!(next_status(&mut s.events).await, Status::Connected);

    // Well past the watchdog timeout with replies flowing.
    tokio::time::sleep(TIMEOUT * 2).await;
    while let Ok(ev) = s.events.try_recv() {
        assert!(
            !matches!(ev, SessionEvent::Status { .. }),
            "unexpected status while healthy: {ev:?}"
        );
    }

    let mut attaches = 0;
    let mut reads = 0;
    while let Ok(obs) = server.try_recv() {
        match obs {
            Observed::Connected { conn, .. } => assert_eq!(conn, 0, "unexpected reconnect"),
            Observed::Request { request, .. } => match request.opcode {
                Opcode::Attach => attaches += 1,
                Opcode::GetAddress => reads += 1,
                _ => {}
            },
            Observed::Disconnected { .. } => panic!("connection dropped while healthy"),
        }
    }
    assert_eq!(attaches, 1);
    assert!(reads >= 3 * 5, "expected several cycles of reads, got {reads}");

    s.controller.shutdown();
}

#[tokio::test]
async fn empty_device_list_reports_no_device_and_reconnects_after_backoff() {
    let (addr, mut server) = start_fake_server(vec![
        Behavior::Device {
            devices: vec![],
            memory: HashMap::new(),
        },
        device(&[]),
    ])
    .await;
    let mut s = session(addr, &[]);
    s.controller.start().unwrap();

    assert_eq!(next_status(&mut s.events).await, Status::Connecting);
    assert_eq!(next_status(&mut s.events).await, Status::NoDevice);

    let closed_at = loop {
        if let Observed::Disconnected { conn: 0 } = next_observed(&mut server).await {
            break Instant::now();
        }
    };
    wait_connected(&mut server, 1).await;
    assert!(
        closed_at.elapsed() + Duration::from_millis(50) >= BACKOFF,
        "reconnected before the backoff elapsed"
    );

    assert_eq!(next_status(&mut s.events).await, Status::Connecting);
    assert_eq!(next_status(&mut s.events).await, Status::Connected);

    s.controller.shutdown();
}

#[tokio::test]
async fn silent_handshake_trips_watchdog_and_reconnects_immediately() {
    let (addr, mut server) = start_fake_server(vec![Behavior::Silent, device(&[])]).await;
    let mut s = session(addr, &[]);
    s.controller.start().unwrap();

    wait_connected(&mut server, 0).await;
    let started = Instant::now();
    let reqs = requests(&mut server, 0, 1).await;
    assert_eq!(reqs[0].opcode, Opcode::DeviceList);

    wait_connected(&mut server, 1).await;
    let waited = started.elapsed();
    assert!(waited + Duration::from_millis(50) >= TIMEOUT, "watchdog fired early: {waited:?}");
    assert!(waited < TIMEOUT + BACKOFF, "reconnect waited for the close backoff: {waited:?}");

    // A fresh handshake on the new connection.
    let reqs = requests(&mut server, 1, 2).await;
    assert_eq!(reqs[0], Request::device_list());
    assert_eq!(reqs[1], Request::attach("SD2SNES"));

    assert_eq!(next_status(&mut s.events).await, Status::Connecting);
    assert_eq!(next_status(&mut s.events).await, Status::Disconnected);
    assert_eq!(next_status(&mut s.events).await, Status::Connecting);
    assert_eq!(next_status(&mut s.events).await, Status::Connected);

    s.controller.shutdown();
}

#[tokio::test]
async fn unreadable_device_list_waits_for_watchdog() {
    let (addr, mut server) = start_fake_server(vec![Behavior::Garbage, device(&[])]).await;
    let mut s = session(addr, &[]);
    s.controller.start().unwrap();

    wait_connected(&mut server, 0).await;
    let started = Instant::now();
    let reqs = requests(&mut server, 0, 1).await;
    assert_eq!(reqs[0], Request::device_list());

    assert_eq!(next_status(&mut s.events).await, Status::Connecting);
    // The bad reply is swallowed: nothing happens until the watchdog fires.
    assert_eq!(next_status(&mut s.events).await, Status::Disconnected);
    let waited = started.elapsed();
    assert!(waited + Duration::from_millis(50) >= TIMEOUT, "gave up early: {waited:?}");

    // Reconnects without waiting out the close backoff.
    wait_connected(&mut server, 1).await;
    assert!(
        started.elapsed() < TIMEOUT + BACKOFF,
        "reconnect waited for the close backoff"
    );
    let reqs = requests(&mut server, 1, 2).await;
    assert_eq!(reqs[0], Request::device_list());
    assert_eq!(reqs[1], Request::attach("SD2SNES"));

    assert_eq!(next_status(&mut s.events).await, Status::Connecting);
    assert_eq!(next_status(&mut s.events).await, Status::Connected);

    s.controller.shutdown();
}

#[tokio::test]
async fn unanswered_reads_trip_watchdog_during_polling() {
    let (addr, mut server) = start_fake_server(vec![
        Behavior::MuteReads {
            devices: vec!["SD2SNES".into()],
        },
        device(&[]),
    ])
    .await;
    let mut s = session(addr, &[]);
    s.controller.start().unwrap();

    assert_eq!(next_status(&mut s.events).await, Status::Connecting);
    assert_eq!(next_status(&mut s.events).await, Status::Connected);

    wait_connected(&mut server, 0).await;
    wait_connected(&mut server, 1).await;
    let reqs = requests(&mut server, 1, 1).await;
    assert_eq!(reqs[0], Request::device_list());

    assert_eq!(next_status(&mut s.events).await, Status::Disconnected);
    assert_eq!(next_status(&mut s.events).await, Status::Connecting);

    s.controller.shutdown();
}

#[tokio::test]
async fn unexpected_close_reconnects_after_backoff() {
    let (addr, mut server) = start_fake_server(vec![device(&[])]).await;
    let mut s = session(addr, &[]);
    s.controller.start().unwrap();

    let kill = wait_connected(&mut server, 0).await;
    assert_eq!(next_status(&mut s.events).await, Status::Connecting);
    assert_eq!(next_status(&mut s.events).await, Status::Connected);

    kill.cancel();
    let killed_at = Instant::now();
    assert_eq!(next_status(&mut s.events).await, Status::Disconnected);

    wait_connected(&mut server, 1).await;
    assert!(
        killed_at.elapsed() + Duration::from_millis(50) >= BACKOFF,
        "reconnected before the backoff elapsed"
    );
    assert_eq!(next_status(&mut s.events).await, Status::Connecting);
    assert_eq!(next_status(&mut s.events).await, Status::Connected);

    s.controller.shutdown();
}

#[tokio::test]
async fn stop_silences_the_session() {
    let (addr, mut server) = start_fake_server(vec![device(&[])]).await;
    let mut s = session(addr, &["deaths", "bonks", "flutes"]);
    s.controller.start().unwrap();

    wait_connected(&mut server, 0).await;
    // Stop in the middle of polling, with staggered sends still queued.
    let _ = requests(&mut server, 0, 4).await;
    s.controller.stop().unwrap();

    loop {
        if let Observed::Disconnected { conn: 0 } = next_observed(&mut server).await {
            break;
        }
    }

    // Nothing reconnects and nothing else is sent.
    tokio::time::sleep(BACKOFF + TIMEOUT).await;
    while let Ok(obs) = server.try_recv() {
        assert!(
            !matches!(obs, Observed::Connected { .. }),
            "session reconnected after stop"
        );
    }
    assert_eq!(s.controller.phase(), ConnectionPhase::Idle);

    // stop() is idempotent and start() works again afterwards.
    s.controller.stop().unwrap();
    s.controller.start().unwrap();
    wait_connected(&mut server, 1).await;

    s.controller.shutdown();
}

#[tokio::test]
async fn selection_change_applies_to_next_cycle() {
    let (addr, mut server) = start_fake_server(vec![device(&[(0xF5F420, 9)])]).await;
    let mut s = session(addr, &[]);
    s.controller.start().unwrap();

    wait_connected(&mut server, 0).await;
    let reqs = requests(&mut server, 0, 5).await;
    assert_eq!(reqs[4].opcode, Opcode::GetAddress);

    s.controller.set_selection(["bonks"]).unwrap();

    let bonks = loop {
        match tokio::time::timeout(Duration::from_secs(5), s.events.recv()).await {
            Ok(Some(SessionEvent::Value(v))) if v.key == "bonks" => break v,
            Ok(Some(_)) => continue,
            other => panic!("expected bonks value, got {other:?}"),
        }
    };
    assert_eq!(bonks.value, 9);

    s.controller.shutdown();
}

#[tokio::test]
async fn set_host_targets_the_next_connection() {
    let (addr_a, mut server_a) = start_fake_server(vec![device(&[])]).await;
    let (addr_b, mut server_b) = start_fake_server(vec![device(&[])]).await;
    let mut s = session(addr_a, &[]);
    s.controller.start().unwrap();

    let kill = wait_connected(&mut server_a, 0).await;
    assert_eq!(next_status(&mut s.events).await, Status::Connecting);

    s.controller
        .set_host(addr_b.ip().to_string(), addr_b.port())
        .unwrap();
    // The live connection is untouched.
    assert_eq!(next_status(&mut s.events).await, Status::Connected);

    kill.cancel();
    wait_connected(&mut server_b, 0).await;
    let reqs = requests(&mut server_b, 0, 1).await;
    assert_eq!(reqs[0], Request::device_list());

    s.controller.shutdown();
}

#[tokio::test]
async fn refused_connection_reports_error_and_retries() {
    // Grab a free port, then release it so nothing is listening.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut s = session(addr, &[]);
    s.controller.start().unwrap();

    assert_eq!(next_status(&mut s.events).await, Status::Error);
    assert_eq!(next_status(&mut s.events).await, Status::Disconnected);
    // The close path retries after the backoff.
    assert_eq!(next_status(&mut s.events).await, Status::Error);

    s.controller.shutdown();
}

#[tokio::test]
async fn unusable_address_reports_error_without_retry() {
    let mut s = SessionBuilder::new()
        .host("not a host")
        .reconnect_delay(BACKOFF)
        .build()
        .unwrap()
        .spawn();
    s.controller.start().unwrap();

    assert_eq!(next_status(&mut s.events).await, Status::Error);
    tokio::time::sleep(BACKOFF * 2).await;
    assert!(s.events.try_recv().is_err(), "no retry expected");
    assert_eq!(s.controller.phase(), ConnectionPhase::Disconnected);

    s.controller.shutdown();
}

#[tokio::test]
async fn app_name_is_announced_before_device_list() {
    let (addr, mut server) = start_fake_server(vec![device(&[])]).await;
    let s = SessionBuilder::new()
        .host(addr.ip().to_string())
        .port(addr.port())
        .app_name("autotracker-test")
        .build()
        .unwrap()
        .spawn();
    s.controller.start().unwrap();

    wait_connected(&mut server, 0).await;
    let reqs = requests(&mut server, 0, 3).await;
    assert_eq!(reqs[0], Request::name("autotracker-test"));
    assert_eq!(reqs[1], Request::device_list());
    assert_eq!(reqs[2], Request::attach("SD2SNES"));

    s.controller.shutdown();
}
