//! The single WebSocket connection owned by a session.
//!
//! Every connection gets a generation number. Events from the connect task
//! and the reader task are tagged with it, so the session can discard
//! anything coming from a handle that has since been closed or replaced.

use std::time::Duration;

use at_protocol::Request;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::types::TrackerError;

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Something that happened on a connection.
pub(crate) enum LinkEvent {
    Opened(WsStream),
    ConnectFailed(String),
    Text(String),
    Binary(Vec<u8>),
    Error(String),
    Closed,
}

pub(crate) struct Inbound {
    pub generation: u64,
    pub event: LinkEvent,
}

enum Link {
    Closed,
    Connecting {
        cancel: CancellationToken,
    },
    Open {
        sink: SplitSink<WsStream, Message>,
        cancel: CancellationToken,
    },
}

pub(crate) struct Transport {
    generation: u64,
    link: Link,
    inbound: mpsc::UnboundedSender<Inbound>,
    connect_timeout: Duration,
}

impl Transport {
    pub fn new(inbound: mpsc::UnboundedSender<Inbound>, connect_timeout: Duration) -> Self {
        Self {
            generation: 0,
            link: Link::Closed,
            inbound,
            connect_timeout,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether `generation` names the live (connecting or open) handle.
    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation && !self.is_closed()
    }

    pub fn is_open(&self) -> bool {
        matches!(self.link, Link::Open { .. })
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.link, Link::Closed)
    }

    /// Begin connecting to `url`. A no-op returning the current generation
    /// when a handle already exists. Fails synchronously only when the URL
    /// cannot form a request; I/O failures arrive later as
    /// [`LinkEvent::ConnectFailed`].
    pub fn open(&mut self, url: &str) -> Result<u64, TrackerError> {
        if !self.is_closed() {
            return Ok(self.generation);
        }

        let request = url
            .into_client_request()
            .map_err(|e| TrackerError::WebSocket(e.to_string()))?;

        self.generation += 1;
        let generation = self.generation;
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let tx = self.inbound.clone();
        let timeout = self.connect_timeout;

        tokio::spawn(async move {
            let event = tokio::select! {
                _ = token.cancelled() => return,
                r = tokio::time::timeout(timeout, tokio_tungstenite::connect_async(request)) => {
                    match r {
                        Ok(Ok((ws, _response))) => LinkEvent::Opened(ws),
                        Ok(Err(e)) => LinkEvent::ConnectFailed(e.to_string()),
                        Err(_) => LinkEvent::ConnectFailed("connect timed out".into()),
                    }
                }
            };
            let _ = tx.send(Inbound { generation, event });
        });

        self.link = Link::Connecting { cancel };
        Ok(generation)
    }

    /// Adopt the stream produced by the connect task for `generation` and
    /// start its reader. Returns `false` (dropping the stream) if that
    /// attempt is no longer the live one.
    pub fn adopt(&mut self, generation: u64, ws: WsStream) -> bool {
        if generation != self.generation {
            return false;
        }
        let cancel = match std::mem::replace(&mut self.link, Link::Closed) {
            Link::Connecting { cancel } => cancel,
            other => {
                self.link = other;
                return false;
            }
        };

        let (sink, stream) = ws.split();
        tokio::spawn(read_loop(
            generation,
            stream,
            self.inbound.clone(),
            cancel.clone(),
        ));
        self.link = Link::Open { sink, cancel };
        true
    }

    pub async fn send(&mut self, request: &Request) -> Result<(), TrackerError> {
        let Link::Open { sink, .. } = &mut self.link else {
            return Err(TrackerError::NotConnected);
        };
        let json = request.to_json()?;
        sink.send(Message::Text(json))
            .await
            .map_err(|e| TrackerError::WebSocket(e.to_string()))
    }

    /// Invalidate the handle synchronously. The reader stops without
    /// reporting a close; a close frame is sent in the background.
    /// Returns whether a handle existed.
    pub fn close(&mut self) -> bool {
        match std::mem::replace(&mut self.link, Link::Closed) {
            Link::Closed => false,
            Link::Connecting { cancel } => {
                cancel.cancel();
                true
            }
            Link::Open { mut sink, cancel } => {
                cancel.cancel();
                tokio::spawn(async move {
                    let _ = sink.close().await;
                });
                true
            }
        }
    }
}

async fn read_loop(
    generation: u64,
    mut stream: SplitStream<WsStream>,
    tx: mpsc::UnboundedSender<Inbound>,
    cancel: CancellationToken,
) {
    loop {
        let msg = tokio::select! {
            _ = cancel.cancelled() => return,
            msg = stream.next() => msg,
        };

        let event = match msg {
            Some(Ok(Message::Text(text))) => LinkEvent::Text(text),
            Some(Ok(Message::Binary(bytes))) => LinkEvent::Binary(bytes),
            Some(Ok(Message::Close(_))) | None => {
                let _ = tx.send(Inbound {
                    generation,
                    event: LinkEvent::Closed,
                });
                return;
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                let _ = tx.send(Inbound {
                    generation,
                    event: LinkEvent::Error(e.to_string()),
                });
                let _ = tx.send(Inbound {
                    generation,
                    event: LinkEvent::Closed,
                });
                return;
            }
        };

        if tx.send(Inbound { generation, event }).is_err() {
            return;
        }
    }
}
