//! WebSocket transport wrapper.
//!
//! Owns the tungstenite stream for one relay connection. The read half runs
//! on a spawned task that converts raw messages into [`SocketEvent`]s on an
//! mpsc channel — the interactor's actor drains that channel, so the socket
//! callback cycle from the transport into the state machine is broken by
//! message passing. The write half stays with [`RelaySocket`] and every send
//! runs under the caller's watchdog.
//!
//! Quirks handled here:
//!
//! - The bridge URL is advertised as `https`/`http` but dialed as
//!   `wss`/`ws`.
//! - The relay sends both protocol-level pings and a legacy `"ping"` text
//!   frame. The text variant is surfaced as [`SocketEvent::TextPing`] so the
//!   interactor can answer with a `"pong"` text frame.
//! - Close code 4022 is the relay's fatal security close; the code is
//!   forwarded verbatim for the interactor to classify.

use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};
use url::Url;

use super::frame::RelayFrame;
use crate::error::{BridgeError, BridgeResult};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Capacity of the reader-to-actor event channel. Large enough to absorb a
/// burst of relay frames while the actor is mid-send.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Legacy application-level heartbeat text.
const TEXT_PING: &str = "ping";
const TEXT_PONG: &str = "pong";

// ---------------------------------------------------------------------------
// Socket Events
// ---------------------------------------------------------------------------

/// What the reader task reports to the interactor.
#[derive(Debug)]
pub enum SocketEvent {
    /// A parsed relay frame.
    Frame(RelayFrame),
    /// The legacy `"ping"` text frame; answer with [`RelaySocket::pong_text`].
    TextPing,
    /// Inbound text that did not parse as a relay frame. The connection
    /// stays open; the error is surfaced to the application.
    Malformed(BridgeError),
    /// The peer closed the connection.
    Closed { code: Option<u16>, reason: String },
    /// The transport failed; the connection is gone.
    Error(tokio_tungstenite::tungstenite::Error),
}

// ---------------------------------------------------------------------------
// Relay Socket
// ---------------------------------------------------------------------------

/// Write half plus reader task for one relay connection.
pub struct RelaySocket {
    sink: SplitSink<WsStream, Message>,
    reader: JoinHandle<()>,
    closed: bool,
}

impl RelaySocket {
    /// Dial the bridge and split the connection.
    ///
    /// Returns the socket (write half) and the event stream fed by the
    /// spawned reader. Connection establishment is bounded by `timeout`;
    /// expiry maps to [`BridgeError::SessionRequestTimeout`].
    pub async fn connect(
        bridge: &Url,
        timeout: Duration,
    ) -> BridgeResult<(Self, mpsc::Receiver<SocketEvent>)> {
        let target = ws_url(bridge)?;
        debug!(url = %target, "dialing bridge relay");

        let (stream, _response) = tokio::time::timeout(timeout, connect_async(target.as_str()))
            .await
            .map_err(|_| BridgeError::SessionRequestTimeout)??;

        let (sink, stream) = stream.split();
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let reader = tokio::spawn(read_loop(stream, event_tx));

        Ok((
            Self {
                sink,
                reader,
                closed: false,
            },
            event_rx,
        ))
    }

    /// Write one frame, bounded by the send watchdog.
    ///
    /// Watchdog expiry maps to [`BridgeError::SessionRequestTimeout`].
    pub async fn send_frame(&mut self, frame: &RelayFrame, timeout: Duration) -> BridgeResult<()> {
        let text = frame.to_json();
        trace!(topic = %frame.topic, kind = ?frame.kind, "sending relay frame");
        tokio::time::timeout(timeout, self.sink.send(Message::Text(text)))
            .await
            .map_err(|_| BridgeError::SessionRequestTimeout)?
            .map_err(BridgeError::from)
    }

    /// Protocol-level heartbeat.
    pub async fn ping(&mut self) -> BridgeResult<()> {
        self.sink
            .send(Message::Ping(Vec::new()))
            .await
            .map_err(BridgeError::from)
    }

    /// Reply to the relay's legacy `"ping"` text frame.
    pub async fn pong_text(&mut self) -> BridgeResult<()> {
        self.sink
            .send(Message::Text(TEXT_PONG.to_owned()))
            .await
            .map_err(BridgeError::from)
    }

    /// Close the connection with an explicit code. Idempotent: the close
    /// frame goes out exactly once per socket.
    pub async fn close(&mut self, code: u16, reason: &str) -> BridgeResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_owned().into(),
        };
        // A close error is not actionable; the reader observes the shutdown
        // either way.
        let _ = self.sink.send(Message::Close(Some(frame))).await;
        Ok(())
    }
}

impl Drop for RelaySocket {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

// ---------------------------------------------------------------------------
// Reader task
// ---------------------------------------------------------------------------

async fn read_loop(mut stream: SplitStream<WsStream>, events: mpsc::Sender<SocketEvent>) {
    let mut terminal_sent = false;

    while let Some(item) = stream.next().await {
        let event = match item {
            Ok(Message::Text(text)) => {
                if text == TEXT_PING {
                    SocketEvent::TextPing
                } else {
                    match RelayFrame::from_json(&text) {
                        Ok(frame) => SocketEvent::Frame(frame),
                        Err(err) => SocketEvent::Malformed(err),
                    }
                }
            }
            // tungstenite queues the protocol-level pong automatically.
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Ok(Message::Binary(_)) | Ok(Message::Frame(_)) => continue,
            Ok(Message::Close(frame)) => {
                terminal_sent = true;
                let (code, reason) = match frame {
                    Some(f) => (Some(u16::from(f.code)), f.reason.into_owned()),
                    None => (None, String::new()),
                };
                let _ = events.send(SocketEvent::Closed { code, reason }).await;
                break;
            }
            Err(err) => {
                terminal_sent = true;
                let _ = events.send(SocketEvent::Error(err)).await;
                break;
            }
        };

        if events.send(event).await.is_err() {
            // Interactor dropped the receiver; nothing left to report to.
            return;
        }
    }

    if !terminal_sent {
        let _ = events
            .send(SocketEvent::Closed {
                code: None,
                reason: String::new(),
            })
            .await;
    }
}

// ---------------------------------------------------------------------------
// URL mapping
// ---------------------------------------------------------------------------

/// Maps the advertised bridge URL onto the WebSocket scheme.
fn ws_url(bridge: &Url) -> BridgeResult<Url> {
    let scheme = match bridge.scheme() {
        "https" => "wss",
        "http" => "ws",
        s @ ("ws" | "wss") => s,
        other => {
            return Err(BridgeError::InvalidUri(format!(
                "bridge scheme {other} cannot carry a WebSocket"
            )))
        }
    };

    let mut url = bridge.clone();
    url.set_scheme(scheme)
        .map_err(|_| BridgeError::InvalidUri("bridge URL rejects ws scheme".into()))?;
    Ok(url)
}
