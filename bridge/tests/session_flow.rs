//! End-to-end session scenarios against an in-process relay.
//!
//! Each test spins up a loopback WebSocket server that speaks the relay
//! frame protocol, points an interactor at it with compressed timeouts,
//! and asserts on both sides: the frames the relay receives and the
//! callbacks the observer sees. No shared state between tests; every
//! scenario owns its own relay and interactor.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use lumen_bridge::callbacks::SessionObserver;
use lumen_bridge::chains::ChainRouter;
use lumen_bridge::crypto::envelope;
use lumen_bridge::error::BridgeError;
use lumen_bridge::interactor::{
    ConnectionState, Interactor, InteractorConfig, InteractorOptions, ReconnectPolicy,
};
use lumen_bridge::relay::{FrameKind, RelayFrame};
use lumen_bridge::rpc::ChainId;
use lumen_bridge::session::{
    MemorySessionStore, PeerMeta, Session, SessionParams, SessionRequestParams, SessionSource,
    SessionStore, StoredSession,
};

const KEY: [u8; 32] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e,
    0x0f, 0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19, 0x1a, 0x1b, 0x1c, 0x1d,
    0x1e, 0x1f,
];

const TOPIC: &str = "abc-123";
const WAIT: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Mock relay
// ---------------------------------------------------------------------------

enum RelayCommand {
    Send(String),
    Close(u16),
}

struct MockRelay {
    port: u16,
    inbound: mpsc::UnboundedReceiver<String>,
    commands: mpsc::UnboundedSender<RelayCommand>,
}

impl MockRelay {
    /// Binds a loopback listener and serves relay connections one at a
    /// time — a dropped connection (pause, reconnect) is followed by a
    /// fresh accept.
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("local addr").port();

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (command_tx, mut command_rx) = mpsc::unbounded_channel::<RelayCommand>();

        tokio::spawn(async move {
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(_) => return,
                };
                let ws = match tokio_tungstenite::accept_async(stream).await {
                    Ok(ws) => ws,
                    Err(_) => return,
                };
                let (mut sink, mut source) = ws.split();

                loop {
                    tokio::select! {
                        message = source.next() => {
                            match message {
                                Some(Ok(Message::Text(text))) => {
                                    let _ = inbound_tx.send(text);
                                }
                                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                                Some(Ok(_)) => {}
                            }
                        }
                        command = command_rx.recv() => {
                            match command {
                                Some(RelayCommand::Send(text)) => {
                                    if sink.send(Message::Text(text)).await.is_err() {
                                        break;
                                    }
                                }
                                Some(RelayCommand::Close(code)) => {
                                    let frame = CloseFrame {
                                        code: CloseCode::from(code),
                                        reason: "".into(),
                                    };
                                    let _ = sink.send(Message::Close(Some(frame))).await;
                                    break;
                                }
                                None => return,
                            }
                        }
                    }
                }
            }
        });

        Self {
            port,
            inbound: inbound_rx,
            commands: command_tx,
        }
    }

    /// Next text message from the client, parsed as a relay frame.
    async fn expect_frame(&mut self) -> RelayFrame {
        let text = self.expect_text().await;
        RelayFrame::from_json(&text).expect("client sent a non-frame")
    }

    async fn expect_text(&mut self) -> String {
        tokio::time::timeout(WAIT, self.inbound.recv())
            .await
            .expect("timed out waiting for a client message")
            .expect("relay connection ended")
    }

    /// Asserts the client stays quiet for the given window.
    async fn expect_silence(&mut self, window: Duration) {
        if let Ok(Some(text)) = tokio::time::timeout(window, self.inbound.recv()).await {
            panic!("expected silence, client sent: {text}");
        }
    }

    fn deliver_raw(&self, text: impl Into<String>) {
        self.commands
            .send(RelayCommand::Send(text.into()))
            .expect("relay task gone");
    }

    /// Encrypts a JSON-RPC payload and delivers it as a `pub` frame.
    fn deliver_encrypted(&self, payload: &Value) {
        let sealed = envelope::encrypt(payload.to_string().as_bytes(), &KEY);
        let frame = RelayFrame::publish(TOPIC, &sealed);
        self.deliver_raw(frame.to_json());
    }

    fn close(&self, code: u16) {
        let _ = self.commands.send(RelayCommand::Close(code));
    }
}

// ---------------------------------------------------------------------------
// Observer plumbing
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Observed {
    Connected,
    Disconnected(Option<String>),
    SessionRequest(i64, SessionRequestParams),
    Killed,
    Custom(i64, Value),
    Error(String),
    Ack(String),
}

struct ChannelObserver(mpsc::UnboundedSender<Observed>);

impl SessionObserver for ChannelObserver {
    fn on_connected(&self) {
        let _ = self.0.send(Observed::Connected);
    }

    fn on_disconnect(&self, error: Option<&BridgeError>) {
        let _ = self
            .0
            .send(Observed::Disconnected(error.map(|e| format!("{e:?}"))));
    }

    fn on_session_request(&self, id: i64, params: SessionRequestParams) {
        let _ = self.0.send(Observed::SessionRequest(id, params));
    }

    fn on_session_killed(&self) {
        let _ = self.0.send(Observed::Killed);
    }

    fn on_custom_request(&self, id: i64, request: Value, _timestamp: Option<u64>) {
        let _ = self.0.send(Observed::Custom(id, request));
    }

    fn on_error(&self, error: BridgeError) {
        let _ = self.0.send(Observed::Error(format!("{error:?}")));
    }

    fn on_ack(&self, ack: lumen_bridge::relay::AckMessage) {
        let _ = self.0.send(Observed::Ack(ack.topic));
    }
}

async fn expect_observed(events: &mut mpsc::UnboundedReceiver<Observed>) -> Observed {
    tokio::time::timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for an observer callback")
        .expect("observer channel closed")
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn loopback_session(port: u16) -> Session {
    Session {
        topic: TOPIC.into(),
        version: "1".into(),
        bridge: Url::parse(&format!("http://127.0.0.1:{port}/")).unwrap(),
        key: KEY,
        numerical_version: 1.0,
        source: SessionSource::Wc,
        is_extension: false,
    }
}

fn fast_config() -> InteractorConfig {
    InteractorConfig {
        session_request_timeout: Duration::from_millis(300),
        connect_timeout: Duration::from_secs(2),
        send_timeout: Duration::from_secs(2),
        // Long enough that no heartbeat fires inside a test.
        ping_interval: Duration::from_secs(60),
        reconnect: ReconnectPolicy::default(),
    }
}

struct Harness {
    relay: MockRelay,
    interactor: Interactor,
    observed: mpsc::UnboundedReceiver<Observed>,
}

/// Spins up the relay and a connected interactor, and drains the two
/// initial `sub` frames (session topic + client id).
async fn connect_harness(config: InteractorConfig, router: ChainRouter) -> Harness {
    let mut relay = MockRelay::start().await;
    let (observer_tx, mut observed) = mpsc::unbounded_channel();

    let options = InteractorOptions {
        config,
        observer: Arc::new(ChannelObserver(observer_tx)),
        router,
        ..InteractorOptions::default()
    };
    let interactor = Interactor::new(loopback_session(relay.port), options);

    interactor.connect().await.expect("connect");
    assert_eq!(interactor.state(), ConnectionState::Connected);

    let first = relay.expect_frame().await;
    let second = relay.expect_frame().await;
    assert_eq!(first.kind, FrameKind::Sub);
    assert_eq!(second.kind, FrameKind::Sub);
    assert_eq!(first.topic, TOPIC);
    assert_eq!(second.topic, interactor.client_id());

    assert!(matches!(
        expect_observed(&mut observed).await,
        Observed::Connected
    ));

    Harness {
        relay,
        interactor,
        observed,
    }
}

fn session_request_payload(id: i64, peer_id: &str) -> Value {
    json!({
        "id": id,
        "jsonrpc": "2.0",
        "method": "wc_sessionRequest",
        "params": [{
            "peerId": peer_id,
            "peerMeta": {"name": "Example DApp", "url": "https://dapp.example"},
            "chainId": "1"
        }]
    })
}

/// Decrypts the payload of a `pub` frame back into JSON.
fn open_publish(frame: &RelayFrame) -> Value {
    assert_eq!(frame.kind, FrameKind::Pub);
    let sealed = frame.envelope().expect("payload").expect("envelope");
    let plain = envelope::decrypt(&sealed, &KEY).expect("decrypt");
    serde_json::from_slice(&plain).expect("json")
}

// ---------------------------------------------------------------------------
// S1 — pair and approve
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pair_and_approve_session() {
    let mut h = connect_harness(fast_config(), ChainRouter::default()).await;

    // Approving before any handshake must fail.
    let premature = h
        .interactor
        .approve_session(SessionParams::kill())
        .await
        .unwrap_err();
    assert!(matches!(premature, BridgeError::SessionInvalid));

    h.relay.deliver_encrypted(&session_request_payload(42, "peer-9"));

    let Observed::SessionRequest(id, params) = expect_observed(&mut h.observed).await else {
        panic!("expected a session request callback");
    };
    assert_eq!(id, 42);
    assert_eq!(params.peer_id, "peer-9");
    assert_eq!(params.peer_meta.name, "Example DApp");

    // Learning the peer id subscribes to its topic.
    let peer_sub = h.relay.expect_frame().await;
    assert_eq!(peer_sub.kind, FrameKind::Sub);
    assert_eq!(peer_sub.topic, "peer-9");

    let peer = h.interactor.peer().expect("peer identity is known");
    assert_eq!(peer.peer_id, "peer-9");
    assert_eq!(peer.peer_meta.name, "Example DApp");

    let approval = SessionParams::approval(
        ChainId("1".into()),
        vec!["0xabc".into()],
        h.interactor.client_id().to_owned(),
        None,
    );
    h.interactor.approve_session(approval).await.expect("approve");

    let response_frame = h.relay.expect_frame().await;
    assert_eq!(response_frame.topic, "peer-9");
    let response = open_publish(&response_frame);
    assert_eq!(response["id"], 42);
    assert_eq!(response["result"]["approved"], true);
    assert_eq!(response["result"]["chainId"], "1");
    assert_eq!(response["result"]["accounts"][0], "0xabc");
    assert_eq!(response["result"]["peerId"], h.interactor.client_id());
}

// ---------------------------------------------------------------------------
// S2 — tampered envelope
// ---------------------------------------------------------------------------

#[tokio::test]
async fn tampered_envelope_surfaces_error_and_stays_connected() {
    let mut h = connect_harness(fast_config(), ChainRouter::default()).await;

    let mut sealed = envelope::encrypt(
        session_request_payload(42, "peer-9").to_string().as_bytes(),
        &KEY,
    );
    // Flip the last byte of the tag, keeping valid hex.
    let mut tag = hex::decode(&sealed.hmac).unwrap();
    *tag.last_mut().unwrap() ^= 0x01;
    sealed.hmac = hex::encode(tag);

    h.relay
        .deliver_raw(RelayFrame::publish(TOPIC, &sealed).to_json());

    let Observed::Error(error) = expect_observed(&mut h.observed).await else {
        panic!("expected an error callback");
    };
    assert_eq!(error, "HmacMismatch");
    assert_eq!(h.interactor.state(), ConnectionState::Connected);

    // The connection still works: a clean request goes through.
    h.relay.deliver_encrypted(&session_request_payload(43, "peer-9"));
    assert!(matches!(
        expect_observed(&mut h.observed).await,
        Observed::SessionRequest(43, _)
    ));
}

// ---------------------------------------------------------------------------
// S3 — handshake timeout
// ---------------------------------------------------------------------------

#[tokio::test]
async fn new_session_times_out_without_session_request() {
    let h = connect_harness(fast_config(), ChainRouter::default()).await;
    let mut observed = h.observed;

    // No session request is ever delivered; the watchdog (300ms) fires.
    let Observed::Disconnected(Some(error)) = expect_observed(&mut observed).await else {
        panic!("expected a disconnect with an error");
    };
    assert_eq!(error, "SessionRequestTimeout");
    assert_eq!(h.interactor.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn resumed_session_skips_the_handshake_watchdog() {
    let mut relay = MockRelay::start().await;
    let (observer_tx, mut observed) = mpsc::unbounded_channel();

    let session = loopback_session(relay.port);
    let store = Arc::new(MemorySessionStore::new());
    store.store(StoredSession {
        session: session.clone(),
        peer_id: "peer-9".into(),
        peer_meta: PeerMeta {
            name: "Example DApp".into(),
            url: "https://dapp.example".into(),
            description: None,
            icons: vec![],
        },
    });

    let options = InteractorOptions {
        config: fast_config(),
        observer: Arc::new(ChannelObserver(observer_tx)),
        store: Some(store),
        ..InteractorOptions::default()
    };
    let interactor = Interactor::new(session, options);
    interactor.connect().await.expect("connect");

    // Session topic, client id, and the restored peer topic.
    let mut topics = vec![
        relay.expect_frame().await.topic,
        relay.expect_frame().await.topic,
        relay.expect_frame().await.topic,
    ];
    topics.sort();
    let mut expected = vec![
        TOPIC.to_owned(),
        interactor.client_id().to_owned(),
        "peer-9".to_owned(),
    ];
    expected.sort();
    assert_eq!(topics, expected);

    assert!(matches!(
        expect_observed(&mut observed).await,
        Observed::Connected
    ));

    // Well past the 300ms watchdog window: still connected, no disconnect.
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(interactor.state(), ConnectionState::Connected);
    assert!(observed.try_recv().is_err());
}

// ---------------------------------------------------------------------------
// S4 — reject a chain request
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reject_request_sends_eip1193_code() {
    let mut h = connect_harness(fast_config(), ChainRouter::default()).await;

    h.relay.deliver_encrypted(&json!({
        "id": 7,
        "jsonrpc": "2.0",
        "method": "eth_sendTransaction",
        "params": [{"from": "0xfrom", "to": "0xto", "value": "0x0"}]
    }));

    // Give the inbound request a moment to be dispatched, then refuse it.
    tokio::time::sleep(Duration::from_millis(50)).await;
    h.interactor
        .reject_request(7, "user refused")
        .await
        .expect("reject");

    let frame = h.relay.expect_frame().await;
    let response = open_publish(&frame);
    assert_eq!(
        response,
        json!({
            "id": 7,
            "jsonrpc": "2.0",
            "error": {"code": 4001, "message": "user refused"}
        })
    );
}

// ---------------------------------------------------------------------------
// S5 — kill session
// ---------------------------------------------------------------------------

#[tokio::test]
async fn kill_session_sends_teardown_update() {
    let mut h = connect_harness(fast_config(), ChainRouter::default()).await;

    h.interactor
        .kill_session("wc_sessionUpdate")
        .await
        .expect("kill");

    let frame = h.relay.expect_frame().await;
    let request = open_publish(&frame);
    assert_eq!(request["method"], "wc_sessionUpdate");
    assert_eq!(
        request["params"][0],
        json!({"approved": false, "chainId": null, "accounts": null})
    );

    assert!(matches!(
        expect_observed(&mut h.observed).await,
        Observed::Killed
    ));
    assert_eq!(h.interactor.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn peer_initiated_update_with_approved_false_kills_the_session() {
    let mut h = connect_harness(fast_config(), ChainRouter::default()).await;

    h.relay.deliver_encrypted(&json!({
        "id": 99,
        "jsonrpc": "2.0",
        "method": "wc_sessionUpdate",
        "params": [{"approved": false, "chainId": null, "accounts": null}]
    }));

    assert!(matches!(
        expect_observed(&mut h.observed).await,
        Observed::Killed
    ));
    assert!(matches!(
        expect_observed(&mut h.observed).await,
        Observed::Disconnected(None)
    ));
    assert_eq!(h.interactor.state(), ConnectionState::Disconnected);
}

// ---------------------------------------------------------------------------
// S6 — custom request
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_method_with_id_becomes_a_custom_request() {
    let (chain_seen_tx, mut chain_seen) = mpsc::unbounded_channel();
    let mut router = ChainRouter::default();
    router
        .ethereum
        .on_sign(move |payload| drop(chain_seen_tx.send(payload.id)));

    let mut h = connect_harness(fast_config(), router).await;

    h.relay.deliver_encrypted(&json!({
        "id": 11,
        "jsonrpc": "2.0",
        "method": "my_custom",
        "params": {"anything": ["goes", 1]}
    }));

    let Observed::Custom(id, request) = expect_observed(&mut h.observed).await else {
        panic!("expected a custom request callback");
    };
    assert_eq!(id, 11);
    assert_eq!(request["method"], "my_custom");
    assert_eq!(request["params"]["anything"][0], "goes");

    // No chain handler fired.
    assert!(chain_seen.try_recv().is_err());
    assert_eq!(h.interactor.state(), ConnectionState::Connected);
}

// ---------------------------------------------------------------------------
// Pause / resume / reconnect
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pause_and_resume_resubscribes_and_keeps_the_handshake() {
    let mut h = connect_harness(fast_config(), ChainRouter::default()).await;

    h.relay.deliver_encrypted(&session_request_payload(42, "peer-9"));
    assert!(matches!(
        expect_observed(&mut h.observed).await,
        Observed::SessionRequest(42, _)
    ));
    let peer_sub = h.relay.expect_frame().await;
    assert_eq!(peer_sub.topic, "peer-9");

    h.interactor.pause().await.expect("pause");
    assert_eq!(h.interactor.state(), ConnectionState::Paused);

    h.interactor.resume().await.expect("resume");
    assert_eq!(h.interactor.state(), ConnectionState::Connected);

    // The fresh connection re-subscribes everything, peer topic included.
    let mut topics = vec![
        h.relay.expect_frame().await.topic,
        h.relay.expect_frame().await.topic,
        h.relay.expect_frame().await.topic,
    ];
    topics.sort();
    let mut expected = vec![
        TOPIC.to_owned(),
        h.interactor.client_id().to_owned(),
        "peer-9".to_owned(),
    ];
    expected.sort();
    assert_eq!(topics, expected);

    assert!(matches!(
        expect_observed(&mut h.observed).await,
        Observed::Connected
    ));

    // The pending handshake survived the pause.
    let approval = SessionParams::approval(
        ChainId("1".into()),
        vec!["0xabc".into()],
        h.interactor.client_id().to_owned(),
        None,
    );
    h.interactor.approve_session(approval).await.expect("approve");
    let response_frame = h.relay.expect_frame().await;
    assert_eq!(response_frame.topic, "peer-9");
    assert_eq!(open_publish(&response_frame)["id"], 42);
}

#[tokio::test]
async fn transient_close_reconnects_when_the_policy_allows() {
    let config = InteractorConfig {
        reconnect: ReconnectPolicy {
            enabled: true,
            delay: Duration::from_millis(100),
            max_attempts: 3,
        },
        ..fast_config()
    };
    let mut h = connect_harness(config, ChainRouter::default()).await;

    h.relay.close(1000);

    assert!(matches!(
        expect_observed(&mut h.observed).await,
        Observed::Disconnected(None)
    ));

    // The policy kicks in: a fresh connection subscribes again.
    let first = h.relay.expect_frame().await;
    let second = h.relay.expect_frame().await;
    assert_eq!(first.kind, FrameKind::Sub);
    assert_eq!(first.topic, TOPIC);
    assert_eq!(second.topic, h.interactor.client_id());

    assert!(matches!(
        expect_observed(&mut h.observed).await,
        Observed::Connected
    ));
    assert_eq!(h.interactor.state(), ConnectionState::Connected);
}

// ---------------------------------------------------------------------------
// Heartbeat, security close, quiescence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn legacy_text_ping_is_answered_with_text_pong() {
    let mut h = connect_harness(fast_config(), ChainRouter::default()).await;

    h.relay.deliver_raw("ping");
    assert_eq!(h.relay.expect_text().await, "pong");
    assert_eq!(h.interactor.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn security_close_code_is_fatal() {
    let mut h = connect_harness(fast_config(), ChainRouter::default()).await;

    h.relay.close(4022);

    let Observed::Disconnected(Some(error)) = expect_observed(&mut h.observed).await else {
        panic!("expected a disconnect with an error");
    };
    assert!(error.starts_with("Security"), "got: {error}");
    assert_eq!(h.interactor.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn disconnect_is_quiescent_and_idempotent() {
    let mut h = connect_harness(fast_config(), ChainRouter::default()).await;

    h.interactor.disconnect().await.expect("disconnect");
    assert!(matches!(
        expect_observed(&mut h.observed).await,
        Observed::Disconnected(None)
    ));
    assert_eq!(h.interactor.state(), ConnectionState::Disconnected);

    // A second disconnect is a no-op.
    h.interactor.disconnect().await.expect("second disconnect");

    // No frame, no timer callback — the handshake watchdog (300ms) must
    // not fire after a user disconnect.
    h.relay.expect_silence(Duration::from_millis(600)).await;
    assert!(h.observed.try_recv().is_err());

    // And answering the dead handshake fails cleanly.
    let err = h
        .interactor
        .reject_session("too late")
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::SessionInvalid));
}
