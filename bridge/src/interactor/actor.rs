//! The interactor's actor task.
//!
//! All mutable session state — connection state, handshake context,
//! subscription set, timers — lives on this task and is touched from
//! nowhere else. The loop selects over four sources: user commands, socket
//! events from the reader task, the heartbeat interval, and the handshake
//! deadline. Commands are processed to completion one at a time, so no
//! operation ever observes a half-applied transition.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite;
use tracing::{debug, trace, warn};

use super::subscriptions::SubscriptionRegistry;
use super::{Command, ConnectionState, InteractorConfig, PeerInfo};
use crate::callbacks::SessionObserver;
use crate::chains::ChainRouter;
use crate::config::{CLOSE_CODE_PAUSE, CLOSE_CODE_SECURITY, ERROR_CODE_INTERNAL, NO_HANDSHAKE};
use crate::crypto::envelope;
use crate::error::{BridgeError, BridgeResult};
use crate::events::BridgeEvent;
use crate::relay::{AckMessage, FrameKind, RelayFrame, RelaySocket, SocketEvent};
use crate::rpc::{first_param, JsonRpcErrorResponse, JsonRpcRequest, JsonRpcResponse};
use crate::session::{PeerMeta, Session, SessionParams, SessionRequestParams, SessionStore};

// ---------------------------------------------------------------------------
// Handshake context
// ---------------------------------------------------------------------------

/// Peer identity learned from `wc_sessionRequest`, plus the pending
/// handshake id. Reset whenever the connection drops.
struct HandshakeContext {
    handshake_id: i64,
    peer: Option<PeerInfo>,
}

impl HandshakeContext {
    fn new() -> Self {
        Self {
            handshake_id: NO_HANDSHAKE,
            peer: None,
        }
    }

    /// A session request has been seen and not yet answered or discarded.
    fn pending(&self) -> bool {
        self.handshake_id > 0
    }

    /// Where our publishes go once the peer is known.
    fn peer_topic(&self) -> Option<String> {
        self.peer.as_ref().map(|peer| peer.peer_id.clone())
    }

    fn reset(&mut self) {
        *self = Self::new();
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

pub(super) struct Actor {
    session: Arc<Session>,
    client_id: String,
    client_meta: Option<PeerMeta>,
    config: InteractorConfig,
    observer: Arc<dyn SessionObserver>,
    router: ChainRouter,
    store: Option<Arc<dyn SessionStore>>,

    state: ConnectionState,
    state_tx: watch::Sender<ConnectionState>,
    peer_tx: watch::Sender<Option<PeerInfo>>,
    commands: mpsc::UnboundedReceiver<Command>,

    socket: Option<RelaySocket>,
    socket_events: Option<mpsc::Receiver<SocketEvent>>,
    subscriptions: SubscriptionRegistry,
    handshake: HandshakeContext,
    handshake_deadline: Option<Instant>,
    user_cancelled: bool,
    reconnect_attempts: u32,
}

impl Actor {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        session: Arc<Session>,
        client_id: String,
        client_meta: Option<PeerMeta>,
        config: InteractorConfig,
        observer: Arc<dyn SessionObserver>,
        router: ChainRouter,
        store: Option<Arc<dyn SessionStore>>,
        state_tx: watch::Sender<ConnectionState>,
        peer_tx: watch::Sender<Option<PeerInfo>>,
        commands: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        Self {
            session,
            client_id,
            client_meta,
            config,
            observer,
            router,
            store,
            state: ConnectionState::Disconnected,
            state_tx,
            peer_tx,
            commands,
            socket: None,
            socket_events: None,
            subscriptions: SubscriptionRegistry::new(),
            handshake: HandshakeContext::new(),
            handshake_deadline: None,
            user_cancelled: false,
            reconnect_attempts: 0,
        }
    }

    pub(super) async fn run(mut self) {
        let mut ping = tokio::time::interval(self.config.ping_interval);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    match command {
                        Some(command) => self.handle_command(command).await,
                        // Handle dropped; the session is over.
                        None => break,
                    }
                }
                event = next_event(&mut self.socket_events) => {
                    match event {
                        Some(event) => self.handle_socket_event(event).await,
                        None => {
                            // Reader ended without a terminal event.
                            self.socket_events = None;
                            if matches!(self.state, ConnectionState::Connecting | ConnectionState::Connected) {
                                self.socket_lost(None, String::new(), None).await;
                            }
                        }
                    }
                }
                _ = ping.tick(), if matches!(self.state, ConnectionState::Connected) => {
                    if let Some(socket) = self.socket.as_mut() {
                        if let Err(err) = socket.ping().await {
                            debug!(error = %err, "heartbeat ping failed");
                        }
                    }
                }
                _ = deadline_expired(&self.handshake_deadline), if self.handshake_deadline.is_some() => {
                    self.handshake_timed_out().await;
                }
            }
        }

        self.close_socket(1000, "client shutdown").await;
    }

    // -- Commands -----------------------------------------------------------

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect(done) => {
                let result = self.connect().await;
                let _ = done.send(result);
            }
            Command::Disconnect(done) => {
                let result = self.user_disconnect().await;
                let _ = done.send(result);
            }
            Command::Pause(done) => {
                let result = self.pause().await;
                let _ = done.send(result);
            }
            Command::ApproveSession { params, done } => {
                let result = self.approve_session(params).await;
                let _ = done.send(result);
            }
            Command::RejectSession { message, done } => {
                let result = self.reject_session(&message).await;
                let _ = done.send(result);
            }
            Command::UpdateSession {
                params,
                method,
                done,
            } => {
                let result = self.update_session(params, &method).await;
                let _ = done.send(result);
            }
            Command::KillSession { method, done } => {
                let result = self.kill_session(&method).await;
                let _ = done.send(result);
            }
            Command::ApproveRequest { id, result, done } => {
                let result = self
                    .encrypt_and_send(JsonRpcResponse::new(id, result).to_json())
                    .await;
                let _ = done.send(result);
            }
            Command::RejectRequest {
                id,
                code,
                message,
                done,
            } => {
                let result = self
                    .encrypt_and_send(JsonRpcErrorResponse::new(id, code, message).to_json())
                    .await;
                let _ = done.send(result);
            }
        }
    }

    async fn connect(&mut self) -> BridgeResult<()> {
        if matches!(self.state, ConnectionState::Connected) {
            return Ok(());
        }

        self.user_cancelled = false;
        self.reconnect_attempts = 0;

        match self.open_socket().await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.close_socket(1000, "connect failed").await;
                self.transition_to_disconnected();
                self.observer.on_disconnect(Some(&err));
                Err(err)
            }
        }
    }

    async fn user_disconnect(&mut self) -> BridgeResult<()> {
        self.user_cancelled = true;

        if matches!(self.state, ConnectionState::Disconnected) && self.socket.is_none() {
            return Ok(());
        }

        self.close_socket(1000, "").await;
        self.transition_to_disconnected();
        self.observer.on_disconnect(None);
        Ok(())
    }

    async fn pause(&mut self) -> BridgeResult<()> {
        if !matches!(self.state, ConnectionState::Connected) {
            return Ok(());
        }

        self.close_socket(CLOSE_CODE_PAUSE, "going away").await;
        self.subscriptions.reset();
        self.handshake_deadline = None;
        self.set_state(ConnectionState::Paused);
        Ok(())
    }

    async fn approve_session(&mut self, mut params: SessionParams) -> BridgeResult<()> {
        if !self.handshake.pending() {
            return Err(BridgeError::SessionInvalid);
        }

        // Fill in our identity when the caller left it out.
        if params.peer_id.is_none() {
            params.peer_id = Some(self.client_id.clone());
        }
        if params.peer_meta.is_none() {
            params.peer_meta = self.client_meta.clone();
        }

        let response = JsonRpcResponse::new(self.handshake.handshake_id, params);
        // The handshake id stays known so late peer messages can still be
        // correlated against it.
        self.encrypt_and_send(response.to_json()).await
    }

    async fn reject_session(&mut self, message: &str) -> BridgeResult<()> {
        if !self.handshake.pending() {
            return Err(BridgeError::SessionInvalid);
        }

        let response =
            JsonRpcErrorResponse::new(self.handshake.handshake_id, ERROR_CODE_INTERNAL, message);
        self.encrypt_and_send(response.to_json()).await
    }

    async fn update_session(&mut self, params: SessionParams, method: &str) -> BridgeResult<()> {
        if !matches!(self.state, ConnectionState::Connected) {
            return Err(BridgeError::Transport(tungstenite::Error::ConnectionClosed));
        }

        let request = JsonRpcRequest::new(method, vec![params]);
        self.encrypt_and_send(request.to_json()).await
    }

    async fn kill_session(&mut self, method: &str) -> BridgeResult<()> {
        let request = JsonRpcRequest::new(method, vec![SessionParams::kill()]);
        let sent = self.encrypt_and_send(request.to_json()).await;

        self.user_cancelled = true;
        self.observer.on_session_killed();
        self.close_socket(1000, "session killed").await;
        self.transition_to_disconnected();
        self.observer.on_disconnect(None);
        sent
    }

    // -- Socket events ------------------------------------------------------

    async fn handle_socket_event(&mut self, event: SocketEvent) {
        match event {
            SocketEvent::Frame(frame) => self.handle_frame(frame).await,
            SocketEvent::TextPing => {
                if let Some(socket) = self.socket.as_mut() {
                    let _ = socket.pong_text().await;
                }
            }
            SocketEvent::Malformed(err) => self.observer.on_error(err),
            SocketEvent::Closed { code, reason } => self.socket_lost(code, reason, None).await,
            SocketEvent::Error(err) => {
                self.socket_lost(None, String::new(), Some(BridgeError::Transport(err)))
                    .await
            }
        }
    }

    async fn handle_frame(&mut self, frame: RelayFrame) {
        match frame.kind {
            FrameKind::Ack => self.observer.on_ack(AckMessage::from(&frame)),
            FrameKind::Sub => trace!(topic = %frame.topic, "ignoring inbound sub frame"),
            FrameKind::Pub => self.handle_publish(frame).await,
        }
    }

    async fn handle_publish(&mut self, frame: RelayFrame) {
        let envelope = match frame.envelope() {
            Ok(Some(envelope)) => envelope,
            Ok(None) => {
                self.observer.on_error(BridgeError::BadJsonRpcRequest(
                    "pub frame without payload".into(),
                ));
                return;
            }
            Err(err) => {
                self.observer.on_error(err);
                return;
            }
        };

        // Inbound failures from here on are surfaced and swallowed; an
        // adversary publishing garbage must not cost us the connection.
        let plaintext = match envelope::decrypt(&envelope, &self.session.key) {
            Ok(plaintext) => plaintext,
            Err(err) => {
                self.observer.on_error(err);
                return;
            }
        };

        let request: Value = match serde_json::from_slice(&plaintext) {
            Ok(value) => value,
            Err(err) => {
                self.observer.on_error(err.into());
                return;
            }
        };

        let id = request.get("id").and_then(Value::as_i64);
        let method = request
            .get("method")
            .and_then(Value::as_str)
            .map(str::to_owned);
        let timestamp = frame.timestamp;

        match method {
            Some(method) => match BridgeEvent::from_method(&method) {
                Some(event) => self.handle_event(event, id, request, timestamp).await,
                None => match id {
                    Some(id) => self.observer.on_custom_request(id, request, timestamp),
                    None => trace!(%method, "dropping unknown method without id"),
                },
            },
            None => match id {
                Some(id) => self.observer.on_custom_request(id, request, timestamp),
                None => trace!("dropping payload without method or id"),
            },
        }
    }

    async fn handle_event(
        &mut self,
        event: BridgeEvent,
        id: Option<i64>,
        request: Value,
        timestamp: Option<u64>,
    ) {
        match event {
            BridgeEvent::SessionRequest => {
                let Some(id) = id else {
                    self.observer.on_error(BridgeError::BadJsonRpcRequest(
                        "session request without id".into(),
                    ));
                    return;
                };
                let params: SessionRequestParams = match first_param(&request) {
                    Ok(params) => params,
                    Err(err) => {
                        self.observer.on_error(err);
                        return;
                    }
                };

                debug!(id, peer_id = %params.peer_id, "session request received");
                self.handshake.handshake_id = id;
                self.handshake_deadline = None;

                // ACKs for our responses arrive addressed to the peer's id.
                let info = PeerInfo {
                    peer_id: params.peer_id.clone(),
                    peer_meta: params.peer_meta.clone(),
                    chain_type: params.chain_type.clone(),
                    address_required_coin_types: params.address_required_coin_types.clone(),
                };
                if let Err(err) = self.set_peer(info).await {
                    self.observer.on_error(err);
                }
                self.observer.on_session_request(id, params);
            }
            BridgeEvent::SessionUpdate => {
                let params: SessionParams = match first_param(&request) {
                    Ok(params) => params,
                    Err(err) => {
                        self.observer.on_error(err);
                        return;
                    }
                };
                if !params.approved {
                    self.peer_killed().await;
                }
            }
            BridgeEvent::KillSession => self.peer_killed().await,
            BridgeEvent::InstantRequest => match id {
                Some(id) => self.observer.on_custom_request(id, request, timestamp),
                None => self.observer.on_error(BridgeError::BadJsonRpcRequest(
                    "instant request without id".into(),
                )),
            },
            chain_event => {
                let Some(id) = id else {
                    self.observer.on_error(BridgeError::BadJsonRpcRequest(
                        "chain request without id".into(),
                    ));
                    return;
                };
                if let Err(err) = self.router.dispatch(chain_event, id, &request, timestamp) {
                    self.observer.on_error(err);
                }
            }
        }
    }

    /// The peer tore the session down (`approved=false` update or the
    /// extension's kill method).
    async fn peer_killed(&mut self) {
        self.user_cancelled = true;
        self.observer.on_session_killed();
        self.close_socket(1000, "session killed by peer").await;
        self.transition_to_disconnected();
        self.observer.on_disconnect(None);
    }

    async fn handshake_timed_out(&mut self) {
        self.handshake_deadline = None;
        warn!(
            topic = %self.session.topic,
            "no session request within the handshake window"
        );
        self.close_socket(1000, "handshake timeout").await;
        self.transition_to_disconnected();
        self.observer
            .on_disconnect(Some(&BridgeError::SessionRequestTimeout));
    }

    async fn socket_lost(
        &mut self,
        close_code: Option<u16>,
        reason: String,
        error: Option<BridgeError>,
    ) {
        self.socket = None;
        self.socket_events = None;

        // The close echo after pause() is not a loss.
        if matches!(self.state, ConnectionState::Paused) {
            return;
        }

        let fatal = close_code == Some(CLOSE_CODE_SECURITY);
        let error = if fatal {
            Some(BridgeError::Security(format!(
                "relay closed with code {CLOSE_CODE_SECURITY}: {reason}"
            )))
        } else {
            error
        };

        self.transition_to_disconnected();
        self.observer.on_disconnect(error.as_ref());

        if fatal || self.user_cancelled || !self.config.reconnect.enabled {
            return;
        }

        let mut last_error = error;
        while self.reconnect_attempts < self.config.reconnect.max_attempts {
            self.reconnect_attempts += 1;
            debug!(attempt = self.reconnect_attempts, "reconnecting to relay");
            tokio::time::sleep(self.config.reconnect.delay).await;

            match self.open_socket().await {
                Ok(()) => {
                    self.reconnect_attempts = 0;
                    return;
                }
                Err(err) => {
                    self.close_socket(1000, "reconnect failed").await;
                    self.transition_to_disconnected();
                    last_error = Some(err);
                }
            }
        }

        if let Some(err) = last_error {
            self.observer.on_disconnect(Some(&err));
        }
    }

    // -- Plumbing -----------------------------------------------------------

    async fn open_socket(&mut self) -> BridgeResult<()> {
        self.set_state(ConnectionState::Connecting);

        let (socket, events) =
            RelaySocket::connect(&self.session.bridge, self.config.connect_timeout).await?;
        self.socket = Some(socket);
        self.socket_events = Some(events);
        self.set_state(ConnectionState::Connected);

        self.subscribe(self.session.topic.clone()).await?;
        self.subscribe(self.client_id.clone()).await?;

        if let Some(topic) = self.handshake.peer_topic() {
            // Resumed from pause: the peer is already known, keep
            // listening on its topic.
            self.subscribe(topic).await?;
            self.handshake_deadline = None;
        } else {
            let resumed = self
                .store
                .as_ref()
                .and_then(|store| store.load(&self.session.topic))
                .filter(|stored| stored.session == *self.session);

            match resumed {
                Some(stored) => {
                    debug!(peer_id = %stored.peer_id, "resuming persisted session");
                    self.set_peer(PeerInfo {
                        peer_id: stored.peer_id,
                        peer_meta: stored.peer_meta,
                        chain_type: None,
                        address_required_coin_types: None,
                    })
                    .await?;
                    self.handshake_deadline = None;
                }
                // A brand-new pairing gets the handshake watchdog.
                None => {
                    self.handshake_deadline =
                        Some(Instant::now() + self.config.session_request_timeout);
                }
            }
        }

        self.observer.on_connected();
        Ok(())
    }

    /// Records the peer identity and subscribes to its topic.
    async fn set_peer(&mut self, info: PeerInfo) -> BridgeResult<()> {
        let topic = info.peer_id.clone();
        self.handshake.peer = Some(info);
        let _ = self.peer_tx.send(self.handshake.peer.clone());
        self.subscribe(topic).await
    }

    /// Idempotent subscribe: at most one `sub` frame per topic per
    /// connection. The registry lock is released before any I/O.
    async fn subscribe(&mut self, topic: String) -> BridgeResult<()> {
        if !self.subscriptions.insert(&topic) {
            return Ok(());
        }
        let frame = RelayFrame::subscribe(topic);
        self.send_frame(&frame).await
    }

    /// JSON payload -> envelope -> `pub` frame -> socket, addressed to the
    /// peer when known, else to the session topic.
    async fn encrypt_and_send(&mut self, payload: String) -> BridgeResult<()> {
        let envelope = envelope::encrypt(payload.as_bytes(), &self.session.key);
        let topic = self
            .handshake
            .peer_topic()
            .unwrap_or_else(|| self.session.topic.clone());
        let frame = RelayFrame::publish(topic, &envelope);
        self.send_frame(&frame).await
    }

    async fn send_frame(&mut self, frame: &RelayFrame) -> BridgeResult<()> {
        match self.socket.as_mut() {
            Some(socket) => socket.send_frame(frame, self.config.send_timeout).await,
            None => Err(BridgeError::Transport(tungstenite::Error::ConnectionClosed)),
        }
    }

    async fn close_socket(&mut self, code: u16, reason: &str) {
        if let Some(mut socket) = self.socket.take() {
            let _ = socket.close(code, reason).await;
        }
        self.socket_events = None;
    }

    /// The single exit into `Disconnected`: timers die, the subscription
    /// set clears, the handshake resets. Callers decide whether and with
    /// what to fire `on_disconnect`.
    fn transition_to_disconnected(&mut self) {
        self.handshake_deadline = None;
        self.subscriptions.reset();
        self.handshake.reset();
        let _ = self.peer_tx.send(None);
        self.set_state(ConnectionState::Disconnected);
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            trace!(from = ?self.state, to = ?state, "state transition");
        }
        self.state = state;
        let _ = self.state_tx.send(state);
    }
}

// ---------------------------------------------------------------------------
// Select helpers
// ---------------------------------------------------------------------------

/// Receives from the socket event channel, or parks forever when no socket
/// is attached.
async fn next_event(events: &mut Option<mpsc::Receiver<SocketEvent>>) -> Option<SocketEvent> {
    match events {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}

/// Sleeps until the handshake deadline, or parks forever when none is
/// armed.
async fn deadline_expired(deadline: &Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(*at).await,
        None => std::future::pending().await,
    }
}
