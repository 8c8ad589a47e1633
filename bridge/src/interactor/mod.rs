//! # Session Interactor
//!
//! The protocol state machine. One [`Interactor`] owns one relay
//! connection, its subscription set, the pairing handshake context, and all
//! timers. Internally it is a single actor task driving a `select` loop
//! over (socket events, user commands, heartbeat, handshake deadline) — the
//! public methods below are thin command senders with per-call completion
//! channels, safe to invoke from any task.
//!
//! Lifecycle:
//!
//! ```text
//! disconnected --connect()--> connecting --socket up--> connected
//!      ^                          |                        |
//!      |                      error/timeout            pause() -> paused
//!      +--------------------------+-----------------------+   (resume())
//! ```
//!
//! On reaching `connected` the interactor subscribes to the session topic
//! and its own client id, consults the session store, and — for a brand-new
//! pairing — arms the handshake watchdog. Inbound `pub` frames are
//! decrypted, parsed as JSON-RPC, and routed: session methods are consumed
//! here, chain methods go to the [`ChainRouter`], anything else becomes a
//! custom request.

mod actor;
mod subscriptions;

pub use subscriptions::SubscriptionRegistry;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use uuid::Uuid;

use crate::callbacks::{NullObserver, SessionObserver};
use crate::chains::ChainRouter;
use crate::config;
use crate::error::{BridgeError, BridgeResult};
use crate::session::{PeerMeta, Session, SessionParams, SessionStore};

// ---------------------------------------------------------------------------
// Connection state
// ---------------------------------------------------------------------------

/// Externally observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Paused,
}

/// Peer identity learned from the pairing handshake (or restored from the
/// session store). Cleared on every disconnect.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerInfo {
    pub peer_id: String,
    pub peer_meta: PeerMeta,
    pub chain_type: Option<String>,
    pub address_required_coin_types: Option<Vec<u32>>,
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Automatic reconnect policy for non-fatal socket drops. Disabled by
/// default; deployments that want it flip `enabled`.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    pub delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            delay: config::RECONNECT_DELAY,
            max_attempts: config::MAX_RECONNECT_ATTEMPTS,
        }
    }
}

/// Timing knobs for the interactor. Defaults mirror the protocol constants;
/// tests compress them.
#[derive(Debug, Clone)]
pub struct InteractorConfig {
    pub session_request_timeout: Duration,
    pub connect_timeout: Duration,
    pub send_timeout: Duration,
    pub ping_interval: Duration,
    pub reconnect: ReconnectPolicy,
}

impl Default for InteractorConfig {
    fn default() -> Self {
        Self {
            session_request_timeout: config::SESSION_REQUEST_TIMEOUT,
            connect_timeout: config::CONNECT_TIMEOUT,
            send_timeout: config::SEND_TIMEOUT,
            ping_interval: config::PING_INTERVAL,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// Everything the interactor is constructed with besides the session.
pub struct InteractorOptions {
    pub config: InteractorConfig,
    /// Our topic on the relay. Defaults to a fresh UUIDv4.
    pub client_id: Option<String>,
    /// Our metadata, echoed back in session approvals.
    pub client_meta: Option<PeerMeta>,
    pub observer: Arc<dyn SessionObserver>,
    pub store: Option<Arc<dyn SessionStore>>,
    pub router: ChainRouter,
}

impl Default for InteractorOptions {
    fn default() -> Self {
        Self {
            config: InteractorConfig::default(),
            client_id: None,
            client_meta: None,
            observer: Arc::new(NullObserver),
            store: None,
            router: ChainRouter::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

type Done = oneshot::Sender<BridgeResult<()>>;

pub(crate) enum Command {
    Connect(Done),
    Disconnect(Done),
    Pause(Done),
    ApproveSession { params: SessionParams, done: Done },
    RejectSession { message: String, done: Done },
    UpdateSession { params: SessionParams, method: String, done: Done },
    KillSession { method: String, done: Done },
    ApproveRequest { id: i64, result: Value, done: Done },
    RejectRequest { id: i64, code: i64, message: String, done: Done },
}

// ---------------------------------------------------------------------------
// Interactor handle
// ---------------------------------------------------------------------------

/// Public handle to one bridge session. Cheap to share behind `Arc`; all
/// methods take `&self`.
pub struct Interactor {
    session: Arc<Session>,
    client_id: String,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    peer: watch::Receiver<Option<PeerInfo>>,
    actor: tokio::task::JoinHandle<()>,
}

impl Interactor {
    /// Builds the interactor and spawns its actor task. The connection is
    /// not opened until [`connect`](Self::connect).
    pub fn new(session: Session, options: InteractorOptions) -> Self {
        let session = Arc::new(session);
        let client_id = options
            .client_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (peer_tx, peer_rx) = watch::channel(None);

        let actor = actor::Actor::new(
            Arc::clone(&session),
            client_id.clone(),
            options.client_meta,
            options.config,
            options.observer,
            options.router,
            options.store,
            state_tx,
            peer_tx,
            command_rx,
        );
        let handle = tokio::spawn(actor.run());

        Self {
            session,
            client_id,
            commands: command_tx,
            state: state_rx,
            peer: peer_rx,
            actor: handle,
        }
    }

    /// The pairing this interactor serves.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Our relay topic. ACKs and direct messages arrive here.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// The peer identity, once a session request has been received or a
    /// persisted session restored.
    pub fn peer(&self) -> Option<PeerInfo> {
        self.peer.borrow().clone()
    }

    /// Opens the relay connection, subscribes, and consults the session
    /// store. Resolves once connected.
    ///
    /// # Errors
    ///
    /// [`BridgeError::SessionRequestTimeout`] when the connect watchdog
    /// expires, [`BridgeError::Transport`] for dial failures.
    pub async fn connect(&self) -> BridgeResult<()> {
        self.send(Command::Connect).await
    }

    /// Closes the connection with "going away" (1001). Resume with
    /// [`resume`](Self::resume).
    pub async fn pause(&self) -> BridgeResult<()> {
        self.send(Command::Pause).await
    }

    /// Reopens a paused connection. Identical to [`connect`](Self::connect).
    pub async fn resume(&self) -> BridgeResult<()> {
        self.send(Command::Connect).await
    }

    /// User-initiated teardown. Cancels every timer, clears subscriptions,
    /// and never reconnects. Idempotent.
    pub async fn disconnect(&self) -> BridgeResult<()> {
        self.send(Command::Disconnect).await
    }

    /// Answers the pending `wc_sessionRequest` positively.
    ///
    /// # Errors
    ///
    /// [`BridgeError::SessionInvalid`] when no handshake is pending.
    pub async fn approve_session(&self, params: SessionParams) -> BridgeResult<()> {
        self.send(|done| Command::ApproveSession { params, done })
            .await
    }

    /// Answers the pending `wc_sessionRequest` with an error response
    /// (code −32000).
    ///
    /// # Errors
    ///
    /// [`BridgeError::SessionInvalid`] when no handshake is pending.
    pub async fn reject_session(&self, message: impl Into<String>) -> BridgeResult<()> {
        let message = message.into();
        self.send(|done| Command::RejectSession { message, done })
            .await
    }

    /// Sends a session update request under the given method
    /// (`wc_sessionUpdate` or its extension alias).
    pub async fn update_session(
        &self,
        params: SessionParams,
        method: impl Into<String>,
    ) -> BridgeResult<()> {
        let method = method.into();
        self.send(|done| Command::UpdateSession {
            params,
            method,
            done,
        })
        .await
    }

    /// Tears the session down: sends the `approved=false` update, fires
    /// `on_session_killed`, and disconnects.
    pub async fn kill_session(&self, method: impl Into<String>) -> BridgeResult<()> {
        let method = method.into();
        self.send(|done| Command::KillSession { method, done }).await
    }

    /// Responds to a chain or custom request with a result.
    pub async fn approve_request(&self, id: i64, result: Value) -> BridgeResult<()> {
        self.send(|done| Command::ApproveRequest { id, result, done })
            .await
    }

    /// Rejects a chain or custom request on the user's behalf
    /// (EIP-1193 code 4001).
    pub async fn reject_request(&self, id: i64, message: impl Into<String>) -> BridgeResult<()> {
        self.reject_request_with_code(id, config::ERROR_CODE_USER_REJECTED, message)
            .await
    }

    /// Rejects a request with an explicit error code; internal failures use
    /// −32000.
    pub async fn reject_request_with_code(
        &self,
        id: i64,
        code: i64,
        message: impl Into<String>,
    ) -> BridgeResult<()> {
        let message = message.into();
        self.send(|done| Command::RejectRequest {
            id,
            code,
            message,
            done,
        })
        .await
    }

    async fn send<F>(&self, build: F) -> BridgeResult<()>
    where
        F: FnOnce(Done) -> Command,
    {
        let (done_tx, done_rx) = oneshot::channel();
        self.commands
            .send(build(done_tx))
            .map_err(|_| BridgeError::Unknown)?;
        done_rx.await.map_err(|_| BridgeError::Unknown)?
    }
}

impl Drop for Interactor {
    fn drop(&mut self) {
        self.actor.abort();
    }
}
