//! Observer surface.
//!
//! The application hands the interactor one [`SessionObserver`] trait object
//! at construction time. Every method has a no-op default, so an observer
//! implements exactly the callbacks it cares about. The interactor treats
//! the observer as a borrowed surface: it is dropped together with the
//! interactor and never cloned out of it.
//!
//! Per-chain signing callbacks live on the chain handlers themselves — see
//! [`crate::chains`].

use serde_json::Value;

use crate::error::BridgeError;
use crate::relay::AckMessage;
use crate::session::SessionRequestParams;

/// Session-level lifecycle callbacks.
///
/// Callbacks are invoked from the interactor's actor task. They must return
/// quickly; anything slow belongs on the application's own executor.
pub trait SessionObserver: Send + Sync {
    /// The relay connection reached the connected state.
    fn on_connected(&self) {}

    /// The connection is gone. `error` is `None` for user-initiated
    /// disconnects and borrows the cause otherwise.
    fn on_disconnect(&self, _error: Option<&BridgeError>) {}

    /// The peer opened the pairing handshake. Answer with
    /// `approve_session` or `reject_session`.
    fn on_session_request(&self, _id: i64, _params: SessionRequestParams) {}

    /// The peer (or the wallet itself) tore the session down.
    fn on_session_killed(&self) {}

    /// A request whose method has no built-in handler. Answer with
    /// `approve_request` or `reject_request`.
    fn on_custom_request(&self, _id: i64, _request: Value, _timestamp: Option<u64>) {}

    /// A non-fatal inbound failure (decode, decrypt, integrity). The
    /// connection stays open.
    fn on_error(&self, _error: BridgeError) {}

    /// Relay-level delivery acknowledgement for a published frame.
    fn on_ack(&self, _ack: AckMessage) {}
}

/// Observer that ignores everything. The default when the application only
/// drives the interactor imperatively.
pub struct NullObserver;

impl SessionObserver for NullObserver {}
