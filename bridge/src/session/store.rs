//! Session persistence contract.
//!
//! The core consults a [`SessionStore`] at connect time to decide whether a
//! pairing is brand new (arm the handshake watchdog) or resumed (restore the
//! peer identity and skip the watchdog). Writing entries back after a
//! successful handshake is the application's responsibility — typically from
//! its `on_session_request` approval path.
//!
//! The crate ships [`MemorySessionStore`], an in-process map used by the
//! demo wallet and the test suite. Real deployments back this trait with the
//! platform keystore.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::{PeerMeta, Session};

/// One persisted pairing: the session descriptor plus the peer identity
/// learned during the handshake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub session: Session,
    pub peer_id: String,
    pub peer_meta: PeerMeta,
}

/// Contract the interactor consumes from the persistence collaborator.
///
/// Implementations must be cheap to call from the interactor's actor task;
/// anything slower than a map lookup should cache.
pub trait SessionStore: Send + Sync {
    /// Look up a pairing by relay topic.
    fn load(&self, topic: &str) -> Option<StoredSession>;

    /// Persist (or overwrite) a pairing.
    fn store(&self, entry: StoredSession);

    /// Forget a pairing, e.g. after `kill_session`.
    fn remove(&self, topic: &str);
}

// ---------------------------------------------------------------------------
// In-memory reference implementation
// ---------------------------------------------------------------------------

/// Map-backed [`SessionStore`] with no persistence across process restarts.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: RwLock<HashMap<String, StoredSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, topic: &str) -> Option<StoredSession> {
        self.entries.read().get(topic).cloned()
    }

    fn store(&self, entry: StoredSession) {
        self.entries
            .write()
            .insert(entry.session.topic.clone(), entry);
    }

    fn remove(&self, topic: &str) {
        self.entries.write().remove(topic);
    }
}
