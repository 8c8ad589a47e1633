//! Error taxonomy for the bridge client.
//!
//! Every fallible operation in this crate returns a [`BridgeError`]. The
//! variants are stable: applications match on them to decide whether a
//! failure is retryable (transport), fatal (security), or a peer problem
//! (bad request, integrity failure).

use thiserror::Error;

/// Errors raised by the bridge session client.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The pairing string could not be parsed into a session descriptor.
    #[error("invalid pairing URI: {0}")]
    InvalidUri(String),

    /// An inbound JSON-RPC payload was malformed or missing required params.
    #[error("bad JSON-RPC request: {0}")]
    BadJsonRpcRequest(String),

    /// `approve_session`/`reject_session` was called without a pending
    /// handshake to answer.
    #[error("no pending session handshake")]
    SessionInvalid,

    /// No `wc_sessionRequest` arrived within the handshake window, or a
    /// send/connect watchdog expired.
    #[error("session request timed out")]
    SessionRequestTimeout,

    /// Envelope integrity check failed. The ciphertext was tampered with or
    /// encrypted under a different key.
    #[error("envelope HMAC mismatch")]
    HmacMismatch,

    /// AES decryption or PKCS#7 unpadding failed after a valid HMAC.
    #[error("envelope decryption failed")]
    DecryptionFailed,

    /// The relay closed the connection for a security reason (close code
    /// 4022) or the session was cancelled unexpectedly.
    #[error("security: {0}")]
    Security(String),

    /// Wire-compatible alias for the relay's message-flood close.
    #[error("too many messages: {0}")]
    TooManyMessages(String),

    /// Error surfaced by the WebSocket transport.
    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// Last resort.
    #[error("unknown bridge error")]
    Unknown,
}

impl BridgeError {
    /// Whether the error permits an automatic reconnect attempt.
    ///
    /// Security closes and user-visible protocol failures never do; only
    /// transport-level failures are considered transient.
    pub fn is_transient(&self) -> bool {
        matches!(self, BridgeError::Transport(_))
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::BadJsonRpcRequest(err.to_string())
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;
