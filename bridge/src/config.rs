//! # Protocol Constants
//!
//! Every magic number of the bridge protocol lives here: timing windows,
//! WebSocket close codes, JSON-RPC error codes, and envelope geometry.
//! The interactor reads its defaults from this module; tests override the
//! timing values through [`crate::interactor::InteractorConfig`].

use std::time::Duration;

// ---------------------------------------------------------------------------
// Envelope Geometry
// ---------------------------------------------------------------------------

/// AES-256-CBC key length in bytes. The pairing key decoded from the URI
/// must be exactly this long.
pub const SESSION_KEY_LENGTH: usize = 32;

/// CBC initialization vector length in bytes. One AES block.
pub const ENVELOPE_IV_LENGTH: usize = 16;

/// HMAC-SHA256 tag length in bytes.
pub const ENVELOPE_HMAC_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// Timing Windows
// ---------------------------------------------------------------------------

/// How long a freshly paired session waits for the peer's `wc_sessionRequest`
/// before giving up. Resumed sessions (store hit) skip this watchdog.
pub const SESSION_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// How long `connect()` waits for the socket to reach the connected state.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Per-send watchdog on the socket write.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Heartbeat interval while connected. The relay drops idle connections,
/// so both a WebSocket ping and the legacy `"ping"` text frame are serviced.
pub const PING_INTERVAL: Duration = Duration::from_secs(15);

/// Delay between reconnect attempts when the reconnect policy is enabled.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(500);

/// Maximum reconnect attempts before surfacing the last error.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 3;

// ---------------------------------------------------------------------------
// WebSocket Close Codes
// ---------------------------------------------------------------------------

/// "Going away" — sent when the application pauses the session (backgrounded
/// app). The peer treats this as a resumable disconnect.
pub const CLOSE_CODE_PAUSE: u16 = 1001;

/// Relay-specific fatal close: too many messages on the topic, or the relay
/// flagged the connection for a security reason. Never reconnect after it.
pub const CLOSE_CODE_SECURITY: u16 = 4022;

// ---------------------------------------------------------------------------
// JSON-RPC
// ---------------------------------------------------------------------------

/// The only JSON-RPC version on the wire.
pub const JSONRPC_VERSION: &str = "2.0";

/// EIP-1193 user-rejection code, used when the wallet owner declines a
/// request.
pub const ERROR_CODE_USER_REJECTED: i64 = 4001;

/// Generic server error, used for internal rejections such as declining the
/// session handshake itself.
pub const ERROR_CODE_INTERNAL: i64 = -32000;

/// Sentinel for "no pending handshake". A real handshake id is always a
/// positive JSON-RPC id.
pub const NO_HANDSHAKE: i64 = -1;
