//! # Bridge Session Identity
//!
//! A [`Session`] is the immutable identity of one pairing: the relay topic,
//! the bridge URL, and the 32-byte symmetric key both endpoints derived
//! out-of-band (usually from a QR code). It is created once by the URI
//! parser and shared read-only for the lifetime of the interactor.
//!
//! [`PeerMeta`] is the human-facing description of the remote endpoint,
//! learned during the pairing handshake and shown to the user in the
//! approval prompt.

mod uri;

pub mod store;

pub use store::{MemorySessionStore, SessionStore, StoredSession};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::SESSION_KEY_LENGTH;
use crate::error::{BridgeError, BridgeResult};
use crate::rpc::ChainId;

// ---------------------------------------------------------------------------
// Session Source
// ---------------------------------------------------------------------------

/// Which URI scheme the pairing came from.
///
/// `CWE:` URIs are produced by the Crypto.com browser-extension variant and
/// carry extension aliases for the session methods (`dc_sessionRequest`
/// instead of `wc_sessionRequest`). Everything else about the wire protocol
/// is identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionSource {
    Wc,
    Cwe,
    Unknown,
}

// ---------------------------------------------------------------------------
// Peer Metadata
// ---------------------------------------------------------------------------

/// Metadata describing the remote peer (dApp or extension), set once at
/// handshake time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerMeta {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub icons: Vec<String>,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Immutable pairing descriptor decoded from a `wc:`/`CWE:` URI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Relay topic the peer publishes the handshake on. Usually a UUID.
    pub topic: String,
    /// Protocol version string from the URI ("1" for v1 bridges).
    pub version: String,
    /// Bridge relay URL. Absolute `https`/`wss` when parsed from a URI.
    pub bridge: Url,
    /// 32-byte symmetric envelope key shared out-of-band.
    #[serde(with = "hex_key")]
    pub key: [u8; SESSION_KEY_LENGTH],
    /// `version` parsed as a float, defaulting to 1.0.
    pub numerical_version: f64,
    /// Which scheme produced this session.
    pub source: SessionSource,
    /// Set when the URI carried `role=extension`.
    pub is_extension: bool,
}

impl Session {
    /// Parse a pairing URI into a session descriptor.
    ///
    /// Accepts the raw `wc:`/`CWE:` form and a once-percent-encoded form
    /// (deep links routinely arrive encoded):
    ///
    /// ```text
    /// wc:<topic>@<version>?bridge=<url>&key=<64 hex chars>[&role=extension]
    /// ```
    ///
    /// # Errors
    ///
    /// [`BridgeError::InvalidUri`] when the scheme is unknown, required
    /// query keys are missing, the bridge URL is not absolute https/wss,
    /// or the key does not decode to exactly 32 bytes.
    pub fn from_uri(input: &str) -> BridgeResult<Self> {
        uri::parse(input)
    }
}

// ---------------------------------------------------------------------------
// Handshake payloads
// ---------------------------------------------------------------------------

/// Param object of an inbound `wc_sessionRequest` / `dc_sessionRequest`.
///
/// Everything beyond the peer identity is advisory: `chain_id` proposes a
/// default chain, `chain_type` and `address_required_coin_types` are
/// extension hints telling the wallet which address families to offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequestParams {
    pub peer_id: String,
    pub peer_meta: PeerMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<ChainId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_required_coin_types: Option<Vec<u32>>,
}

/// Param object sent by the wallet when approving, updating, or killing a
/// session.
///
/// `chain_id` and `accounts` serialize as explicit `null` when absent — the
/// kill payload on the wire is `{"approved":false,"chainId":null,
/// "accounts":null}` and peers match on that shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionParams {
    pub approved: bool,
    #[serde(default)]
    pub chain_id: Option<ChainId>,
    #[serde(default)]
    pub accounts: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_meta: Option<PeerMeta>,
}

impl SessionParams {
    /// Approval payload carrying the wallet's identity and accounts.
    pub fn approval(
        chain_id: ChainId,
        accounts: Vec<String>,
        peer_id: String,
        peer_meta: Option<PeerMeta>,
    ) -> Self {
        Self {
            approved: true,
            chain_id: Some(chain_id),
            accounts: Some(accounts),
            peer_id: Some(peer_id),
            peer_meta,
        }
    }

    /// The teardown payload: `approved=false`, everything else null.
    pub fn kill() -> Self {
        Self {
            approved: false,
            chain_id: None,
            accounts: None,
            peer_id: None,
            peer_meta: None,
        }
    }
}

/// Hex (de)serialization for the fixed-size session key.
mod hex_key {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::config::SESSION_KEY_LENGTH;

    pub fn serialize<S: Serializer>(
        key: &[u8; SESSION_KEY_LENGTH],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(key))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<[u8; SESSION_KEY_LENGTH], D::Error> {
        let text = String::deserialize(deserializer)?;
        let bytes = hex::decode(&text).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("session key must be 32 bytes"))
    }
}

/// Validates a decoded key slice into the fixed-size session key.
pub(crate) fn key_from_slice(bytes: &[u8]) -> BridgeResult<[u8; SESSION_KEY_LENGTH]> {
    bytes.try_into().map_err(|_| {
        BridgeError::InvalidUri(format!(
            "key must be {} bytes, got {}",
            SESSION_KEY_LENGTH,
            bytes.len()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_meta_uses_camel_case_on_the_wire() {
        let meta = PeerMeta {
            name: "Example DApp".into(),
            url: "https://dapp.example".into(),
            description: Some("test peer".into()),
            icons: vec!["https://dapp.example/icon.png".into()],
        };

        let json = serde_json::to_value(&meta).unwrap();
        assert!(json.get("icons").is_some());
        assert!(json.get("description").is_some());

        // Missing optional fields must not break decoding.
        let sparse: PeerMeta =
            serde_json::from_str(r#"{"name":"X","url":"https://x.example"}"#).unwrap();
        assert!(sparse.description.is_none());
        assert!(sparse.icons.is_empty());
    }

    #[test]
    fn kill_params_match_wire_shape_exactly() {
        let json = serde_json::to_string(&SessionParams::kill()).unwrap();
        assert_eq!(json, r#"{"approved":false,"chainId":null,"accounts":null}"#);
    }

    #[test]
    fn approval_params_carry_identity() {
        let params = SessionParams::approval(
            ChainId("1".into()),
            vec!["0xabc".into()],
            "client-1".into(),
            None,
        );
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["approved"], true);
        assert_eq!(json["chainId"], "1");
        assert_eq!(json["accounts"][0], "0xabc");
        assert_eq!(json["peerId"], "client-1");
        assert!(json.get("peerMeta").is_none());
    }

    #[test]
    fn session_request_params_accept_integer_chain_id() {
        let text = r#"{
            "peerId": "peer-9",
            "peerMeta": {"name": "DApp", "url": "https://dapp.example"},
            "chainId": 25,
            "chainType": "cosmos",
            "addressRequiredCoinTypes": [60, 118]
        }"#;

        let params: SessionRequestParams = serde_json::from_str(text).unwrap();
        assert_eq!(params.peer_id, "peer-9");
        assert_eq!(params.chain_id, Some(ChainId("25".into())));
        assert_eq!(params.chain_type.as_deref(), Some("cosmos"));
        assert_eq!(params.address_required_coin_types, Some(vec![60, 118]));
    }

    #[test]
    fn session_serde_roundtrip_preserves_key() {
        let session = Session {
            topic: "abc-123".into(),
            version: "1".into(),
            bridge: Url::parse("https://bridge.example/").unwrap(),
            key: [7u8; 32],
            numerical_version: 1.0,
            source: SessionSource::Wc,
            is_extension: false,
        };

        let json = serde_json::to_string(&session).unwrap();
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(back, session);
        assert!(json.contains(&hex::encode([7u8; 32])));
    }
}
