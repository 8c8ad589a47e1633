//! Ethereum request decoding.
//!
//! Two families: message signing and transactions. The parameter order of
//! the signing methods is a classic trap — `eth_sign` carries
//! `[address, data]` while `personal_sign` carries `[data, address]`, and
//! the typed-data variants carry `[address, typedDataJson]`. The decoder
//! normalizes all three into a [`SignPayload`] so the application never has
//! to care.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BridgeError, BridgeResult};
use crate::events::BridgeEvent;
use crate::rpc::params_array;

// ---------------------------------------------------------------------------
// Payload types
// ---------------------------------------------------------------------------

/// Which signing method produced a [`SignPayload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignKind {
    /// `eth_sign` — raw message hash signing.
    Message,
    /// `personal_sign` — EIP-191 prefixed message.
    Personal,
    /// `eth_signTypedData` and its `_v2`..`_v4` variants (EIP-712).
    TypedData,
}

/// A normalized signing request. `data` is kept as the raw string exactly as
/// the peer sent it — hex for messages, JSON for typed data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignPayload {
    pub id: i64,
    pub kind: SignKind,
    pub address: String,
    pub data: String,
}

/// Whether the wallet should only sign or sign-and-broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    Sign,
    Send,
}

/// The transaction object of `eth_signTransaction`/`eth_sendTransaction`.
/// All fields except `from` are optional hex-quantity strings; gas arrives
/// under both its historical names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EthereumTransaction {
    pub from: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

type SignCallback = Box<dyn Fn(SignPayload) + Send + Sync>;
type TransactionCallback =
    Box<dyn Fn(i64, TransactionKind, EthereumTransaction, Option<u64>) + Send + Sync>;

/// Stateless decoder for Ethereum requests. Owns only its callbacks.
#[derive(Default)]
pub struct EthereumHandler {
    on_sign: Option<SignCallback>,
    on_transaction: Option<TransactionCallback>,
}

impl EthereumHandler {
    pub fn on_sign(&mut self, callback: impl Fn(SignPayload) + Send + Sync + 'static) {
        self.on_sign = Some(Box::new(callback));
    }

    pub fn on_transaction(
        &mut self,
        callback: impl Fn(i64, TransactionKind, EthereumTransaction, Option<u64>) + Send + Sync + 'static,
    ) {
        self.on_transaction = Some(Box::new(callback));
    }

    pub(crate) fn handle(
        &self,
        event: BridgeEvent,
        id: i64,
        request: &Value,
        timestamp: Option<u64>,
    ) -> BridgeResult<()> {
        match event {
            BridgeEvent::EthSign | BridgeEvent::PersonalSign | BridgeEvent::SignTypedData => {
                let payload = decode_sign(event, id, request)?;
                if let Some(callback) = &self.on_sign {
                    callback(payload);
                } else {
                    tracing::debug!(id, "no sign callback attached, request ignored");
                }
                Ok(())
            }
            BridgeEvent::EthSignTransaction | BridgeEvent::EthSendTransaction => {
                let transaction = decode_transaction(request)?;
                let kind = if event == BridgeEvent::EthSignTransaction {
                    TransactionKind::Sign
                } else {
                    TransactionKind::Send
                };
                if let Some(callback) = &self.on_transaction {
                    callback(id, kind, transaction, timestamp);
                } else {
                    tracing::debug!(id, "no transaction callback attached, request ignored");
                }
                Ok(())
            }
            other => Err(BridgeError::BadJsonRpcRequest(format!(
                "{other:?} is not an Ethereum event"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Decoders
// ---------------------------------------------------------------------------

fn decode_sign(event: BridgeEvent, id: i64, request: &Value) -> BridgeResult<SignPayload> {
    let params = params_array(request)?;
    let (first, second) = match (params.first(), params.get(1)) {
        (Some(a), Some(b)) => (as_string(a)?, as_string(b)?),
        _ => {
            return Err(BridgeError::BadJsonRpcRequest(
                "sign request needs two string params".into(),
            ))
        }
    };

    // personal_sign puts the message first; everything else leads with the
    // address.
    let (kind, address, data) = match event {
        BridgeEvent::PersonalSign => (SignKind::Personal, second, first),
        BridgeEvent::EthSign => (SignKind::Message, first, second),
        BridgeEvent::SignTypedData => (SignKind::TypedData, first, second),
        _ => unreachable!("decode_sign only sees signing events"),
    };

    Ok(SignPayload {
        id,
        kind,
        address,
        data,
    })
}

fn decode_transaction(request: &Value) -> BridgeResult<EthereumTransaction> {
    let params = params_array(request)?;
    let first = params.first().ok_or_else(|| {
        BridgeError::BadJsonRpcRequest("transaction request has empty params".into())
    })?;
    Ok(serde_json::from_value(first.clone())?)
}

fn as_string(value: &Value) -> BridgeResult<String> {
    value
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| BridgeError::BadJsonRpcRequest("expected a string param".into()))
}
