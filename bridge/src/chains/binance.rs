//! Binance Chain request decoding.
//!
//! `bnb_sign` carries the Binance DEX sign-doc: snake_case string fields
//! plus the raw `msgs` array, which stays opaque JSON — the wallet's signer
//! consumes it untouched so the signed bytes match what the peer hashed.
//! `bnb_tx_confirmation` arrives after the peer broadcast the signed
//! transaction and reports the outcome.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BridgeError, BridgeResult};
use crate::events::BridgeEvent;
use crate::rpc::first_param;

/// The Binance DEX standard sign-doc, exactly as hashed by the peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinanceOrder {
    pub account_number: String,
    pub chain_id: String,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub memo: Option<String>,
    pub sequence: String,
    pub source: String,
    pub msgs: Vec<Value>,
}

/// Post-broadcast confirmation for a previously signed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinanceTxConfirmation {
    pub ok: bool,
    #[serde(default, rename = "errorMsg", skip_serializing_if = "Option::is_none")]
    pub error_msg: Option<String>,
}

type SignCallback = Box<dyn Fn(i64, BinanceOrder) + Send + Sync>;
type ConfirmCallback = Box<dyn Fn(i64, BinanceTxConfirmation, Option<u64>) + Send + Sync>;

/// Stateless decoder for Binance Chain requests.
#[derive(Default)]
pub struct BinanceHandler {
    on_sign: Option<SignCallback>,
    on_confirm: Option<ConfirmCallback>,
}

impl BinanceHandler {
    pub fn on_sign(&mut self, callback: impl Fn(i64, BinanceOrder) + Send + Sync + 'static) {
        self.on_sign = Some(Box::new(callback));
    }

    pub fn on_confirm(
        &mut self,
        callback: impl Fn(i64, BinanceTxConfirmation, Option<u64>) + Send + Sync + 'static,
    ) {
        self.on_confirm = Some(Box::new(callback));
    }

    pub(crate) fn handle(
        &self,
        event: BridgeEvent,
        id: i64,
        request: &Value,
        timestamp: Option<u64>,
    ) -> BridgeResult<()> {
        match event {
            BridgeEvent::BnbSign => {
                let order: BinanceOrder = first_param(request)?;
                if let Some(callback) = &self.on_sign {
                    callback(id, order);
                } else {
                    tracing::debug!(id, "no bnb sign callback attached, request ignored");
                }
                Ok(())
            }
            BridgeEvent::BnbTransactionConfirm => {
                let confirmation: BinanceTxConfirmation = first_param(request)?;
                if let Some(callback) = &self.on_confirm {
                    callback(id, confirmation, timestamp);
                } else {
                    tracing::debug!(id, "no bnb confirm callback attached, request ignored");
                }
                Ok(())
            }
            other => Err(BridgeError::BadJsonRpcRequest(format!(
                "{other:?} is not a Binance event"
            ))),
        }
    }
}
