//! Cosmos / IBC transaction decoding.
//!
//! `cosmos_sendTransaction` carries `[{signerAddress, signDoc}]`. The sign
//! doc is chain-specific protobuf-in-JSON and stays opaque; only the signer
//! address is lifted out so the wallet can pick the right key.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BridgeError, BridgeResult};
use crate::events::BridgeEvent;
use crate::rpc::first_param;

/// A decoded IBC transaction request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IbcTransaction {
    pub signer_address: String,
    pub sign_doc: Value,
}

type TransactionCallback = Box<dyn Fn(i64, IbcTransaction, Option<u64>) + Send + Sync>;

/// Stateless decoder for Cosmos/IBC requests.
#[derive(Default)]
pub struct CosmosHandler {
    on_transaction: Option<TransactionCallback>,
}

impl CosmosHandler {
    pub fn on_transaction(
        &mut self,
        callback: impl Fn(i64, IbcTransaction, Option<u64>) + Send + Sync + 'static,
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
            BridgeEvent::CosmosSendTransaction => {
                let transaction: IbcTransaction = first_param(request)?;
                if let Some(callback) = &self.on_transaction {
                    callback(id, transaction, timestamp);
                } else {
                    tracing::debug!(id, "no cosmos callback attached, request ignored");
                }
                Ok(())
            }
            other => Err(BridgeError::BadJsonRpcRequest(format!(
                "{other:?} is not a Cosmos event"
            ))),
        }
    }
}
