//! Trust custom methods.
//!
//! `trust_signTransaction` is an opaque pass-through: the params travel to
//! the application untouched, because the payload schema is owned by the
//! peer and versioned outside this protocol. `get_accounts` carries no
//! params at all — the application answers through `approve_request` with
//! its account list.

use serde_json::Value;

use crate::error::{BridgeError, BridgeResult};
use crate::events::BridgeEvent;

type SignCallback = Box<dyn Fn(i64, Value, Option<u64>) + Send + Sync>;
type AccountsCallback = Box<dyn Fn(i64) + Send + Sync>;

/// Stateless pass-through for Trust custom methods.
#[derive(Default)]
pub struct TrustHandler {
    on_sign_transaction: Option<SignCallback>,
    on_get_accounts: Option<AccountsCallback>,
}

impl TrustHandler {
    pub fn on_sign_transaction(
        &mut self,
        callback: impl Fn(i64, Value, Option<u64>) + Send + Sync + 'static,
    ) {
        self.on_sign_transaction = Some(Box::new(callback));
    }

    pub fn on_get_accounts(&mut self, callback: impl Fn(i64) + Send + Sync + 'static) {
        self.on_get_accounts = Some(Box::new(callback));
    }

    pub(crate) fn handle(
        &self,
        event: BridgeEvent,
        id: i64,
        request: &Value,
        timestamp: Option<u64>,
    ) -> BridgeResult<()> {
        match event {
            BridgeEvent::TrustSignTransaction => {
                let params = request.get("params").cloned().unwrap_or(Value::Null);
                if let Some(callback) = &self.on_sign_transaction {
                    callback(id, params, timestamp);
                } else {
                    tracing::debug!(id, "no trust sign callback attached, request ignored");
                }
                Ok(())
            }
            BridgeEvent::GetAccounts => {
                if let Some(callback) = &self.on_get_accounts {
                    callback(id);
                } else {
                    tracing::debug!(id, "no get_accounts callback attached, request ignored");
                }
                Ok(())
            }
            other => Err(BridgeError::BadJsonRpcRequest(format!(
                "{other:?} is not a Trust event"
            ))),
        }
    }
}
