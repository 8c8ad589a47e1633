//! # Chain Handlers
//!
//! Stateless decoders for the chain-specific request families. Each handler
//! owns nothing but the callbacks the application attached to it; decoding a
//! request and invoking the matching callback is the whole job. Responding
//! goes back through the interactor (`approve_request`/`reject_request`).

pub mod binance;
pub mod cosmos;
pub mod ethereum;
pub mod trust;

pub use binance::{BinanceHandler, BinanceOrder, BinanceTxConfirmation};
pub use cosmos::{CosmosHandler, IbcTransaction};
pub use ethereum::{EthereumHandler, EthereumTransaction, SignKind, SignPayload, TransactionKind};
pub use trust::TrustHandler;

use serde_json::Value;

use crate::error::{BridgeError, BridgeResult};
use crate::events::{BridgeEvent, ChainFamily};

/// Routes a decrypted request to the handler family owning its event.
///
/// Session-level events never reach the router — the interactor consumes
/// them before dispatch.
#[derive(Default)]
pub struct ChainRouter {
    pub ethereum: EthereumHandler,
    pub binance: BinanceHandler,
    pub trust: TrustHandler,
    pub cosmos: CosmosHandler,
}

impl ChainRouter {
    pub fn dispatch(
        &self,
        event: BridgeEvent,
        id: i64,
        request: &Value,
        timestamp: Option<u64>,
    ) -> BridgeResult<()> {
        match event.chain() {
            ChainFamily::Ethereum => self.ethereum.handle(event, id, request, timestamp),
            ChainFamily::Binance => self.binance.handle(event, id, request, timestamp),
            ChainFamily::Trust => self.trust.handle(event, id, request, timestamp),
            ChainFamily::Cosmos => self.cosmos.handle(event, id, request, timestamp),
            ChainFamily::Session => Err(BridgeError::BadJsonRpcRequest(
                "session events are not chain requests".into(),
            )),
        }
    }
}
