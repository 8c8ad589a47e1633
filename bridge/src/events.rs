//! # Method Dispatch Table
//!
//! Maps inbound JSON-RPC method strings onto the closed set of events the
//! interactor knows how to route. Session-level methods exist in two
//! spellings: the canonical `wc_` prefix and the `dc_` aliases used by the
//! extension variant — both map onto the same event.
//!
//! A method outside this table is not an error: the interactor surfaces it
//! to the application as a custom request when it carries an id, and drops
//! it otherwise.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Chain families
// ---------------------------------------------------------------------------

/// Which handler family an event is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainFamily {
    Session,
    Ethereum,
    Binance,
    Trust,
    Cosmos,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// The closed set of dispatchable methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeEvent {
    // Session lifecycle
    SessionRequest,
    SessionUpdate,
    InstantRequest,
    KillSession,
    // Ethereum
    EthSign,
    PersonalSign,
    SignTypedData,
    EthSignTransaction,
    EthSendTransaction,
    // Binance Chain
    BnbSign,
    BnbTransactionConfirm,
    // Trust custom methods
    TrustSignTransaction,
    GetAccounts,
    // Cosmos / IBC
    CosmosSendTransaction,
}

impl BridgeEvent {
    /// Looks up an inbound method string. `None` means "not ours" — the
    /// caller decides between custom-request and drop.
    pub fn from_method(method: &str) -> Option<Self> {
        use BridgeEvent::*;
        let event = match method {
            "wc_sessionRequest" | "dc_sessionRequest" => SessionRequest,
            "wc_sessionUpdate" | "dc_sessionUpdate" => SessionUpdate,
            "dc_instantRequest" => InstantRequest,
            "dc_killSession" => KillSession,
            "eth_sign" => EthSign,
            "personal_sign" => PersonalSign,
            "eth_signTypedData" | "eth_signTypedData_v2" | "eth_signTypedData_v3"
            | "eth_signTypedData_v4" => SignTypedData,
            "eth_signTransaction" => EthSignTransaction,
            "eth_sendTransaction" => EthSendTransaction,
            "bnb_sign" => BnbSign,
            "bnb_tx_confirmation" => BnbTransactionConfirm,
            "trust_signTransaction" => TrustSignTransaction,
            "get_accounts" => GetAccounts,
            "cosmos_sendTransaction" => CosmosSendTransaction,
            _ => return None,
        };
        Some(event)
    }

    /// The canonical method string for outbound requests.
    pub fn canonical_method(&self) -> &'static str {
        use BridgeEvent::*;
        match self {
            SessionRequest => "wc_sessionRequest",
            SessionUpdate => "wc_sessionUpdate",
            InstantRequest => "dc_instantRequest",
            KillSession => "dc_killSession",
            EthSign => "eth_sign",
            PersonalSign => "personal_sign",
            SignTypedData => "eth_signTypedData",
            EthSignTransaction => "eth_signTransaction",
            EthSendTransaction => "eth_sendTransaction",
            BnbSign => "bnb_sign",
            BnbTransactionConfirm => "bnb_tx_confirmation",
            TrustSignTransaction => "trust_signTransaction",
            GetAccounts => "get_accounts",
            CosmosSendTransaction => "cosmos_sendTransaction",
        }
    }

    /// Which handler family services this event.
    pub fn chain(&self) -> ChainFamily {
        use BridgeEvent::*;
        match self {
            SessionRequest | SessionUpdate | InstantRequest | KillSession => ChainFamily::Session,
            EthSign | PersonalSign | SignTypedData | EthSignTransaction | EthSendTransaction => {
                ChainFamily::Ethereum
            }
            BnbSign | BnbTransactionConfirm => ChainFamily::Binance,
            TrustSignTransaction | GetAccounts => ChainFamily::Trust,
            CosmosSendTransaction => ChainFamily::Cosmos,
        }
    }
}
