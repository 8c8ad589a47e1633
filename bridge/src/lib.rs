// Copyright (c) 2026 Lumen Labs. MIT License.
// See LICENSE for details.

//! # Lumen Bridge — WalletConnect v1 Session Client
//!
//! A long-lived relay participant for the v1 bridge protocol: the wallet
//! side of a pairing exchanges authenticated JSON-RPC with a dApp or
//! browser extension over an untrusted relay, end-to-end encrypted with
//! AES-256-CBC + HMAC-SHA256 under a key shared out-of-band.
//!
//! ## Architecture
//!
//! The modules mirror the layers of the protocol, leaves first:
//!
//! - **session** — pairing URI parsing, the immutable session descriptor,
//!   and the persistence contract for resuming pairings.
//! - **crypto** — the `{iv, data, hmac}` envelope codec.
//! - **relay** — the `{topic, type, payload, timestamp}` frame codec and
//!   the WebSocket transport wrapper.
//! - **rpc** — JSON-RPC 2.0 with the bridge ecosystem's conventions.
//! - **events** — the method-string dispatch table.
//! - **chains** — stateless request decoders per chain family (Ethereum,
//!   Binance Chain, Trust, Cosmos/IBC).
//! - **interactor** — the session state machine: one actor task owning the
//!   socket, subscriptions, handshake context, and timers.
//! - **callbacks** — the observer surface the application implements.
//! - **error** — the stable error taxonomy.
//! - **config** — protocol constants.
//!
//! ## A minimal wallet
//!
//! ```no_run
//! use lumen_bridge::interactor::{Interactor, InteractorOptions};
//! use lumen_bridge::session::Session;
//!
//! # async fn pair() -> lumen_bridge::error::BridgeResult<()> {
//! let session = Session::from_uri(
//!     "wc:topic@1?bridge=https%3A%2F%2Fbridge.example&key=…",
//! )?;
//! let interactor = Interactor::new(session, InteractorOptions::default());
//! interactor.connect().await?;
//! // wc_sessionRequest arrives via SessionObserver::on_session_request;
//! // answer with interactor.approve_session(...) or reject_session(...).
//! # Ok(())
//! # }
//! ```

pub mod callbacks;
pub mod chains;
pub mod config;
pub mod crypto;
pub mod error;
pub mod events;
pub mod interactor;
pub mod relay;
pub mod rpc;
pub mod session;
