// Copyright (c) 2026 Lumen Labs. MIT License.
// See LICENSE for details.

//! # Lumen Demo Wallet
//!
//! Entry point for the `lumen-wallet` binary. Pairs with a remote peer from
//! a pairing URI, answers the session handshake from CLI flags, logs every
//! inbound request, and rejects anything that would need a signing key.
//!
//! The interactor's observer callbacks run on its actor task, so this
//! binary forwards them over a channel and drives all responses from the
//! main loop — the same shape a real wallet uses to hop onto its UI thread.

mod cli;
mod logging;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use lumen_bridge::callbacks::SessionObserver;
use lumen_bridge::chains::ChainRouter;
use lumen_bridge::error::BridgeError;
use lumen_bridge::interactor::{Interactor, InteractorConfig, InteractorOptions, ReconnectPolicy};
use lumen_bridge::relay::AckMessage;
use lumen_bridge::rpc::ChainId;
use lumen_bridge::session::{PeerMeta, Session, SessionParams, SessionRequestParams};

use cli::{Commands, PairArgs, WalletCli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = WalletCli::parse();

    match cli.command {
        Commands::Pair(args) => pair(args).await,
        Commands::Version => {
            println!("lumen-wallet {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Events forwarded from the interactor's actor task
// ---------------------------------------------------------------------------

enum WalletEvent {
    Connected,
    SessionRequest { id: i64, params: SessionRequestParams },
    SessionKilled,
    Disconnected(Option<String>),
    CustomRequest { id: i64, request: serde_json::Value },
    RejectRequest { id: i64, reason: &'static str },
    InboundError(String),
    Ack(AckMessage),
}

struct ChannelObserver {
    events: mpsc::UnboundedSender<WalletEvent>,
}

impl SessionObserver for ChannelObserver {
    fn on_connected(&self) {
        let _ = self.events.send(WalletEvent::Connected);
    }

    fn on_disconnect(&self, error: Option<&BridgeError>) {
        let _ = self
            .events
            .send(WalletEvent::Disconnected(error.map(|e| e.to_string())));
    }

    fn on_session_request(&self, id: i64, params: SessionRequestParams) {
        let _ = self.events.send(WalletEvent::SessionRequest { id, params });
    }

    fn on_session_killed(&self) {
        let _ = self.events.send(WalletEvent::SessionKilled);
    }

    fn on_custom_request(&self, id: i64, request: serde_json::Value, _timestamp: Option<u64>) {
        let _ = self.events.send(WalletEvent::CustomRequest { id, request });
    }

    fn on_error(&self, error: BridgeError) {
        let _ = self.events.send(WalletEvent::InboundError(error.to_string()));
    }

    fn on_ack(&self, ack: AckMessage) {
        let _ = self.events.send(WalletEvent::Ack(ack));
    }
}

// ---------------------------------------------------------------------------
// pair — the whole demo
// ---------------------------------------------------------------------------

async fn pair(args: PairArgs) -> Result<()> {
    let filter = format!(
        "lumen_wallet={level},lumen_bridge={level}",
        level = args.log_level
    );
    logging::init(&filter, args.json_logs);

    let session = Session::from_uri(&args.uri).context("failed to parse pairing URI")?;
    info!(
        topic = %session.topic,
        bridge = %session.bridge,
        version = %session.version,
        "parsed pairing URI"
    );

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    // Chain requests go straight to rejection — a wallet without keys has
    // only one honest answer.
    let mut router = ChainRouter::default();
    let reject_tx = event_tx.clone();
    router.ethereum.on_sign(move |payload| {
        warn!(id = payload.id, kind = ?payload.kind, address = %payload.address, "sign request");
        let _ = reject_tx.send(WalletEvent::RejectRequest {
            id: payload.id,
            reason: "demo wallet holds no signing keys",
        });
    });
    let reject_tx = event_tx.clone();
    router.ethereum.on_transaction(move |id, kind, tx, _ts| {
        warn!(id, kind = ?kind, from = %tx.from, to = ?tx.to, "transaction request");
        let _ = reject_tx.send(WalletEvent::RejectRequest {
            id,
            reason: "demo wallet holds no signing keys",
        });
    });
    let reject_tx = event_tx.clone();
    router.binance.on_sign(move |id, order| {
        warn!(id, chain_id = %order.chain_id, "binance sign request");
        let _ = reject_tx.send(WalletEvent::RejectRequest {
            id,
            reason: "demo wallet holds no signing keys",
        });
    });
    let reject_tx = event_tx.clone();
    router.cosmos.on_transaction(move |id, tx, _ts| {
        warn!(id, signer = %tx.signer_address, "cosmos transaction request");
        let _ = reject_tx.send(WalletEvent::RejectRequest {
            id,
            reason: "demo wallet holds no signing keys",
        });
    });

    let options = InteractorOptions {
        config: InteractorConfig {
            reconnect: ReconnectPolicy {
                enabled: args.reconnect,
                ..ReconnectPolicy::default()
            },
            ..InteractorConfig::default()
        },
        client_meta: Some(PeerMeta {
            name: "Lumen Wallet".into(),
            url: "https://lumenlabs.dev".into(),
            description: Some("Demo wallet for the Lumen bridge client".into()),
            icons: vec![],
        }),
        observer: Arc::new(ChannelObserver { events: event_tx }),
        router,
        ..InteractorOptions::default()
    };

    let interactor = Interactor::new(session, options);
    info!(client_id = %interactor.client_id(), "connecting");
    interactor.connect().await.context("connect failed")?;

    loop {
        tokio::select! {
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                if !handle_event(&interactor, &args, event).await? {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, killing session");
                let _ = interactor.kill_session("wc_sessionUpdate").await;
                break;
            }
        }
    }

    info!("session over");
    Ok(())
}

/// Reacts to one forwarded event. Returns `false` when the session is over.
async fn handle_event(
    interactor: &Interactor,
    args: &PairArgs,
    event: WalletEvent,
) -> Result<bool> {
    match event {
        WalletEvent::Connected => {
            info!("relay connected, waiting for session request");
        }
        WalletEvent::SessionRequest { id, params } => {
            info!(
                id,
                peer = %params.peer_meta.name,
                url = %params.peer_meta.url,
                "session request"
            );
            if args.reject {
                interactor.reject_session("pairing rejected by user").await?;
                info!("session rejected");
                return Ok(false);
            }
            let approval = SessionParams::approval(
                ChainId(args.chain_id.clone()),
                vec![args.account.clone()],
                interactor.client_id().to_owned(),
                None,
            );
            interactor.approve_session(approval).await?;
            info!(account = %args.account, chain_id = %args.chain_id, "session approved");
        }
        WalletEvent::SessionKilled => {
            info!("session killed");
            return Ok(false);
        }
        WalletEvent::Disconnected(error) => {
            match error {
                Some(error) => error!(%error, "disconnected"),
                None => info!("disconnected"),
            }
            return Ok(false);
        }
        WalletEvent::CustomRequest { id, request } => {
            info!(id, %request, "custom request, rejecting");
            interactor
                .reject_request(id, "unsupported method")
                .await?;
        }
        WalletEvent::RejectRequest { id, reason } => {
            interactor.reject_request(id, reason).await?;
        }
        WalletEvent::InboundError(error) => {
            warn!(%error, "inbound message dropped");
        }
        WalletEvent::Ack(ack) => {
            tracing::debug!(topic = %ack.topic, "relay ack");
        }
    }
    Ok(true)
}
