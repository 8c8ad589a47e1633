//! Command-line interface for the demo wallet.

use clap::{Parser, Subcommand};

/// Demo wallet endpoint for the Lumen bridge client.
///
/// Pairs with a dApp from a `wc:`/`CWE:` URI, logs every inbound request,
/// and answers the session handshake from the flags below. Chain requests
/// are rejected — this wallet holds no keys.
#[derive(Parser, Debug)]
#[command(name = "lumen-wallet", about, version, propagate_version = true)]
pub struct WalletCli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pair from a URI and service the session until it ends.
    Pair(PairArgs),
    /// Print version information and exit.
    Version,
}

#[derive(Parser, Debug)]
pub struct PairArgs {
    /// The pairing URI, usually scanned from a QR code.
    pub uri: String,

    /// Account address offered when approving the session.
    #[arg(
        long,
        env = "LUMEN_ACCOUNT",
        default_value = "0x0000000000000000000000000000000000000000"
    )]
    pub account: String,

    /// Chain id offered when approving the session.
    #[arg(long, env = "LUMEN_CHAIN_ID", default_value = "1")]
    pub chain_id: String,

    /// Reject the session handshake instead of approving it.
    #[arg(long)]
    pub reject: bool,

    /// Reconnect automatically after transport drops.
    #[arg(long)]
    pub reconnect: bool,

    /// Default log filter when RUST_LOG is unset.
    #[arg(long, env = "LUMEN_LOG", default_value = "info")]
    pub log_level: String,

    /// Emit JSON logs instead of human-readable ones.
    #[arg(long)]
    pub json_logs: bool,
}
