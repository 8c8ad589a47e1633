//! Structured logging setup.
//!
//! Installs the `tracing` subscriber with `RUST_LOG`-style filtering. All
//! output goes to stderr; stdout stays free for the pairing prompts.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global subscriber. Call exactly once, early in `main()`.
///
/// `default_filter` applies when `RUST_LOG` is unset, e.g.
/// `"lumen_wallet=info,lumen_bridge=debug"`. `json` switches to JSON-lines
/// output for log aggregation.
pub fn init(default_filter: &str, json: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_file(false),
            )
            .init();
    }
}
