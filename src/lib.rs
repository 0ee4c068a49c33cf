// Askdb - an AI SQL agent written in Rust
// Ask a question in plain language, review the generated SQL, run it.

pub mod config;
pub mod core;
pub mod error;
pub mod integrations;
pub mod sql;

use anyhow::Result;
use tracing::info;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Initialize the agent with custom logger configuration
///
/// @param ansi_colors - Whether to enable ANSI color codes in logs.
/// Logs go to stderr so they never interleave with query output on stdout.
pub fn init_with_logger(ansi_colors: bool) -> Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    fmt::Subscriber::builder()
        .with_ansi(ansi_colors)
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .init();

    info!("Initializing askdb v{}", version());

    Ok(())
}
