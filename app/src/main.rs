//! Command-line client for a peercast channel relay.

use clap::Parser;

use relaydeck_lib::{init_logging, run, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    run(Cli::parse()).await
}
