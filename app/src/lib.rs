//! relaydeck command-line application library.

mod cli;
mod commands;
mod sink;

pub use cli::{Cli, Command};
pub use sink::WriterSink;

use std::sync::Arc;

use anyhow::Context;
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use relaydeck_engine::{create_client, Client, MediaSink};
use relaydeck_ipc::{event_channel_with_capacity, ChannelId, ClientEvent};

/// Application state shared with the command handlers.
pub struct AppState {
    pub client: Client,
    pub event_rx: Mutex<Receiver<ClientEvent>>,
}

/// Initialize logging. Logs go to stderr.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "relaydeck=info,relaydeck_engine=debug,relaydeck_transport=debug".into()
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Run one subcommand against the configured relay.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let endpoints = cli.endpoints();
    info!(relay = %endpoints.authority(), dev = cli.dev, "relaydeck starting");

    let sink: Arc<dyn MediaSink> = match &cli.command {
        Command::Play {
            output: Some(path), ..
        } => Arc::new(
            WriterSink::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?,
        ),
        _ => Arc::new(WriterSink::stdout()),
    };

    let (event_tx, event_rx) = event_channel_with_capacity(cli.events);
    let state = AppState {
        client: create_client(endpoints, sink, event_tx),
        event_rx: Mutex::new(event_rx),
    };

    let result = match cli.command {
        Command::List => commands::list(&state).await,
        Command::Broadcast {
            name,
            genre,
            desc,
            comment,
        } => commands::broadcast(&state, name, genre, desc, comment).await,
        Command::Relay { source_url } => commands::relay(&state, source_url).await,
        Command::Drop { id } => commands::drop_channel(&state, ChannelId::new(id)).await,
        Command::Playlist { id } => commands::playlist(&state, &ChannelId::new(id)),
        Command::Play { id, .. } => commands::play(&state, ChannelId::new(id)).await,
        Command::Watch => commands::watch(&state).await,
    };

    state.client.shutdown().await;
    commands::report_events(&state)?;
    result
}
