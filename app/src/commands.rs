//! Subcommand handlers.

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use tracing::{debug, info, instrument, warn};

use relaydeck_ipc::{Channel, ChannelId, ChannelKind, ClientCommand, ClientEvent};

use crate::AppState;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Load and print the channel directory.
#[instrument(skip(state))]
pub async fn list(state: &AppState) -> Result<()> {
    debug!("list command");
    let result = state.client.execute(ClientCommand::LoadDirectory).await;
    report_events(state)?;
    result?;

    for channel in state.client.directory().get().iter() {
        println!("{}", format_channel(channel));
    }
    Ok(())
}

/// Create a broadcast channel.
#[instrument(skip(state))]
pub async fn broadcast(
    state: &AppState,
    name: String,
    genre: String,
    desc: Option<String>,
    comment: Option<String>,
) -> Result<()> {
    debug!("broadcast command");
    run_command(
        state,
        ClientCommand::CreateBroadcast {
            name,
            genre,
            desc,
            comment,
        },
    )
    .await
}

/// Create a relay from a source URL.
#[instrument(skip(state))]
pub async fn relay(state: &AppState, source_url: String) -> Result<()> {
    debug!("relay command");
    run_command(state, ClientCommand::CreateRelay { source_url }).await
}

/// Drop a channel.
#[instrument(skip(state))]
pub async fn drop_channel(state: &AppState, id: ChannelId) -> Result<()> {
    debug!("drop command");
    run_command(state, ClientCommand::Drop { channel_id: id }).await
}

/// Print the external-player playlist URL.
pub fn playlist(state: &AppState, id: &ChannelId) -> Result<()> {
    println!("{}", state.client.playlist_url(id)?);
    Ok(())
}

/// Stream a channel into the client's sink until it ends or Ctrl-C.
#[instrument(skip(state))]
pub async fn play(state: &AppState, id: ChannelId) -> Result<()> {
    state
        .client
        .execute(ClientCommand::OpenPlayback { channel_id: id })
        .await?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut tick = tokio::time::interval(POLL_INTERVAL);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted, closing playback");
                state.client.execute(ClientCommand::ClosePlayback).await?;
                report_events(state)?;
                return Ok(());
            }
            _ = tick.tick() => {
                for event in poll_events(state)? {
                    print_event(&event);
                    match event {
                        ClientEvent::PlaybackFailed { message, .. } => {
                            bail!("playback failed: {message}")
                        }
                        ClientEvent::PlaybackEnded { .. } => return Ok(()),
                        _ => {}
                    }
                }
            }
        }
    }
}

/// Follow the push channel and refresh the directory on each message.
#[instrument(skip(state))]
pub async fn watch(state: &AppState) -> Result<()> {
    let connected = state.client.execute(ClientCommand::ConnectNotifier).await;
    report_events(state)?;
    connected?;

    if let Err(e) = state.client.execute(ClientCommand::LoadDirectory).await {
        warn!("Initial directory load failed: {}", e);
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut tick = tokio::time::interval(POLL_INTERVAL);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted, disconnecting");
                state.client.execute(ClientCommand::DisconnectNotifier).await?;
                return Ok(());
            }
            _ = tick.tick() => {
                for event in poll_events(state)? {
                    print_event(&event);
                    match event {
                        ClientEvent::NotifierMessage(_) => {
                            if let Err(e) = state.client.execute(ClientCommand::LoadDirectory).await {
                                warn!("Directory refresh failed: {}", e);
                            }
                        }
                        ClientEvent::NotifierDisconnected { reason: Some(reason) } => {
                            bail!("notifier connection lost: {reason}")
                        }
                        ClientEvent::NotifierDisconnected { reason: None } => return Ok(()),
                        _ => {}
                    }
                }
            }
        }
    }
}

/// Poll for client events (non-blocking).
pub fn poll_events(state: &AppState) -> Result<Vec<ClientEvent>> {
    let rx = state.event_rx.lock();
    let mut events = Vec::new();

    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(crossbeam_channel::TryRecvError::Empty) => break,
            Err(crossbeam_channel::TryRecvError::Disconnected) => {
                return Err(anyhow!("Event channel disconnected"));
            }
        }
    }

    Ok(events)
}

/// Drain pending events and print them.
pub fn report_events(state: &AppState) -> Result<()> {
    for event in poll_events(state)? {
        print_event(&event);
    }
    Ok(())
}

async fn run_command(state: &AppState, command: ClientCommand) -> Result<()> {
    let result = state.client.execute(command).await;
    report_events(state)?;
    result.map_err(Into::into)
}

/// Events go to stderr as JSON lines; stdout may carry media.
fn print_event(event: &ClientEvent) {
    if matches!(event, ClientEvent::DirectoryUpdated { .. }) {
        return;
    }
    match serde_json::to_string(event) {
        Ok(line) => eprintln!("{line}"),
        Err(e) => warn!("Failed to encode event: {}", e),
    }
}

fn format_channel(channel: &Channel) -> String {
    let kind = match channel.channel_type.typ {
        ChannelKind::Broadcast => "broadcast",
        ChannelKind::Relay => "relay",
        ChannelKind::Unknown => "-",
    };
    format!(
        "{}\t{}\t{}\t{}\t{}",
        channel.id,
        kind,
        channel.status.name(),
        channel.name(),
        channel.info.genre
    )
}
