//! Command-line configuration.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use relaydeck_ipc::EVENT_CHANNEL_CAPACITY;
use relaydeck_transport::{
    BuildMode, Endpoints, PageLocation, DEFAULT_DEV_HOST, DEFAULT_DEV_PORT,
};

/// Control a peercast relay: list, create, drop and play channels.
#[derive(Debug, Parser)]
#[command(name = "relaydeck", version, about)]
pub struct Cli {
    /// Relay host the client is served from.
    #[arg(long, default_value = DEFAULT_DEV_HOST)]
    pub host: String,

    /// Relay port the client is served from.
    #[arg(long, default_value_t = DEFAULT_DEV_PORT)]
    pub port: u16,

    /// Talk to the development relay instead of --host/--port.
    #[arg(long)]
    pub dev: bool,

    /// Development relay host.
    #[arg(long, env = "PEERCAST_RE_HOST", default_value = DEFAULT_DEV_HOST)]
    pub dev_host: String,

    /// Development relay port.
    #[arg(long, env = "PEERCAST_RE_PORT", default_value_t = DEFAULT_DEV_PORT)]
    pub dev_port: u16,

    /// Event channel capacity.
    #[arg(long, default_value_t = EVENT_CHANNEL_CAPACITY)]
    pub events: usize,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the channel directory.
    List,

    /// Start broadcasting a new channel.
    Broadcast {
        name: String,

        #[arg(long, default_value = "")]
        genre: String,

        #[arg(long)]
        desc: Option<String>,

        #[arg(long)]
        comment: Option<String>,
    },

    /// Join a relay from a source URL (`.../<id>?tip=<host:port>`).
    Relay { source_url: String },

    /// Stop a channel.
    Drop { id: String },

    /// Print the playlist URL for an external player.
    Playlist { id: String },

    /// Stream a channel into a file, or stdout when no file is given.
    Play {
        id: String,

        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Follow the push channel, refreshing the directory on each message.
    Watch,
}

impl Cli {
    pub fn build_mode(&self) -> BuildMode {
        if self.dev {
            BuildMode::Development {
                host: self.dev_host.clone(),
                port: self.dev_port,
            }
        } else {
            BuildMode::Production
        }
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints::resolve(&PageLocation::new(&self.host, self.port), &self.build_mode())
    }
}
