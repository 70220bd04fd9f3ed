//! Commands sent from the UI to the client.

use serde::{Deserialize, Serialize};

use crate::types::ChannelId;

/// Commands that the UI can send to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientCommand {
    /// Fetch the channel list and replace the directory snapshot.
    LoadDirectory,

    /// Start broadcasting a new channel.
    CreateBroadcast {
        name: String,
        genre: String,
        desc: Option<String>,
        comment: Option<String>,
    },

    /// Join a relay from a pasted source URL.
    CreateRelay { source_url: String },

    /// Terminate a channel.
    Drop { channel_id: ChannelId },

    /// Open the player on a channel.
    OpenPlayback { channel_id: ChannelId },

    /// Close the player.
    ClosePlayback,

    /// Open the realtime push channel.
    ConnectNotifier,

    /// Close the realtime push channel.
    DisconnectNotifier,

    /// Tear everything down.
    Shutdown,
}
