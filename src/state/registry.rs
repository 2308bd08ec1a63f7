//! Volatile mapping between live WebSocket channels, players and match rooms.

use std::{collections::HashSet, hash::Hash};

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Identifier of one live socket.
pub type ChannelId = Uuid;

struct ChannelEntry {
    sender: mpsc::UnboundedSender<Message>,
    player_id: Option<String>,
    room: Option<Uuid>,
}

/// Registry of open channels.
///
/// A player may own several channels (devices, tabs); a channel belongs to at most one player
/// and sits in at most one room. Nothing here is persisted: clients re-announce themselves
/// after reconnecting.
#[derive(Default)]
pub struct ConnectionRegistry {
    channels: DashMap<ChannelId, ChannelEntry>,
    players: DashMap<String, HashSet<ChannelId>>,
    rooms: DashMap<Uuid, HashSet<ChannelId>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a freshly opened channel and its outbound sender.
    pub fn register_channel(&self, channel_id: ChannelId, sender: mpsc::UnboundedSender<Message>) {
        self.channels.insert(
            channel_id,
            ChannelEntry {
                sender,
                player_id: None,
                room: None,
            },
        );
    }

    /// Associate `channel_id` with `player_id`.
    ///
    /// Repeating the same pair is a no-op; binding to another player moves the channel.
    /// Returns `false` when the channel is unknown.
    pub fn bind_player(&self, channel_id: ChannelId, player_id: &str) -> bool {
        let previous = {
            let Some(mut entry) = self.channels.get_mut(&channel_id) else {
                return false;
            };
            entry.player_id.replace(player_id.to_owned())
        };

        if let Some(previous) = previous.filter(|previous| previous != player_id) {
            detach(&self.players, &previous, channel_id);
        }
        self.players
            .entry(player_id.to_owned())
            .or_default()
            .insert(channel_id);

        // The channel may have been unregistered while we were binding it.
        if !self.channels.contains_key(&channel_id) {
            detach(&self.players, &player_id.to_owned(), channel_id);
            return false;
        }
        true
    }

    /// Move `channel_id` into the room of `match_id`, leaving its previous room.
    pub fn join_room(&self, match_id: Uuid, channel_id: ChannelId) -> bool {
        let previous = {
            let Some(mut entry) = self.channels.get_mut(&channel_id) else {
                return false;
            };
            entry.room.replace(match_id)
        };

        if let Some(previous) = previous.filter(|previous| *previous != match_id) {
            detach(&self.rooms, &previous, channel_id);
        }
        self.rooms.entry(match_id).or_default().insert(channel_id);

        if !self.channels.contains_key(&channel_id) {
            detach(&self.rooms, &match_id, channel_id);
            return false;
        }
        true
    }

    /// Forget a closed channel, removing it from its player and room sets.
    pub fn unregister_channel(&self, channel_id: ChannelId) {
        let Some((_, entry)) = self.channels.remove(&channel_id) else {
            return;
        };
        if let Some(player_id) = entry.player_id {
            detach(&self.players, &player_id, channel_id);
        }
        if let Some(room) = entry.room {
            detach(&self.rooms, &room, channel_id);
        }
    }

    /// Channels currently bound to `player_id`.
    pub fn channels_for(&self, player_id: &str) -> Vec<ChannelId> {
        self.players
            .get(player_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Channels currently in the room of `match_id`.
    pub fn channels_in_room(&self, match_id: Uuid) -> Vec<ChannelId> {
        self.rooms
            .get(&match_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Outbound sender of a channel.
    pub fn sender(&self, channel_id: ChannelId) -> Option<mpsc::UnboundedSender<Message>> {
        self.channels
            .get(&channel_id)
            .map(|entry| entry.sender.clone())
    }

    /// Player a channel is bound to.
    pub fn player_of(&self, channel_id: ChannelId) -> Option<String> {
        self.channels
            .get(&channel_id)
            .and_then(|entry| entry.player_id.clone())
    }

    /// Room a channel currently sits in.
    pub fn room_of(&self, channel_id: ChannelId) -> Option<Uuid> {
        self.channels.get(&channel_id).and_then(|entry| entry.room)
    }

    /// Number of open channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

/// Remove `channel_id` from the set stored under `key`, dropping the set once empty.
fn detach<K>(map: &DashMap<K, HashSet<ChannelId>>, key: &K, channel_id: ChannelId)
where
    K: Eq + Hash,
{
    map.remove_if_mut(key, |_, set| {
        set.remove(&channel_id);
        set.is_empty()
    });
}
