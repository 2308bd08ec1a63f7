use axum::extract::ws::{Message, Utf8Bytes};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::state::{ChannelId, ConnectionRegistry};

/// Send `event` to every channel in the room of `match_id`.
///
/// Returns how many channels accepted the frame; closed channels are skipped.
pub fn broadcast_to_room<T>(registry: &ConnectionRegistry, match_id: Uuid, event: &T) -> usize
where
    T: ?Sized + Serialize,
{
    let Some(payload) = encode(event) else {
        return 0;
    };
    deliver(registry, registry.channels_in_room(match_id), &payload)
}

/// Send `event` to every channel bound to `player_id`.
pub fn notify_player<T>(registry: &ConnectionRegistry, player_id: &str, event: &T) -> usize
where
    T: ?Sized + Serialize,
{
    let Some(payload) = encode(event) else {
        return 0;
    };
    deliver(registry, registry.channels_for(player_id), &payload)
}

/// Send `event` to the single channel `channel_id`.
pub fn send_to_channel<T>(registry: &ConnectionRegistry, channel_id: ChannelId, event: &T) -> bool
where
    T: ?Sized + Serialize,
{
    encode(event).is_some_and(|payload| deliver(registry, vec![channel_id], &payload) == 1)
}

fn encode<T>(event: &T) -> Option<Utf8Bytes>
where
    T: ?Sized + Serialize,
{
    match serde_json::to_string(event) {
        Ok(payload) => Some(payload.into()),
        Err(err) => {
            warn!(error = %err, "failed to serialize outbound event");
            None
        }
    }
}

fn deliver(registry: &ConnectionRegistry, channels: Vec<ChannelId>, payload: &Utf8Bytes) -> usize {
    channels
        .into_iter()
        .filter_map(|channel_id| registry.sender(channel_id))
        .filter(|sender| sender.send(Message::Text(payload.clone())).is_ok())
        .count()
}
