//! Handlers for inbound WebSocket messages, keyed by message kind.

use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    clock::unix_millis,
    dao::models::GameMode,
    dto::{
        validation::validate_player_id,
        ws::{ClientMessage, ServerMessage},
    },
    error::ServiceError,
    services::{broadcast::send_to_channel, lifecycle_service, matchmaking_service},
    state::{ChannelId, SharedState, lifecycle::EndReason},
};

/// The channel a message arrived on.
#[derive(Debug, Clone, Copy)]
pub struct ChannelContext {
    /// Registry key of the socket.
    pub channel_id: ChannelId,
}

/// Reasons a message could not be handled. None of them close the socket.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The `type` tag is not handled.
    #[error("unknown message type")]
    UnknownMessage,
    /// The player id fails validation.
    #[error("invalid player id: {0}")]
    InvalidPlayerId(String),
    /// The socket was unregistered meanwhile; the connection should close.
    #[error("channel `{0}` is no longer registered")]
    ChannelGone(ChannelId),
    /// `match_end` named no player and the channel is not bound.
    #[error("match_end without a player id on an unbound channel")]
    UnboundChannel,
    /// The underlying service refused or failed.
    #[error("service error: {0}")]
    Service(#[from] ServiceError),
}

/// Handle one inbound message, returning the replies for the originating channel.
pub async fn dispatch(
    state: &SharedState,
    ctx: ChannelContext,
    message: ClientMessage,
) -> Result<Vec<ServerMessage>, DispatchError> {
    match message {
        ClientMessage::JoinMatch {
            player_id,
            category,
            mode,
        } => join_match(state, ctx, player_id, category, mode).await,
        ClientMessage::JoinRoom {
            match_id,
            player_id,
        } => join_room(state, ctx, match_id, player_id).await,
        ClientMessage::MatchEnd {
            match_id,
            player_id,
        } => match_end(state, ctx, match_id, player_id).await,
        ClientMessage::Unknown => Err(DispatchError::UnknownMessage),
    }
}

fn bind(state: &SharedState, ctx: ChannelContext, player_id: &str) -> Result<(), DispatchError> {
    validate_player_id(player_id)
        .map_err(|err| DispatchError::InvalidPlayerId(err.to_string()))?;
    if !state.registry().bind_player(ctx.channel_id, player_id) {
        return Err(DispatchError::ChannelGone(ctx.channel_id));
    }
    Ok(())
}

async fn join_match(
    state: &SharedState,
    ctx: ChannelContext,
    player_id: String,
    category: String,
    mode: GameMode,
) -> Result<Vec<ServerMessage>, DispatchError> {
    bind(state, ctx, &player_id)?;
    matchmaking_service::join_queue(state, player_id, category, mode).await?;
    Ok(Vec::new())
}

async fn join_room(
    state: &SharedState,
    ctx: ChannelContext,
    match_id: Uuid,
    player_id: String,
) -> Result<Vec<ServerMessage>, DispatchError> {
    let store = state.require_match_store().await?;
    if store.get_match(match_id).await.map_err(ServiceError::from)?.is_none() {
        return Err(ServiceError::NotFound(format!("match `{match_id}` not found")).into());
    }
    bind(state, ctx, &player_id)?;

    // Room entry and reply happen under the emission gate, so the reply cannot land after a
    // `match_ended` the channel already received.
    let gate = state.countdowns().gate(match_id);
    let _emit = gate.lock().await;
    if !state.registry().join_room(match_id, ctx.channel_id) {
        return Err(DispatchError::ChannelGone(ctx.channel_id));
    }
    info!(%match_id, %player_id, channel_id = %ctx.channel_id, "channel joined match room");

    let record = store
        .get_match(match_id)
        .await
        .map_err(ServiceError::from)?
        .ok_or_else(|| ServiceError::NotFound(format!("match `{match_id}` not found")))?;
    if record.start_time.is_none() {
        return Ok(Vec::new());
    }
    let now = state.clock().now();
    let reply = ServerMessage::TimeSync {
        remaining_seconds: lifecycle_service::remaining_for(state, &record, now),
        server_time: unix_millis(now),
    };
    if !send_to_channel(state.registry(), ctx.channel_id, &reply) {
        return Err(DispatchError::ChannelGone(ctx.channel_id));
    }
    Ok(Vec::new())
}

async fn match_end(
    state: &SharedState,
    ctx: ChannelContext,
    match_id: Uuid,
    player_id: Option<String>,
) -> Result<Vec<ServerMessage>, DispatchError> {
    let player_id = player_id
        .or_else(|| state.registry().player_of(ctx.channel_id))
        .ok_or(DispatchError::UnboundChannel)?;
    lifecycle_service::ensure_participant(state, match_id, &player_id).await?;

    let ended = lifecycle_service::finish_match(state, match_id, EndReason::EarlySubmit).await?;
    if ended.is_none() {
        debug!(%match_id, %player_id, "early submit ignored; match already ended");
    }
    Ok(Vec::new())
}
