use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::ClientMessage,
    services::{
        broadcast::send_to_channel,
        ws_dispatch::{ChannelContext, DispatchError, dispatch},
    },
    state::SharedState,
};

/// The writer channel of the socket is closed; the connection should be terminated.
#[derive(Debug, Error)]
#[error("connection closed")]
pub struct ConnectionClosed;

/// Handle the full lifecycle for an individual player WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // The writer task keeps outbound messages flowing while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let ctx = ChannelContext {
        channel_id: Uuid::new_v4(),
    };
    state
        .registry()
        .register_channel(ctx.channel_id, outbound_tx.clone());
    info!(channel_id = %ctx.channel_id, "player channel connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                if handle_text(&state, ctx, text.as_str()).await.is_err() {
                    info!(channel_id = %ctx.channel_id, "writer closed, terminating");
                    break;
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(channel_id = %ctx.channel_id, "player channel closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(channel_id = %ctx.channel_id, error = %err, "websocket error");
                break;
            }
        }
    }

    state.registry().unregister_channel(ctx.channel_id);
    info!(channel_id = %ctx.channel_id, "player channel disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Parse and dispatch one text frame, sending the replies back on the same channel.
///
/// Only a closed writer is reported as an error; bad messages are logged and ignored.
pub async fn handle_text(
    state: &SharedState,
    ctx: ChannelContext,
    text: &str,
) -> Result<(), ConnectionClosed> {
    let message = match ClientMessage::from_json_str(text) {
        Ok(message) => message,
        Err(err) => {
            warn!(channel_id = %ctx.channel_id, error = %err, "failed to parse player message");
            return Ok(());
        }
    };
    let kind = message.kind();

    match dispatch(state, ctx, message).await {
        Ok(replies) => {
            for reply in replies {
                if !send_to_channel(state.registry(), ctx.channel_id, &reply) {
                    return Err(ConnectionClosed);
                }
            }
        }
        Err(DispatchError::ChannelGone(_)) => return Err(ConnectionClosed),
        Err(err) => {
            warn!(channel_id = %ctx.channel_id, kind, error = %err, "error while handling player message");
        }
    }
    Ok(())
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::test_support::{TestClock, drain_json, fake_channel, memory_state};

    #[tokio::test]
    async fn malformed_messages_keep_the_channel_open() {
        let (state, _store) = memory_state(Arc::new(TestClock::new())).await;
        let ctx = ChannelContext {
            channel_id: Uuid::new_v4(),
        };
        let (tx, mut rx) = fake_channel();
        state.registry().register_channel(ctx.channel_id, tx);

        assert!(handle_text(&state, ctx, "{not json").await.is_ok());
        assert!(handle_text(&state, ctx, r#"{"type":"wave"}"#).await.is_ok());
        assert!(
            handle_text(&state, ctx, r#"{"type":"join_match","playerId":"p1","category":"nope"}"#)
                .await
                .is_ok()
        );
        assert!(drain_json(&mut rx).is_empty());
        assert_eq!(state.registry().channel_count(), 1);
    }

    #[tokio::test]
    async fn messages_on_an_unregistered_channel_terminate() {
        let (state, _store) = memory_state(Arc::new(TestClock::new())).await;
        let ctx = ChannelContext {
            channel_id: Uuid::new_v4(),
        };
        let result = handle_text(
            &state,
            ctx,
            r#"{"type":"join_match","playerId":"p1","category":"soul","mode":"solo"}"#,
        )
        .await;
        assert!(result.is_err());
    }
}
