use axum::Router;

use crate::state::SharedState;

/// Swagger UI.
pub mod docs;
/// Health check.
pub mod health;
/// Match lookups and lifecycle hooks.
pub mod matches;
/// Queue management.
pub mod matchmaking;
/// Player WebSocket endpoint.
pub mod websocket;

/// Compose all route trees and wire in the shared state.
pub fn router(state: SharedState) -> Router<()> {
    health::router()
        .merge(matchmaking::router())
        .merge(matches::router())
        .merge(websocket::router())
        .merge(docs::router())
        .with_state(state)
}
