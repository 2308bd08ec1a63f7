//! Library crate for flip-battle-back, exposing modules for binaries and integration tests.

/// Time source shared by the store and the countdown.
pub mod clock;
/// Application configuration.
pub mod config;
/// Data access layer.
pub mod dao;
/// Wire types of the HTTP and WebSocket APIs.
pub mod dto;
/// Service and HTTP error types.
pub mod error;
/// HTTP routes.
pub mod routes;
/// Business logic.
pub mod services;
/// Shared application state.
pub mod state;

#[cfg(test)]
mod test_support;
