/// Room and player fan-out of outbound events.
pub mod broadcast;
/// Sample selection from the category pools.
pub mod content;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Countdown, session end and completion of matches.
pub mod lifecycle_service;
/// Read-only match lookups.
pub mod match_service;
/// Queue management and match formation.
pub mod matchmaking_service;
/// Repeating background tasks.
pub mod scheduler;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
/// WebSocket connection handling.
pub mod websocket_service;
/// Inbound WebSocket message handlers.
pub mod ws_dispatch;
