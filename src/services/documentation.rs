use utoipa::OpenApi;

/// Aggregated OpenAPI specification for Flip Battle Back.
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::matchmaking::join_queue,
        crate::routes::matchmaking::leave_queue,
        crate::routes::matchmaking::queue_status,
        crate::routes::matches::active_matches,
        crate::routes::matches::match_details,
        crate::routes::matches::player_active_match,
        crate::routes::matches::submit_match,
        crate::routes::matches::complete_match,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::matchmaking::JoinQueueRequest,
            crate::dto::matchmaking::LeaveQueueRequest,
            crate::dto::matchmaking::QueueActionResponse,
            crate::dto::matchmaking::QueueStatusResponse,
            crate::dto::matchmaking::QueuedPlayer,
            crate::dto::matches::MatchSummary,
            crate::dto::matches::ParticipantSummary,
            crate::dto::matches::MatchDetailsResponse,
            crate::dto::matches::ActiveMatchesResponse,
            crate::dto::matches::PlayerActiveMatchResponse,
            crate::dto::matches::SubmitMatchRequest,
            crate::dto::matches::MatchTransitionResponse,
            crate::dto::ws::ClientMessage,
            crate::dto::ws::ServerMessage,
            crate::dao::models::GameMode,
            crate::dao::models::MatchStatus,
            crate::dao::models::SampleRef,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "matchmaking", description = "Queue management"),
        (name = "matches", description = "Match lookup and lifecycle hooks"),
        (name = "players", description = "WebSocket channel for player clients"),
    )
)]
pub struct ApiDoc;
