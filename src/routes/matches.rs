use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::matches::{
        ActiveMatchesResponse, MatchDetailsResponse, MatchTransitionResponse,
        PlayerActiveMatchResponse, SubmitMatchRequest,
    },
    error::AppError,
    services::{lifecycle_service, match_service},
    state::SharedState,
};

/// Routes exposing matches and their lifecycle hooks.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/matches/active", get(active_matches))
        .route("/matches/{id}", get(match_details))
        .route("/matches/player/{player_id}/active", get(player_active_match))
        .route("/matches/{id}/submit", post(submit_match))
        .route("/matches/{id}/complete", post(complete_match))
}

#[utoipa::path(
    get,
    path = "/matches/active",
    tag = "matches",
    responses((status = 200, description = "Matches in session or voting", body = ActiveMatchesResponse))
)]
/// Matches in session or voting.
pub async fn active_matches(
    State(state): State<SharedState>,
) -> Result<Json<ActiveMatchesResponse>, AppError> {
    Ok(Json(match_service::active_matches(&state).await?))
}

/// Match details with the server-authoritative remaining time.
#[utoipa::path(
    get,
    path = "/matches/{id}",
    tag = "matches",
    params(("id" = Uuid, Path, description = "Match identifier")),
    responses(
        (status = 200, description = "Match found", body = MatchDetailsResponse),
        (status = 404, description = "Unknown match")
    )
)]
pub async fn match_details(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchDetailsResponse>, AppError> {
    Ok(Json(match_service::match_details(&state, id).await?))
}

/// Fallback for clients that missed the `match_started` push.
#[utoipa::path(
    get,
    path = "/matches/player/{player_id}/active",
    tag = "matches",
    params(("player_id" = String, Path, description = "Player identifier")),
    responses((status = 200, description = "Active match of the player, if any", body = PlayerActiveMatchResponse))
)]
pub async fn player_active_match(
    State(state): State<SharedState>,
    Path(player_id): Path<String>,
) -> Result<Json<PlayerActiveMatchResponse>, AppError> {
    Ok(Json(
        match_service::player_active_match(&state, &player_id).await?,
    ))
}

/// Submit early on behalf of a participant.
#[utoipa::path(
    post,
    path = "/matches/{id}/submit",
    tag = "matches",
    params(("id" = Uuid, Path, description = "Match identifier")),
    request_body = SubmitMatchRequest,
    responses(
        (status = 200, description = "Session ended (or already over)", body = MatchTransitionResponse),
        (status = 400, description = "Player is not a participant"),
        (status = 404, description = "Unknown match")
    )
)]
pub async fn submit_match(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmitMatchRequest>,
) -> Result<Json<MatchTransitionResponse>, AppError> {
    payload.validate()?;
    Ok(Json(
        lifecycle_service::submit_match(&state, id, &payload.player_id).await?,
    ))
}

/// Mark the voting or showcase stage as resolved.
#[utoipa::path(
    post,
    path = "/matches/{id}/complete",
    tag = "matches",
    params(("id" = Uuid, Path, description = "Match identifier")),
    responses(
        (status = 200, description = "Match completed", body = MatchTransitionResponse),
        (status = 409, description = "Match is not in voting or showcase")
    )
)]
pub async fn complete_match(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchTransitionResponse>, AppError> {
    Ok(Json(lifecycle_service::complete_match(&state, id).await?))
}
