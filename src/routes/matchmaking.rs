use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use tracing::warn;
use validator::Validate;

use crate::{
    dto::matchmaking::{
        JoinQueueRequest, LeaveQueueRequest, QueueActionResponse, QueueQuery, QueueStatusResponse,
    },
    error::{AppError, ServiceError},
    services::matchmaking_service,
    state::SharedState,
};

/// Routes managing the matchmaking queue.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/matchmaking/join", post(join_queue))
        .route("/matchmaking/leave", post(leave_queue))
        .route("/matchmaking/queue/{category}", get(queue_status))
}

/// Enter the queue of a (category, mode) bucket.
#[utoipa::path(
    post,
    path = "/matchmaking/join",
    tag = "matchmaking",
    request_body = JoinQueueRequest,
    responses(
        (status = 200, description = "Player queued", body = QueueActionResponse),
        (status = 400, description = "Invalid player id or unknown category"),
        (status = 503, description = "Storage unavailable; the client may retry")
    )
)]
pub async fn join_queue(
    State(state): State<SharedState>,
    Json(payload): Json<JoinQueueRequest>,
) -> Result<Json<QueueActionResponse>, AppError> {
    payload.validate()?;
    match matchmaking_service::join_queue(&state, payload.player_id, payload.category, payload.mode)
        .await
    {
        Ok(_) => Ok(Json(QueueActionResponse::joined())),
        Err(ServiceError::Unavailable(err)) => {
            warn!(error = %err, "failed to persist queue entry");
            Err(AppError::ServiceUnavailable(
                "failed to join queue; try again".into(),
            ))
        }
        Err(err) => Err(err.into()),
    }
}

/// Leave the queue; leaving twice is not an error.
#[utoipa::path(
    post,
    path = "/matchmaking/leave",
    tag = "matchmaking",
    request_body = LeaveQueueRequest,
    responses((status = 200, description = "Player no longer queued", body = QueueActionResponse))
)]
pub async fn leave_queue(
    State(state): State<SharedState>,
    Json(payload): Json<LeaveQueueRequest>,
) -> Result<Json<QueueActionResponse>, AppError> {
    payload.validate()?;
    matchmaking_service::leave_queue(&state, &payload.player_id).await?;
    Ok(Json(QueueActionResponse::left()))
}

/// Players waiting in a bucket, oldest first.
#[utoipa::path(
    get,
    path = "/matchmaking/queue/{category}",
    tag = "matchmaking",
    params(
        ("category" = String, Path, description = "Content category"),
        QueueQuery
    ),
    responses((status = 200, description = "Bucket content", body = QueueStatusResponse))
)]
pub async fn queue_status(
    State(state): State<SharedState>,
    Path(category): Path<String>,
    Query(query): Query<QueueQuery>,
) -> Result<Json<QueueStatusResponse>, AppError> {
    let mode = query.mode.unwrap_or_default();
    let entries = matchmaking_service::queue_status(&state, &category, mode).await?;
    Ok(Json(QueueStatusResponse {
        category,
        mode,
        count: entries.len(),
        players: entries.into_iter().map(Into::into).collect(),
    }))
}
