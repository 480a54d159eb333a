use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::{
        ActionResponse,
        respond::{RespondWaitView, SubmitResponses, TeamAccess},
    },
    error::AppError,
    services::respond_service,
    state::SharedState,
};

/// Endpoints used by teams answering on their own devices.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/respond/{team}/wait", get(wait_view))
        .route("/respond/{team}/{round}", post(submit))
}

/// Submit a team's answers for a round.
#[utoipa::path(
    post,
    path = "/respond/{team}/{round}",
    tag = "respond",
    params(
        ("team" = u64, Path, description = "Team identifier"),
        ("round" = u32, Path, description = "Round number")
    ),
    request_body = SubmitResponses,
    responses(
        (status = 200, description = "Answers saved", body = ActionResponse),
        (status = 400, description = "Round not open or wrong answer count"),
        (status = 401, description = "Access code rejected")
    )
)]
pub async fn submit(
    State(state): State<SharedState>,
    Path((team, n_round)): Path<(u64, u32)>,
    Valid(Json(request)): Valid<Json<SubmitResponses>>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(respond_service::submit(&state, team, n_round, request).await?))
}

/// Rounds the team can answer or review.
#[utoipa::path(
    get,
    path = "/respond/{team}/wait",
    tag = "respond",
    params(("team" = u64, Path, description = "Team identifier"), TeamAccess),
    responses(
        (status = 200, description = "Open rounds", body = RespondWaitView),
        (status = 401, description = "Access code rejected")
    )
)]
pub async fn wait_view(
    State(state): State<SharedState>,
    Path(team): Path<u64>,
    Query(TeamAccess { access }): Query<TeamAccess>,
) -> Result<Json<RespondWaitView>, AppError> {
    Ok(Json(respond_service::wait_view(&state, team, &access).await?))
}
