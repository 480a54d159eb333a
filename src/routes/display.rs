use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};

use crate::{
    dto::display::{
        DisplayReply, PuppetRequest, ResponsesView, RoundView, ScoresView, StaticView, ViewQuery,
    },
    error::AppError,
    services::display_service,
    state::SharedState,
};

/// Display polling and the page views displays render.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/display/update", post(puppet_update))
        .route("/display/round/{n}", get(round_view))
        .route("/display/scores/{n}", get(scores_view))
        .route("/display/static", get(static_view))
        .route("/display/responses/{n}", get(responses_view))
}

/// Poll from a display; answers with the page to navigate to, if any.
#[utoipa::path(
    post,
    path = "/display/update",
    tag = "display",
    request_body = PuppetRequest,
    responses(
        (status = 200, description = "Navigation reply", body = DisplayReply),
        (status = 400, description = "Unknown puppet")
    )
)]
pub async fn puppet_update(
    State(state): State<SharedState>,
    Json(request): Json<PuppetRequest>,
) -> Result<Json<DisplayReply>, AppError> {
    Ok(Json(display_service::puppet_update(&state, request).await?))
}

/// Question or answer slides of a round.
#[utoipa::path(
    get,
    path = "/display/round/{n}",
    tag = "display",
    params(("n" = u32, Path, description = "Round number"), ViewQuery),
    responses(
        (status = 200, description = "Question or answer slides", body = RoundView),
        (status = 404, description = "Round not defined")
    )
)]
pub async fn round_view(
    State(state): State<SharedState>,
    Path(n_round): Path<u32>,
    Query(query): Query<ViewQuery>,
) -> Result<Json<RoundView>, AppError> {
    Ok(Json(display_service::round_view(&state, n_round, query).await?))
}

/// Published scores of a round, with the leaderboard.
#[utoipa::path(
    get,
    path = "/display/scores/{n}",
    tag = "display",
    params(("n" = u32, Path, description = "Round number"), ViewQuery),
    responses(
        (status = 200, description = "Published scores and leaderboard", body = ScoresView),
        (status = 404, description = "Scores not published")
    )
)]
pub async fn scores_view(
    State(state): State<SharedState>,
    Path(n_round): Path<u32>,
    Query(query): Query<ViewQuery>,
) -> Result<Json<ScoresView>, AppError> {
    Ok(Json(display_service::scores_view(&state, n_round, query).await?))
}

/// Welcome, interval or goodbye page.
#[utoipa::path(
    get,
    path = "/display/static",
    tag = "display",
    params(ViewQuery),
    responses((status = 200, description = "Welcome, interval or goodbye page", body = StaticView))
)]
pub async fn static_view(
    State(state): State<SharedState>,
    Query(query): Query<ViewQuery>,
) -> Result<Json<StaticView>, AppError> {
    Ok(Json(display_service::static_view(&state, query).await?))
}

/// Teams that have answered the current round.
#[utoipa::path(
    get,
    path = "/display/responses/{n}",
    tag = "display",
    params(("n" = u32, Path, description = "Round number")),
    responses((status = 200, description = "Teams that have answered", body = ResponsesView))
)]
pub async fn responses_view(
    State(state): State<SharedState>,
    Path(n_round): Path<u32>,
) -> Result<Json<ResponsesView>, AppError> {
    Ok(Json(display_service::responses_view(&state, n_round).await?))
}
