use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::{
        ActionResponse,
        scorer::{
            EditRoundScores, PublishRound, ScoreQuestion, ScorerQuestionsView, ScorerRoundsView,
            SummaryView,
        },
    },
    error::AppError,
    services::scorer_service,
    state::SharedState,
};

/// Scoring workflow: marking answers, entering round scores and publishing them.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/scorer/rounds", get(rounds))
        .route("/scorer/rounds/{n}", get(questions))
        .route("/scorer/summary", get(summary))
        .route("/scorer/questions/{id}/scores", post(score_question))
        .route("/scorer/questions/{id}/confirm", post(confirm_question))
        .route("/scorer/rounds/{n}/scores", post(edit_scores))
        .route("/scorer/rounds/{n}/publish", post(publish))
}

/// Scoring status of every round.
#[utoipa::path(
    get,
    path = "/scorer/rounds",
    tag = "scorer",
    responses((status = 200, description = "Scoring status of every round", body = ScorerRoundsView))
)]
pub async fn rounds(State(state): State<SharedState>) -> Result<Json<ScorerRoundsView>, AppError> {
    Ok(Json(scorer_service::rounds(&state).await?))
}

/// Questions of a round with their responses and marks.
#[utoipa::path(
    get,
    path = "/scorer/rounds/{n}",
    tag = "scorer",
    params(("n" = u32, Path, description = "Round number")),
    responses(
        (status = 200, description = "Questions with their responses", body = ScorerQuestionsView),
        (status = 404, description = "Round not defined")
    )
)]
pub async fn questions(
    State(state): State<SharedState>,
    Path(n_round): Path<u32>,
) -> Result<Json<ScorerQuestionsView>, AppError> {
    Ok(Json(scorer_service::questions(&state, n_round).await?))
}

/// Published totals and ranks for every team.
#[utoipa::path(
    get,
    path = "/scorer/summary",
    tag = "scorer",
    responses((status = 200, description = "Score summary", body = SummaryView))
)]
pub async fn summary(State(state): State<SharedState>) -> Result<Json<SummaryView>, AppError> {
    Ok(Json(scorer_service::summary(&state).await?))
}

/// Mark the responses to one question.
#[utoipa::path(
    post,
    path = "/scorer/questions/{id}/scores",
    tag = "scorer",
    params(("id" = u64, Path, description = "Question identifier")),
    request_body = ScoreQuestion,
    responses(
        (status = 200, description = "Marks saved", body = ActionResponse),
        (status = 404, description = "Question not found")
    )
)]
pub async fn score_question(
    State(state): State<SharedState>,
    Path(question): Path<u64>,
    Valid(Json(request)): Valid<Json<ScoreQuestion>>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(scorer_service::score_question(&state, question, request).await?))
}

/// Confirm the marks of one question.
#[utoipa::path(
    post,
    path = "/scorer/questions/{id}/confirm",
    tag = "scorer",
    params(("id" = u64, Path, description = "Question identifier")),
    responses(
        (status = 200, description = "Marks confirmed", body = ActionResponse),
        (status = 409, description = "Question not fully marked")
    )
)]
pub async fn confirm_question(
    State(state): State<SharedState>,
    Path(question): Path<u64>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(scorer_service::confirm_question(&state, question).await?))
}

/// Enter or clear round scores directly.
#[utoipa::path(
    post,
    path = "/scorer/rounds/{n}/scores",
    tag = "scorer",
    params(("n" = u32, Path, description = "Round number")),
    request_body = EditRoundScores,
    responses(
        (status = 200, description = "Scores saved", body = ActionResponse),
        (status = 400, description = "Unknown team")
    )
)]
pub async fn edit_scores(
    State(state): State<SharedState>,
    Path(n_round): Path<u32>,
    Json(request): Json<EditRoundScores>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(scorer_service::edit_scores(&state, n_round, request).await?))
}

/// Publish a round's scores and rerank the teams.
#[utoipa::path(
    post,
    path = "/scorer/rounds/{n}/publish",
    tag = "scorer",
    params(("n" = u32, Path, description = "Round number")),
    request_body = PublishRound,
    responses(
        (status = 200, description = "Round published", body = ActionResponse),
        (status = 409, description = "Round not ready to publish")
    )
)]
pub async fn publish(
    State(state): State<SharedState>,
    Path(n_round): Path<u32>,
    Json(request): Json<PublishRound>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(scorer_service::publish(&state, n_round, request).await?))
}
