use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::setup::{
        QuestionsForm, QuestionsView, QuizSettings, RoundSetupView, RoundsForm, TeamSetupView,
        TeamsForm, UploadAck, UploadRequest,
    },
    error::AppError,
    services::setup_service,
    state::SharedState,
};

/// Quiz setup endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/setup/quiz", get(quiz_settings).put(edit_quiz))
        .route("/setup/rounds", get(rounds).put(edit_rounds))
        .route("/setup/teams", get(teams).put(edit_teams))
        .route(
            "/setup/rounds/{n}/questions",
            get(questions).put(edit_questions),
        )
        .route("/setup/uploads", post(upload))
}

/// Current quiz settings.
#[utoipa::path(
    get,
    path = "/setup/quiz",
    tag = "setup",
    responses((status = 200, description = "Quiz settings", body = QuizSettings))
)]
pub async fn quiz_settings(State(state): State<SharedState>) -> Result<Json<QuizSettings>, AppError> {
    Ok(Json(setup_service::quiz_settings(&state).await?))
}

/// Save the quiz settings.
#[utoipa::path(
    put,
    path = "/setup/quiz",
    tag = "setup",
    request_body = QuizSettings,
    responses(
        (status = 200, description = "Settings saved", body = QuizSettings),
        (status = 400, description = "Invalid settings")
    )
)]
pub async fn edit_quiz(
    State(state): State<SharedState>,
    Valid(Json(settings)): Valid<Json<QuizSettings>>,
) -> Result<Json<QuizSettings>, AppError> {
    Ok(Json(setup_service::edit_quiz(&state, settings).await?))
}

/// Rounds in quiz order.
#[utoipa::path(
    get,
    path = "/setup/rounds",
    tag = "setup",
    responses((status = 200, description = "Rounds in quiz order", body = [RoundSetupView]))
)]
pub async fn rounds(State(state): State<SharedState>) -> Result<Json<Vec<RoundSetupView>>, AppError> {
    Ok(Json(setup_service::rounds(&state).await?))
}

/// Add, edit or remove rounds. Removing a round restarts the quiz.
#[utoipa::path(
    put,
    path = "/setup/rounds",
    tag = "setup",
    request_body = RoundsForm,
    responses(
        (status = 200, description = "Rounds saved", body = [RoundSetupView]),
        (status = 400, description = "Index out of sequence")
    )
)]
pub async fn edit_rounds(
    State(state): State<SharedState>,
    Valid(Json(form)): Valid<Json<RoundsForm>>,
) -> Result<Json<Vec<RoundSetupView>>, AppError> {
    Ok(Json(setup_service::edit_rounds(&state, form).await?))
}

/// Teams with their access codes.
#[utoipa::path(
    get,
    path = "/setup/teams",
    tag = "setup",
    responses((status = 200, description = "Teams by name with access codes", body = [TeamSetupView]))
)]
pub async fn teams(State(state): State<SharedState>) -> Result<Json<Vec<TeamSetupView>>, AppError> {
    Ok(Json(setup_service::teams(&state).await?))
}

/// Add, rename or remove teams.
#[utoipa::path(
    put,
    path = "/setup/teams",
    tag = "setup",
    request_body = TeamsForm,
    responses(
        (status = 200, description = "Teams saved", body = [TeamSetupView]),
        (status = 400, description = "Index out of sequence")
    )
)]
pub async fn edit_teams(
    State(state): State<SharedState>,
    Valid(Json(form)): Valid<Json<TeamsForm>>,
) -> Result<Json<Vec<TeamSetupView>>, AppError> {
    Ok(Json(setup_service::edit_teams(&state, form).await?))
}

/// Questions of a round, with a transaction id for uploads and the edit.
#[utoipa::path(
    get,
    path = "/setup/rounds/{n}/questions",
    tag = "setup",
    params(("n" = u32, Path, description = "Round number")),
    responses(
        (status = 200, description = "Questions in round order", body = QuestionsView),
        (status = 404, description = "Round not defined")
    )
)]
pub async fn questions(
    State(state): State<SharedState>,
    Path(n_round): Path<u32>,
) -> Result<Json<QuestionsView>, AppError> {
    Ok(Json(setup_service::questions(&state, n_round).await?))
}

/// Edit the questions of a round, referencing uploaded media by name.
#[utoipa::path(
    put,
    path = "/setup/rounds/{n}/questions",
    tag = "setup",
    params(("n" = u32, Path, description = "Round number")),
    request_body = QuestionsForm,
    responses(
        (status = 200, description = "Questions saved; media bound in the background", body = QuestionsView),
        (status = 400, description = "Index out of sequence or bad media name"),
        (status = 404, description = "Round not defined")
    )
)]
pub async fn edit_questions(
    State(state): State<SharedState>,
    Path(n_round): Path<u32>,
    Valid(Json(form)): Valid<Json<QuestionsForm>>,
) -> Result<Json<QuestionsView>, AppError> {
    Ok(Json(setup_service::edit_questions(&state, n_round, form).await?))
}

/// Register a media file for a question edit.
#[utoipa::path(
    post,
    path = "/setup/uploads",
    tag = "setup",
    request_body = UploadRequest,
    responses((status = 200, description = "Upload accepted", body = UploadAck))
)]
pub async fn upload(
    State(state): State<SharedState>,
    Valid(Json(request)): Valid<Json<UploadRequest>>,
) -> Result<Json<UploadAck>, AppError> {
    Ok(Json(setup_service::upload(&state, request).await?))
}
