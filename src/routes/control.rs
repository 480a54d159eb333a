use axum::{Json, Router, extract::State, routing::post};

use crate::{
    dto::display::{ControlIndex, ControlPath, ControlStart, ControlStep, ControlUpdate, DisplayReply},
    error::AppError,
    services::control_service,
    state::SharedState,
};

/// Controller endpoints driving the quiz from page to page.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/control/start", post(start))
        .route("/control/resume", post(resume))
        .route("/control/next", post(next))
        .route("/control/back", post(back))
        .route("/control/index", post(index))
        .route("/control/update", post(update))
}

/// Restart the quiz on the welcome page.
#[utoipa::path(
    post,
    path = "/control/start",
    tag = "control",
    request_body = ControlStart,
    responses((status = 200, description = "Quiz restarted", body = ControlPath))
)]
pub async fn start(
    State(state): State<SharedState>,
    Json(request): Json<ControlStart>,
) -> Result<Json<ControlPath>, AppError> {
    Ok(Json(control_service::start(&state, request).await?))
}

/// Reopen the controller where the quiz left off.
#[utoipa::path(
    post,
    path = "/control/resume",
    tag = "control",
    responses((status = 200, description = "Current controller page", body = ControlPath))
)]
pub async fn resume(State(state): State<SharedState>) -> Result<Json<ControlPath>, AppError> {
    Ok(Json(control_service::resume(&state).await?))
}

/// Step forward one page or slide.
#[utoipa::path(
    post,
    path = "/control/next",
    tag = "control",
    request_body = ControlStep,
    responses((status = 200, description = "Next page", body = DisplayReply))
)]
pub async fn next(
    State(state): State<SharedState>,
    Json(request): Json<ControlStep>,
) -> Result<Json<DisplayReply>, AppError> {
    Ok(Json(control_service::next(&state, request).await?))
}

/// Step back one page or slide.
#[utoipa::path(
    post,
    path = "/control/back",
    tag = "control",
    request_body = ControlStep,
    responses((status = 200, description = "Previous page", body = DisplayReply))
)]
pub async fn back(
    State(state): State<SharedState>,
    Json(request): Json<ControlStep>,
) -> Result<Json<DisplayReply>, AppError> {
    Ok(Json(control_service::back(&state, request).await?))
}

/// Record the slide shown on the controller.
#[utoipa::path(
    post,
    path = "/control/index",
    tag = "control",
    request_body = ControlIndex,
    responses((status = 200, description = "Slide recorded", body = DisplayReply))
)]
pub async fn index(
    State(state): State<SharedState>,
    Json(request): Json<ControlIndex>,
) -> Result<Json<DisplayReply>, AppError> {
    Ok(Json(control_service::index(&state, request).await?))
}

/// Periodic controller poll.
#[utoipa::path(
    post,
    path = "/control/update",
    tag = "control",
    request_body = ControlUpdate,
    responses((status = 200, description = "Navigation and status tick", body = DisplayReply))
)]
pub async fn update(
    State(state): State<SharedState>,
    Json(request): Json<ControlUpdate>,
) -> Result<Json<DisplayReply>, AppError> {
    Ok(Json(control_service::update(&state, request).await?))
}
