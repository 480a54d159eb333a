use axum::Router;

use crate::state::SharedState;

/// Controller stepping.
pub mod control;
/// Display polling and page views.
pub mod display;
/// OpenAPI document and Swagger UI.
pub mod docs;
/// Liveness.
pub mod health;
/// Team responses.
pub mod respond;
/// Scorer consoles.
pub mod scorer;
/// Quiz setup forms.
pub mod setup;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(control::router())
        .merge(display::router())
        .merge(respond::router())
        .merge(scorer::router())
        .merge(setup::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
