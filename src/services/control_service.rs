//! Controller actions: start, resume, step forward and back, slide changes and the periodic
//! controller poll.

use tracing::{debug, info};

use crate::{
    dto::display::{ControlIndex, ControlPath, ControlStart, ControlStep, ControlUpdate, DisplayReply},
    error::ServiceError,
    state::{
        SharedState,
        broker::{Puppet, Reply, Route, path_to_page},
        sequencer::{self, Sequencer},
    },
};

/// Page a controller is sent to when the quiz refers to a round that does not exist.
fn undefined_round() -> Reply {
    Reply::navigate(path_to_page(Route::QuizError, Puppet::CONTROLLER, 0, 0))
}

fn recover_undefined(result: Result<Reply, ServiceError>) -> Result<Reply, ServiceError> {
    match result {
        Err(ServiceError::NotFound(message)) => {
            info!(%message, "controller reached an undefined round");
            Ok(undefined_round())
        }
        other => other,
    }
}

/// Restart the quiz and open the welcome page.
pub async fn start(state: &SharedState, request: ControlStart) -> Result<ControlPath, ServiceError> {
    let path = state
        .update_all(|scope| {
            let href = Sequencer {
                quiz: scope.quiz,
                contest: scope.contest,
                records: scope.tx.records_mut(),
                slide_items: scope.config.slide_items,
            }
            .start(request.live);
            Ok(ControlPath {
                href,
                sync: scope.contest.sync.value(),
            })
        })
        .await?;

    state.cache_teams().await?;
    info!(live = request.live, "quiz started");
    Ok(path)
}

/// Reopen the controller on the current page.
pub async fn resume(state: &SharedState) -> Result<ControlPath, ServiceError> {
    let outcome = state
        .update_contest(|scope| {
            let href = sequencer::resume(
                scope.quiz,
                scope.contest,
                scope.tx.records(),
                scope.config.slide_items,
            )?;
            Ok(ControlPath {
                href,
                sync: scope.contest.sync.value(),
            })
        })
        .await;

    match outcome {
        Err(ServiceError::NotFound(message)) => {
            info!(%message, "resumed on an undefined round");
            let sync = state.read(|scope| scope.contest.sync.value()).await?;
            Ok(ControlPath {
                href: undefined_round().href,
                sync,
            })
        }
        other => other,
    }
}

/// Advance the quiz one page.
pub async fn next(state: &SharedState, request: ControlStep) -> Result<DisplayReply, ServiceError> {
    let reply = state
        .update_all(|scope| {
            Sequencer {
                quiz: scope.quiz,
                contest: scope.contest,
                records: scope.tx.records_mut(),
                slide_items: scope.config.slide_items,
            }
            .next(request.sync)
        })
        .await;
    let reply = recover_undefined(reply)?;
    debug!(href = %reply.href, "controller stepped forward");
    Ok(reply.into())
}

/// Step the quiz back one page.
pub async fn back(state: &SharedState, request: ControlStep) -> Result<DisplayReply, ServiceError> {
    let reply = state
        .update_all(|scope| {
            Sequencer {
                quiz: scope.quiz,
                contest: scope.contest,
                records: scope.tx.records_mut(),
                slide_items: scope.config.slide_items,
            }
            .back(request.sync)
        })
        .await;
    let reply = recover_undefined(reply)?;
    debug!(href = %reply.href, "controller stepped back");
    Ok(reply.into())
}

/// Record the slide the controller shows.
pub async fn index(state: &SharedState, request: ControlIndex) -> Result<DisplayReply, ServiceError> {
    let reply = state
        .update_contest(|scope| {
            Ok(sequencer::set_slide(
                scope.quiz,
                scope.contest,
                request.sync,
                request.index,
                request.touch_nav,
            ))
        })
        .await?;
    Ok(reply.into())
}

/// Periodic controller poll.
pub async fn update(state: &SharedState, request: ControlUpdate) -> Result<DisplayReply, ServiceError> {
    let reply = state
        .update_contest(|scope| {
            Ok(sequencer::controller_update(
                scope.quiz,
                scope.contest,
                request.update,
                request.second,
            ))
        })
        .await?;
    Ok(reply.into())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        dao::{
            models::{Page, RoundEntity, StaticPage, TeamEntity},
            quiz_store::{MemoryQuizStore, QuizStore},
            records::Records,
        },
        state::tests::test_state,
    };

    fn quiz_with_rounds(n_rounds: u32) -> Arc<MemoryQuizStore> {
        let mut records = Records::default();
        let (quiz, _) = records.ensure_quiz();
        for order in 1..=n_rounds {
            records.save_round(RoundEntity {
                id: 0,
                quiz: quiz.id,
                quiz_order: order,
                title: format!("Round {order}"),
                format: String::new(),
            });
        }
        records.save_team(TeamEntity {
            id: 0,
            quiz: quiz.id,
            name: "Owls".into(),
            access: "hoot".into(),
            rank: 1,
            total: 0.0,
        });
        Arc::new(MemoryQuizStore::with_records(records))
    }

    async fn sync(state: &SharedState) -> i64 {
        state.read(|scope| scope.contest.sync.value()).await.unwrap()
    }

    #[tokio::test]
    async fn start_then_next_opens_round_one() {
        let store = quiz_with_rounds(3);
        let (state, _rx) = test_state(store.clone()).await;

        let path = start(&state, ControlStart { live: true }).await.unwrap();
        assert_eq!(path.href, "/quiz-start/C/0");

        let reply = next(&state, ControlStep { sync: path.sync }).await.unwrap();
        assert_eq!(reply.href, "/quiz-questions/C/1");

        let records = store.snapshot().await.unwrap();
        let contest = records.contest().unwrap();
        assert_eq!(contest.current_page, Page::Questions);
        assert!(contest.live);
        assert_eq!(records.quiz().unwrap().response_round, 1);
    }

    #[tokio::test]
    async fn stale_step_resynchronises() {
        let (state, _rx) = test_state(quiz_with_rounds(3)).await;
        let path = start(&state, ControlStart { live: true }).await.unwrap();
        next(&state, ControlStep { sync: path.sync }).await.unwrap();

        // a second tap quoting the old revision must not skip a page
        let reply = next(&state, ControlStep { sync: path.sync }).await.unwrap();
        assert_eq!(reply.href, "/quiz-questions/C/1");
        let page = state
            .read(|scope| scope.contest.contest.current_page)
            .await
            .unwrap();
        assert_eq!(page, Page::Questions);
    }

    #[tokio::test]
    async fn undefined_round_reports_error_page() {
        let (state, _rx) = test_state(quiz_with_rounds(0)).await;
        let path = start(&state, ControlStart { live: true }).await.unwrap();

        let reply = next(&state, ControlStep { sync: path.sync }).await.unwrap();
        assert_eq!(reply.href, "/quiz-error/C/0");
        let (page, sub_page) = state
            .read(|scope| (scope.contest.contest.current_page, scope.contest.contest.current_static))
            .await
            .unwrap();
        assert_eq!((page, sub_page), (Page::Static, StaticPage::Start));
    }

    #[tokio::test]
    async fn resume_and_slide_index() {
        let (state, _rx) = test_state(quiz_with_rounds(2)).await;
        let path = start(&state, ControlStart { live: true }).await.unwrap();
        next(&state, ControlStep { sync: path.sync }).await.unwrap();

        let resumed = resume(&state).await.unwrap();
        assert_eq!(resumed.href, "/quiz-questions/C/1");

        let current = sync(&state).await;
        let reply = index(
            &state,
            ControlIndex {
                sync: current,
                index: 2,
                touch_nav: false,
            },
        )
        .await
        .unwrap();
        assert!(reply.href.is_empty());
        let (slide, touch) = state
            .read(|scope| {
                (
                    scope.contest.contest.current_index,
                    scope.contest.contest.touch_controller,
                )
            })
            .await
            .unwrap();
        assert_eq!((slide, touch), (2, false));
    }

    #[tokio::test]
    async fn back_from_first_questions_returns_to_welcome() {
        let (state, _rx) = test_state(quiz_with_rounds(2)).await;
        let path = start(&state, ControlStart { live: false }).await.unwrap();
        next(&state, ControlStep { sync: path.sync }).await.unwrap();

        let reply = back(&state, ControlStep { sync: sync(&state).await })
            .await
            .unwrap();
        assert_eq!(reply.href, "/quiz-start/C/0");
    }

    #[tokio::test]
    async fn controller_poll_rotates_tick() {
        let (state, _rx) = test_state(quiz_with_rounds(1)).await;
        start(&state, ControlStart { live: true }).await.unwrap();

        let reply = update(&state, ControlUpdate { update: 0, second: 15 })
            .await
            .unwrap();
        assert_eq!(reply.tick, "\\");
        let quiet = update(&state, ControlUpdate { update: 0, second: 16 })
            .await
            .unwrap();
        assert!(quiet.tick.is_empty());
    }
}
