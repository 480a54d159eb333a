//! Team response submission and the team's waiting page.

use tracing::info;

use crate::{
    dto::{
        ActionResponse,
        respond::{RespondRound, RespondWaitView, SubmitResponses},
    },
    error::ServiceError,
    state::{SharedState, broker::path_to_respond, scoring},
};

fn check_access(state: &SharedState, team_id: u64, access: &str) -> Result<(), ServiceError> {
    if state.team_access_ok(team_id, access) {
        Ok(())
    } else {
        Err(ServiceError::Unauthorized(format!(
            "team {team_id} access code rejected"
        )))
    }
}

/// Save a team's answers for a round.
pub async fn submit(
    state: &SharedState,
    team_id: u64,
    n_round: u32,
    request: SubmitResponses,
) -> Result<ActionResponse, ServiceError> {
    check_access(state, team_id, &request.access)?;

    let title = state
        .update_quiz(|scope| {
            scoring::edit_responses(
                scope.quiz,
                scope.tx.records_mut(),
                team_id,
                n_round,
                &request.answers,
            )
        })
        .await?;

    info!(team = team_id, round = n_round, "responses saved");
    Ok(ActionResponse::new(format!("Answers for {title} saved")))
}

/// Rounds a team may still answer or review: the current response round, plus the one before
/// it once the current round has been answered.
pub async fn wait_view(
    state: &SharedState,
    team_id: u64,
    access: &str,
) -> Result<RespondWaitView, ServiceError> {
    check_access(state, team_id, access)?;

    state
        .read(|scope| -> Result<RespondWaitView, ServiceError> {
            let team = scope
                .records
                .team(team_id)
                .ok_or_else(|| ServiceError::NotFound(format!("team {team_id}")))?;
            let current = scope.quiz.quiz.response_round;

            let answered = |n_round: u32| {
                scope
                    .records
                    .score_for(team_id, n_round)
                    .is_some_and(|score| score.responses > 0)
            };
            let limit = if current > 0 && answered(current) { 2 } else { 1 };

            let rounds = (1..=current)
                .rev()
                .take(limit)
                .filter_map(|n_round| {
                    scope.records.round_by_order(n_round).map(|round| RespondRound {
                        round: n_round,
                        title: round.title.clone(),
                        answered: answered(n_round),
                        href: path_to_respond(access, team_id, n_round),
                    })
                })
                .collect();

            Ok(RespondWaitView {
                team: team.name.clone(),
                rounds,
            })
        })
        .await?
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        dao::{
            models::{QuestionEntity, RoundEntity, TeamEntity},
            quiz_store::{MemoryQuizStore, QuizStore},
            records::Records,
        },
        state::tests::test_state,
    };

    struct Fixture {
        store: Arc<MemoryQuizStore>,
        team: u64,
    }

    fn open_round_two() -> Fixture {
        let mut records = Records::default();
        let (mut quiz, _) = records.ensure_quiz();
        quiz.response_round = 2;
        records.save_quiz(quiz.clone());
        for order in 1..=3 {
            let round = records.save_round(RoundEntity {
                id: 0,
                quiz: quiz.id,
                quiz_order: order,
                title: format!("Round {order}"),
                format: String::new(),
            });
            for q in 1..=2 {
                records.save_question(QuestionEntity {
                    id: 0,
                    round,
                    quiz_order: q,
                    question: format!("R{order}Q{q}"),
                    answer: String::new(),
                    media: None,
                });
            }
        }
        let team = records.save_team(TeamEntity {
            id: 0,
            quiz: quiz.id,
            name: "Owls".into(),
            access: "hoot".into(),
            rank: 1,
            total: 0.0,
        });
        Fixture {
            store: Arc::new(MemoryQuizStore::with_records(records)),
            team,
        }
    }

    fn answers(values: &[&str]) -> SubmitResponses {
        SubmitResponses {
            access: "hoot".into(),
            answers: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn submission_is_saved_and_listed() {
        let fixture = open_round_two();
        let (state, _rx) = test_state(fixture.store.clone()).await;

        let before = wait_view(&state, fixture.team, "hoot").await.unwrap();
        let rounds: Vec<u32> = before.rounds.iter().map(|r| r.round).collect();
        assert_eq!(rounds, vec![2]);

        let ack = submit(&state, fixture.team, 2, answers(&["Paris", "1066"]))
            .await
            .unwrap();
        assert_eq!(ack.message, "Answers for Round 2 saved");

        let after = wait_view(&state, fixture.team, "hoot").await.unwrap();
        let rounds: Vec<(u32, bool)> = after.rounds.iter().map(|r| (r.round, r.answered)).collect();
        assert_eq!(rounds, vec![(2, true), (1, false)]);
        assert_eq!(
            after.rounds[0].href,
            format!("/respond-round/hoot/{}/2", fixture.team)
        );

        let records = fixture.store.snapshot().await.unwrap();
        assert_eq!(records.score_for(fixture.team, 2).unwrap().responses, 2);
    }

    #[tokio::test]
    async fn wrong_access_is_unauthorized() {
        let fixture = open_round_two();
        let (state, _rx) = test_state(fixture.store).await;
        let mut request = answers(&["a", "b"]);
        request.access = "tweet".into();
        assert!(matches!(
            submit(&state, fixture.team, 2, request).await,
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn future_round_and_bad_count_rejected() {
        let fixture = open_round_two();
        let (state, _rx) = test_state(fixture.store.clone()).await;

        assert!(matches!(
            submit(&state, fixture.team, 3, answers(&["a", "b"])).await,
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            submit(&state, fixture.team, 2, answers(&["only one"])).await,
            Err(ServiceError::InvalidInput(_))
        ));
        let records = fixture.store.snapshot().await.unwrap();
        assert!(records.score_for(fixture.team, 2).is_none());
    }
}
