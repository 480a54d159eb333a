//! Scorer consoles: round and question status, the summary, marking and publishing.

use tracing::info;

use crate::{
    dao::models::Page,
    dto::{
        ActionResponse,
        scorer::{
            EditRoundScores, PublishRound, QuestionStatusView, ResponseView, RoundStatusView,
            ScoreQuestion, ScorerQuestionsView, ScorerRoundsView, SummaryTeam, SummaryView,
        },
    },
    error::ServiceError,
    state::{
        ReadScope, SharedState,
        scoring::{self, QuestionStatus},
    },
};

// ---------------------------------------------------------------------------
// Read-only projections
// ---------------------------------------------------------------------------

fn round_status(scope: &ReadScope<'_>, n_round: u32, round_id: u64) -> String {
    let quiz = scope.quiz;
    let scoring_round = quiz.quiz.scoring_round;
    if n_round < scoring_round {
        return "Scored".into();
    }
    if n_round > scoring_round || n_round > quiz.quiz.response_round {
        return String::new();
    }
    if !scope.config.online {
        return "Ready to score".into();
    }

    let s = &scope.contest.contest;
    if s.current_page == Page::Questions && s.current_round == n_round {
        return "Final answers allowed".into();
    }

    let responded = scope.records.count_responded(round_id);
    if n_round <= quiz.counts.full && responded < quiz.n_teams {
        return format!("Waiting on {} teams", quiz.n_teams - responded);
    }

    let (mut to_score, mut to_check) = (0, 0);
    for question in scope.records.questions_for_round(round_id) {
        match scoring::question_status(scope.records, question.id, quiz.n_teams) {
            QuestionStatus::Unscored | QuestionStatus::Incomplete { .. } => to_score += 1,
            QuestionStatus::Pending => to_check += 1,
            QuestionStatus::Confirmed => {}
        }
    }
    if to_score > 0 {
        format!("Score {to_score} questions")
    } else if to_check > 0 {
        format!("Check {to_check} questions")
    } else {
        "All checked".into()
    }
}

/// Status of every round for the scorers.
pub async fn rounds(state: &SharedState) -> Result<ScorerRoundsView, ServiceError> {
    state
        .read(|scope| {
            let rounds = scope
                .records
                .rounds()
                .into_iter()
                .map(|round| RoundStatusView {
                    round: round.quiz_order,
                    title: round.title.clone(),
                    status: round_status(scope, round.quiz_order, round.id),
                })
                .collect();
            ScorerRoundsView {
                scoring_round: scope.quiz.quiz.scoring_round,
                rounds,
                update: scope.quiz.revisions.scorer.value(),
            }
        })
        .await
}

fn status_label(status: QuestionStatus) -> String {
    match status {
        QuestionStatus::Unscored => "Unscored".into(),
        QuestionStatus::Incomplete { missing } => format!("{missing} to score"),
        QuestionStatus::Pending => "Check".into(),
        QuestionStatus::Confirmed => "Checked".into(),
    }
}

/// Questions of a round with their responses and scoring status.
pub async fn questions(state: &SharedState, n_round: u32) -> Result<ScorerQuestionsView, ServiceError> {
    state
        .read(|scope| -> Result<ScorerQuestionsView, ServiceError> {
            let records = scope.records;
            let round = records
                .round_by_order(n_round)
                .ok_or_else(|| ServiceError::NotFound(format!("round {n_round} is not defined")))?;

            let questions = records
                .questions_for_round(round.id)
                .into_iter()
                .map(|question| {
                    let responses = records
                        .responses_for_question(question.id)
                        .into_iter()
                        .map(|response| ResponseView {
                            id: response.id,
                            team: records
                                .team(response.team)
                                .map(|team| team.name.clone())
                                .unwrap_or_default(),
                            value: response.value.clone(),
                            score: response.score,
                            confirmed: response.confirmed,
                        })
                        .collect();
                    QuestionStatusView {
                        id: question.id,
                        order: question.quiz_order,
                        question: question.question.clone(),
                        answer: question.answer.clone(),
                        status: status_label(scoring::question_status(
                            records,
                            question.id,
                            scope.quiz.n_teams,
                        )),
                        responses,
                    }
                })
                .collect();

            Ok(ScorerQuestionsView {
                round: n_round,
                title: round.title.clone(),
                published: n_round < scope.quiz.quiz.scoring_round,
                questions,
                update: scope.quiz.revisions.scorer.value(),
            })
        })
        .await?
}

/// Round scores and ranks, tie-breaks included, for every published round.
pub async fn summary(state: &SharedState) -> Result<SummaryView, ServiceError> {
    state
        .read(|scope| {
            let records = scope.records;
            let published = scope.quiz.quiz.scoring_round.saturating_sub(1);
            let ranking = scoring::rank(records, scope.quiz, published);

            let teams = records
                .teams_by_name()
                .into_iter()
                .map(|team| {
                    let scores = (1..=published)
                        .map(|n_round| records.score_for(team.id, n_round).and_then(|s| s.value))
                        .collect();
                    let standing = ranking.standings.iter().find(|s| s.team == team.id);
                    SummaryTeam {
                        name: team.name.clone(),
                        scores,
                        total: standing.map(|s| s.total).unwrap_or_default(),
                        rank: standing.map(|s| s.rank).unwrap_or(1),
                    }
                })
                .collect();

            SummaryView {
                rounds: published,
                teams,
                is_tied: ranking.is_tied,
            }
        })
        .await
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

/// Save marks for a question's responses.
pub async fn score_question(
    state: &SharedState,
    question_id: u64,
    request: ScoreQuestion,
) -> Result<ActionResponse, ServiceError> {
    let marks: Vec<(u64, f64)> = request
        .marks
        .iter()
        .map(|mark| (mark.response, mark.score))
        .collect();
    let n_round = state
        .update_quiz(|scope| {
            scoring::score_question(scope.quiz, scope.tx.records_mut(), question_id, &marks)
        })
        .await?;
    Ok(ActionResponse::new(format!(
        "Question {question_id} of round {n_round} marked"
    )))
}

/// Accept a question's marks as checked.
pub async fn confirm_question(
    state: &SharedState,
    question_id: u64,
) -> Result<ActionResponse, ServiceError> {
    let n_round = state
        .update_quiz(|scope| {
            scoring::confirm_question(scope.quiz, scope.tx.records_mut(), question_id)
        })
        .await?;
    Ok(ActionResponse::new(format!(
        "Question {question_id} of round {n_round} checked"
    )))
}

/// Enter or withdraw round scores directly.
pub async fn edit_scores(
    state: &SharedState,
    n_round: u32,
    request: EditRoundScores,
) -> Result<ActionResponse, ServiceError> {
    let entries: Vec<(u64, Option<f64>)> = request
        .scores
        .iter()
        .map(|entry| (entry.team, entry.score))
        .collect();
    state
        .update_all(|scope| {
            scoring::edit_scores(
                scope.quiz,
                scope.contest,
                scope.tx.records_mut(),
                n_round,
                &entries,
            )
        })
        .await?;
    Ok(ActionResponse::new(format!("Scores for round {n_round} saved")))
}

/// Publish a round's scores.
pub async fn publish(
    state: &SharedState,
    n_round: u32,
    request: PublishRound,
) -> Result<ActionResponse, ServiceError> {
    let message = state
        .update_all(|scope| {
            scoring::publish_round(
                scope.quiz,
                scope.contest,
                scope.tx.records_mut(),
                n_round,
                request.source.into(),
            )
        })
        .await?;
    info!(round = n_round, "round published");
    Ok(ActionResponse::new(message))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        dao::{
            models::{QuestionEntity, ResponseEntity, RoundEntity, ScoreEntity, TeamEntity},
            quiz_store::MemoryQuizStore,
            records::Records,
        },
        dto::scorer::{PublishSource, ResponseMark, TeamScoreEntry},
        state::tests::test_state,
    };

    struct Fixture {
        store: Arc<MemoryQuizStore>,
        questions: Vec<u64>,
        teams: Vec<u64>,
        /// responses[question][team]
        responses: Vec<Vec<u64>>,
    }

    fn answered_round() -> Fixture {
        let mut records = Records::default();
        let (mut quiz, _) = records.ensure_quiz();
        quiz.response_round = 1;
        records.save_quiz(quiz.clone());
        let round = records.save_round(RoundEntity {
            id: 0,
            quiz: quiz.id,
            quiz_order: 1,
            title: "General".into(),
            format: String::new(),
        });
        let questions: Vec<u64> = (1..=2)
            .map(|order| {
                records.save_question(QuestionEntity {
                    id: 0,
                    round,
                    quiz_order: order,
                    question: format!("Q{order}"),
                    answer: format!("A{order}"),
                    media: None,
                })
            })
            .collect();
        let teams: Vec<u64> = ["Ants", "Bees"]
            .iter()
            .map(|name| {
                records.save_team(TeamEntity {
                    id: 0,
                    quiz: quiz.id,
                    name: name.to_string(),
                    access: format!("{name}-code"),
                    rank: 1,
                    total: 0.0,
                })
            })
            .collect();
        let responses: Vec<Vec<u64>> = questions
            .iter()
            .map(|question| {
                teams
                    .iter()
                    .map(|team| {
                        records.save_response(ResponseEntity {
                            id: 0,
                            question: *question,
                            team: *team,
                            value: "guess".into(),
                            score: None,
                            confirmed: None,
                        })
                    })
                    .collect()
            })
            .collect();
        for team in &teams {
            records.save_score(ScoreEntity {
                id: 0,
                team: *team,
                round: 1,
                responses: 2,
                value: None,
                confirmed: None,
            });
        }
        Fixture {
            store: Arc::new(MemoryQuizStore::with_records(records)),
            questions,
            teams,
            responses,
        }
    }

    fn marks(fixture: &Fixture, question: usize, scores: [f64; 2]) -> ScoreQuestion {
        ScoreQuestion {
            marks: fixture.responses[question]
                .iter()
                .zip(scores)
                .map(|(response, score)| ResponseMark {
                    response: *response,
                    score,
                })
                .collect(),
        }
    }

    async fn status_of_round_one(state: &SharedState) -> String {
        rounds(state).await.unwrap().rounds[0].status.clone()
    }

    #[tokio::test]
    async fn marking_checking_and_publishing() {
        let fixture = answered_round();
        let (state, _rx) = test_state(fixture.store.clone()).await;
        assert_eq!(status_of_round_one(&state).await, "Score 2 questions");

        score_question(&state, fixture.questions[0], marks(&fixture, 0, [1.0, 0.0]))
            .await
            .unwrap();
        let view = questions(&state, 1).await.unwrap();
        assert_eq!(view.questions[0].status, "Check");
        assert_eq!(view.questions[1].status, "Unscored");

        let early = publish(
            &state,
            1,
            PublishRound {
                source: PublishSource::Responses,
            },
        )
        .await;
        assert!(matches!(early, Err(ServiceError::InvalidState(_))));

        score_question(&state, fixture.questions[1], marks(&fixture, 1, [1.0, 0.5]))
            .await
            .unwrap();
        assert_eq!(status_of_round_one(&state).await, "Check 2 questions");
        for question in &fixture.questions {
            confirm_question(&state, *question).await.unwrap();
        }
        assert_eq!(status_of_round_one(&state).await, "All checked");

        let published = publish(
            &state,
            1,
            PublishRound {
                source: PublishSource::Responses,
            },
        )
        .await
        .unwrap();
        assert_eq!(published.message, "Round 1 published");
        assert_eq!(status_of_round_one(&state).await, "Scored");

        let summary = summary(&state).await.unwrap();
        assert_eq!(summary.rounds, 1);
        let lines: Vec<(&str, Vec<Option<f64>>, u32)> = summary
            .teams
            .iter()
            .map(|t| (t.name.as_str(), t.scores.clone(), t.rank))
            .collect();
        assert_eq!(
            lines,
            vec![("Ants", vec![Some(2.0)], 1), ("Bees", vec![Some(0.5)], 2)]
        );

        // published rounds are closed to marking
        assert!(matches!(
            score_question(&state, fixture.questions[0], marks(&fixture, 0, [0.0, 0.0])).await,
            Err(ServiceError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn entered_scores_must_cover_every_team() {
        let fixture = answered_round();
        let (state, _rx) = test_state(fixture.store.clone()).await;

        edit_scores(
            &state,
            1,
            EditRoundScores {
                scores: vec![TeamScoreEntry {
                    team: fixture.teams[0],
                    score: Some(7.0),
                }],
            },
        )
        .await
        .unwrap();
        let missing = publish(
            &state,
            1,
            PublishRound {
                source: PublishSource::Entered,
            },
        )
        .await;
        match missing {
            Err(ServiceError::InvalidState(message)) => assert_eq!(message, "No score for: Bees, "),
            other => panic!("unexpected {other:?}"),
        }

        edit_scores(
            &state,
            1,
            EditRoundScores {
                scores: vec![TeamScoreEntry {
                    team: fixture.teams[1],
                    score: Some(3.0),
                }],
            },
        )
        .await
        .unwrap();
        publish(
            &state,
            1,
            PublishRound {
                source: PublishSource::Entered,
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn unknown_round_is_not_found() {
        let fixture = answered_round();
        let (state, _rx) = test_state(fixture.store).await;
        assert!(matches!(
            questions(&state, 4).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            edit_scores(&state, 4, EditRoundScores { scores: Vec::new() }).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
