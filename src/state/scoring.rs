//! Score and rank engine: publishing rounds, per-question scoring and team totals.

use crate::{
    dao::{
        models::{Page, ResponseEntity, ScoreEntity},
        records::Records,
    },
    error::ServiceError,
    state::{
        contest::ContestCache,
        quiz::QuizCache,
        ranking::{Ranking, apply_tie_break, rank_full},
    },
};

/// Where the scores for a round being published come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreSource {
    /// Sum of per-question response scores.
    Responses,
    /// Round totals entered directly.
    Entered,
}

/// Scoring progress of one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionStatus {
    /// No team has a score.
    Unscored,
    /// Some teams have no score yet.
    Incomplete {
        /// Teams without a score.
        missing: u32,
    },
    /// Scored but not yet checked by a second scorer.
    Pending,
    /// Every score checked.
    Confirmed,
}

/// Rank every team through `n_round` from the stored scores.
///
/// Full rounds rank all teams by cumulative total; each tie-break round up to `n_round` then
/// adjusts ranks among the teams it scored.
pub fn rank(records: &Records, quiz: &QuizCache, n_round: u32) -> Ranking {
    let full = quiz.counts.full;

    let totals = records
        .totals_through(n_round.min(full))
        .into_iter()
        .filter_map(|(id, total)| records.team(id).map(|team| (id, team.name.clone(), total)))
        .collect();
    let mut ranking = rank_full(totals, quiz.quiz.n_winners, n_round == full);

    for n_tie in (full + 1)..=n_round {
        let scores: Vec<(u64, f64)> = records
            .scores_for_round(n_tie)
            .into_iter()
            .filter_map(|score| score.value.map(|value| (score.team, value)))
            .collect();
        ranking.is_tied = apply_tie_break(&mut ranking.standings, &scores);
    }
    ranking
}

/// Recompute and save team totals and ranks through `n_round`, and show the round to the
/// quizmaster. Safe to repeat and to call for an earlier round when stepping back.
pub fn calculate_totals_and_rank(
    quiz: &mut QuizCache,
    contest: &mut ContestCache,
    records: &mut Records,
    n_round: u32,
) {
    let ranking = rank(records, quiz, n_round);

    for standing in &ranking.standings {
        let Some(mut team) = records.team(standing.team).cloned() else {
            continue;
        };
        if team.rank != standing.rank || team.total != standing.total {
            team.rank = standing.rank;
            team.total = standing.total;
            records.save_team(team);
        }
    }

    contest.is_tied = ranking.is_tied;
    if contest.contest.quizmaster_round != n_round {
        contest.contest_mut().quizmaster_round = n_round;
    }

    quiz.changed_published();
    contest.changed_quizmaster();
}

/// Publish the scores for a round, returning a message for the scorer.
pub fn publish_round(
    quiz: &mut QuizCache,
    contest: &mut ContestCache,
    records: &mut Records,
    n_round: u32,
    source: ScoreSource,
) -> Result<String, ServiceError> {
    if n_round != quiz.quiz.scoring_round {
        return Err(ServiceError::InvalidState(format!(
            "Round {n_round} already published"
        )));
    }
    if n_round > quiz.counts.total() {
        return Err(ServiceError::InvalidState(
            "All rounds have been scored!".into(),
        ));
    }
    let full_round = n_round <= quiz.counts.full;

    match source {
        ScoreSource::Responses => {
            let round_id = records
                .round_by_order(n_round)
                .map(|round| round.id)
                .ok_or_else(|| ServiceError::NotFound(format!("round {n_round}")))?;

            if full_round {
                if records.count_responded(round_id) < quiz.n_teams {
                    return Err(ServiceError::InvalidState(
                        "Not all teams have responded yet".into(),
                    ));
                }
                let unchecked = records
                    .questions_for_round(round_id)
                    .into_iter()
                    .filter(|question| {
                        question_status(records, question.id, quiz.n_teams)
                            != QuestionStatus::Confirmed
                    })
                    .count();
                if unchecked > 0 {
                    return Err(ServiceError::InvalidState(format!(
                        "{unchecked} questions not checked yet"
                    )));
                }
            }

            for (team, total) in records.response_totals(round_id) {
                let score = match records.score_for(team, n_round) {
                    Some(existing) => ScoreEntity {
                        value: Some(total),
                        ..existing.clone()
                    },
                    None => ScoreEntity {
                        id: 0,
                        team,
                        round: n_round,
                        responses: 0,
                        value: Some(total),
                        confirmed: None,
                    },
                };
                records.save_score(score);
            }
        }
        ScoreSource::Entered => {
            if full_round {
                let missing: String = records
                    .teams_by_name()
                    .into_iter()
                    .filter(|team| {
                        records
                            .score_for(team.id, n_round)
                            .and_then(|score| score.value)
                            .is_none()
                    })
                    .map(|team| format!("{}, ", team.name))
                    .collect();
                if !missing.is_empty() {
                    return Err(ServiceError::InvalidState(format!("No score for: {missing}")));
                }
            }
        }
    }

    let s = &contest.contest;
    if s.current_round == n_round && matches!(s.current_page, Page::Answers | Page::ScoresWait) {
        // the controller is waiting for these scores
        calculate_totals_and_rank(quiz, contest, records, n_round);
    } else {
        contest.changed_quizmaster();
    }

    quiz.quiz_mut().scoring_round = n_round + 1;
    quiz.changed_scorer();

    Ok(format!("Round {n_round} published"))
}

/// Derive a question's scoring progress from its responses.
pub fn question_status(records: &Records, question_id: u64, n_teams: u32) -> QuestionStatus {
    let responses = records.responses_for_question(question_id);
    let scored: Vec<&&ResponseEntity> = responses
        .iter()
        .filter(|response| response.score.is_some())
        .collect();

    if scored.is_empty() {
        QuestionStatus::Unscored
    } else if (scored.len() as u32) < n_teams || scored.len() < responses.len() {
        let missing = n_teams.max(responses.len() as u32) - scored.len() as u32;
        QuestionStatus::Incomplete { missing }
    } else if scored
        .iter()
        .all(|response| response.confirmed == response.score)
    {
        QuestionStatus::Confirmed
    } else {
        QuestionStatus::Pending
    }
}

fn round_order_of_question(records: &Records, question_id: u64) -> Result<u32, ServiceError> {
    let question = records
        .question(question_id)
        .ok_or_else(|| ServiceError::NotFound(format!("question {question_id}")))?;
    records
        .round(question.round)
        .map(|round| round.quiz_order)
        .ok_or_else(|| ServiceError::NotFound(format!("round for question {question_id}")))
}

fn check_unpublished(quiz: &QuizCache, n_round: u32) -> Result<(), ServiceError> {
    if n_round < quiz.quiz.scoring_round {
        return Err(ServiceError::InvalidState(format!(
            "Round {n_round} already published"
        )));
    }
    Ok(())
}

/// Save a scorer's marks for a question's responses, keyed by response id. Returns the round.
pub fn score_question(
    quiz: &mut QuizCache,
    records: &mut Records,
    question_id: u64,
    marks: &[(u64, f64)],
) -> Result<u32, ServiceError> {
    let n_round = round_order_of_question(records, question_id)?;
    check_unpublished(quiz, n_round)?;

    let mut updated = Vec::with_capacity(marks.len());
    for (response_id, mark) in marks {
        let response = records
            .responses_for_question(question_id)
            .into_iter()
            .find(|response| response.id == *response_id)
            .ok_or_else(|| ServiceError::InvalidInput("Corrupt form".into()))?;
        if response.score != Some(*mark) {
            updated.push(ResponseEntity {
                score: Some(*mark),
                ..response.clone()
            });
        }
    }
    for response in updated {
        records.save_response(response);
    }

    quiz.changed_scorer();
    Ok(n_round)
}

/// Accept the current marks for a question as checked. Returns the round.
pub fn confirm_question(
    quiz: &mut QuizCache,
    records: &mut Records,
    question_id: u64,
) -> Result<u32, ServiceError> {
    let n_round = round_order_of_question(records, question_id)?;
    check_unpublished(quiz, n_round)?;

    let confirmed: Vec<ResponseEntity> = records
        .responses_for_question(question_id)
        .into_iter()
        .filter(|response| response.confirmed != response.score)
        .map(|response| ResponseEntity {
            confirmed: response.score,
            ..response.clone()
        })
        .collect();
    for response in confirmed {
        records.save_response(response);
    }

    quiz.changed_scorer();
    Ok(n_round)
}

/// Set or clear round scores entered directly. Re-ranks when the round was already published.
pub fn edit_scores(
    quiz: &mut QuizCache,
    contest: &mut ContestCache,
    records: &mut Records,
    n_round: u32,
    entries: &[(u64, Option<f64>)],
) -> Result<(), ServiceError> {
    if n_round == 0 || n_round > quiz.counts.total() {
        return Err(ServiceError::NotFound(format!("round {n_round}")));
    }

    for (team, value) in entries {
        if records.team(*team).is_none() {
            return Err(ServiceError::InvalidInput("Corrupt form".into()));
        }
        let existing = records.score_for(*team, n_round).cloned();
        match (value, existing) {
            (Some(value), Some(score)) => {
                if score.value != Some(*value) {
                    records.save_score(ScoreEntity {
                        value: Some(*value),
                        ..score
                    });
                }
            }
            (Some(value), None) => {
                records.save_score(ScoreEntity {
                    id: 0,
                    team: *team,
                    round: n_round,
                    responses: 0,
                    value: Some(*value),
                    confirmed: None,
                });
            }
            (None, Some(score))
                if n_round >= quiz.quiz.scoring_round || n_round > quiz.counts.full =>
            {
                // unpublished or tie-break scores can be withdrawn
                records.delete_score(score.id);
            }
            (None, _) => {}
        }
    }

    if n_round < quiz.quiz.scoring_round {
        let shown = contest.contest.quizmaster_round;
        calculate_totals_and_rank(quiz, contest, records, shown);
    } else {
        quiz.changed_scorer();
    }
    Ok(())
}

/// Save a team's answers for a round, returning the round title.
pub fn edit_responses(
    quiz: &mut QuizCache,
    records: &mut Records,
    team_id: u64,
    n_round: u32,
    values: &[String],
) -> Result<String, ServiceError> {
    let current = quiz.quiz.response_round;
    if n_round > current {
        return Err(ServiceError::InvalidInput("Wrong round number".into()));
    }
    let round = records
        .round_by_order(n_round)
        .cloned()
        .ok_or_else(|| ServiceError::NotFound(format!("round {n_round}")))?;
    if records.team(team_id).is_none() {
        return Err(ServiceError::NotFound(format!("team {team_id}")));
    }

    let slots: Vec<(u64, Option<ResponseEntity>)> = records
        .responses_for_team_round(team_id, round.id)
        .into_iter()
        .map(|(question, response)| (question.id, response.cloned()))
        .collect();
    if slots.len() != values.len() {
        return Err(ServiceError::InvalidInput("Corrupt form".into()));
    }

    for ((question, existing), value) in slots.into_iter().zip(values) {
        let response = match existing {
            Some(existing) => {
                if n_round != current {
                    return Err(ServiceError::InvalidState(
                        "Cannot change answers for an earlier round".into(),
                    ));
                }
                ResponseEntity {
                    value: value.clone(),
                    ..existing
                }
            }
            None => ResponseEntity {
                id: 0,
                question,
                team: team_id,
                value: value.clone(),
                score: None,
                confirmed: None,
            },
        };
        records.save_response(response);
    }

    let responses = values.len() as u32;
    let score = match records.score_for(team_id, n_round) {
        Some(existing) => ScoreEntity {
            responses,
            ..existing.clone()
        },
        None => ScoreEntity {
            id: 0,
            team: team_id,
            round: n_round,
            responses,
            value: None,
            confirmed: None,
        },
    };
    records.save_score(score);

    quiz.changed_response();
    Ok(round.title)
}

/// Discard all results and return every display to the start.
pub fn restart_quiz(quiz: &mut QuizCache, contest: &mut ContestCache, records: &mut Records) {
    let q = quiz.quiz_mut();
    q.response_round = 0;
    q.scoring_round = 1;
    quiz.changed_all();

    contest.restart();

    records.clear_responses();
    records.clear_scores();
    let teams: Vec<_> = records.teams_by_name().into_iter().cloned().collect();
    for mut team in teams {
        team.total = 0.0;
        team.rank = 1;
        records.save_team(team);
    }
}
