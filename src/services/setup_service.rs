//! Quiz setup: settings, rounds, teams, questions and media uploads.
//!
//! Child lists are edited by 1-based index in display order. Children past the end of the
//! submitted list are kept as they are; an index out of sequence rejects the whole form.

use rand::{Rng, distr::Alphanumeric};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::{
        models::{MediaRef, QuestionEntity, RoundEntity, TeamEntity, TxId},
        records::Records,
    },
    dto::setup::{
        QuestionSetupView, QuestionsForm, QuestionsView, QuizSettings, RoundSetupView, RoundsForm,
        TeamSetupView, TeamsForm, UploadAck, UploadRequest,
    },
    error::ServiceError,
    services::round_worker::RoundUpdate,
    state::{
        SharedState,
        contest::ContestCache,
        format::RoundFormat,
        scoring::restart_quiz,
        sequencer::set_prompts,
    },
};

const ACCESS_CODE_LEN: usize = 6;

fn check_sequence(indices: impl Iterator<Item = u32>) -> Result<(), ServiceError> {
    for (position, index) in indices.enumerate() {
        if index as usize != position + 1 {
            return Err(ServiceError::InvalidInput(format!(
                "child index {index} out of sequence"
            )));
        }
    }
    Ok(())
}

fn refresh_format(contest: &mut ContestCache, records: &Records, slide_items: usize) {
    if let Some(round) = records.round_by_order(contest.contest.current_round) {
        contest.format = RoundFormat::decode(&round.format, slide_items);
    }
}

// ---------------------------------------------------------------------------
// Quiz settings
// ---------------------------------------------------------------------------

fn settings_of(quiz: &crate::dao::models::QuizEntity) -> QuizSettings {
    QuizSettings {
        title: quiz.title.clone(),
        organiser: quiz.organiser.clone(),
        n_tie_breakers: quiz.n_tie_breakers,
        n_deferred: quiz.n_deferred,
        n_final_scores: quiz.n_final_scores,
        n_winners: quiz.n_winners,
        access: quiz.access.clone(),
        refresh: quiz.refresh,
    }
}

/// Current quiz settings.
pub async fn quiz_settings(state: &SharedState) -> Result<QuizSettings, ServiceError> {
    state.read(|scope| settings_of(&scope.quiz.quiz)).await
}

/// Save quiz settings and recompute the round counts.
pub async fn edit_quiz(
    state: &SharedState,
    settings: QuizSettings,
) -> Result<QuizSettings, ServiceError> {
    state
        .update_all(|scope| {
            let q = scope.quiz.quiz_mut();
            q.title = settings.title;
            q.organiser = settings.organiser;
            q.n_tie_breakers = settings.n_tie_breakers;
            q.n_deferred = settings.n_deferred;
            q.n_final_scores = settings.n_final_scores;
            q.n_winners = settings.n_winners;
            q.access = settings.access;
            q.refresh = settings.refresh;

            scope.quiz.set_num_rounds(scope.tx.records().count_rounds());
            scope.quiz.changed_all();
            scope.contest.changed_sync();
            set_prompts(scope.quiz, scope.contest);
            Ok(settings_of(&scope.quiz.quiz))
        })
        .await
}

// ---------------------------------------------------------------------------
// Rounds
// ---------------------------------------------------------------------------

fn round_views(records: &Records) -> Vec<RoundSetupView> {
    records
        .rounds()
        .into_iter()
        .map(|round| RoundSetupView {
            index: round.quiz_order,
            title: round.title.clone(),
            format: round.format.clone(),
        })
        .collect()
}

/// Rounds in quiz order.
pub async fn rounds(state: &SharedState) -> Result<Vec<RoundSetupView>, ServiceError> {
    state.read(|scope| round_views(scope.records)).await
}

/// Transaction of the pending media of a round, if an edit left any.
fn pending_tx(records: &Records, round_id: u64) -> Option<TxId> {
    records
        .questions_for_round(round_id)
        .into_iter()
        .find_map(|question| match &question.media {
            Some(MediaRef::Pending { tx, .. }) => Some(*tx),
            _ => None,
        })
}

/// Keep, add or delete rounds. Removing a round restarts the quiz.
pub async fn edit_rounds(
    state: &SharedState,
    form: RoundsForm,
) -> Result<Vec<RoundSetupView>, ServiceError> {
    let (views, updates) = state
        .update_all(|scope| {
            check_sequence(form.rounds.iter().map(|edit| edit.index))?;
            let quiz_id = scope.quiz.quiz.id;
            let records = scope.tx.records_mut();
            let existing: Vec<RoundEntity> = records.rounds().into_iter().cloned().collect();

            let mut updates = Vec::new();
            let mut order = 0;
            for (edit, slot) in form
                .rounds
                .iter()
                .map(|edit| (edit, existing.get(edit.index as usize - 1)))
            {
                match (slot, edit.delete) {
                    (Some(round), true) => {
                        let tx = pending_tx(records, round.id).unwrap_or_else(Uuid::new_v4);
                        // media cleanup for the removed questions
                        updates.push(RoundUpdate::record(records, round.id, tx)?);
                        records.delete_round(round.id);
                    }
                    (Some(round), false) => {
                        order += 1;
                        records.save_round(RoundEntity {
                            quiz_order: order,
                            title: edit.title.clone(),
                            format: edit.format.clone(),
                            ..round.clone()
                        });
                    }
                    (None, true) => {}
                    (None, false) => {
                        order += 1;
                        records.save_round(RoundEntity {
                            id: 0,
                            quiz: quiz_id,
                            quiz_order: order,
                            title: edit.title.clone(),
                            format: edit.format.clone(),
                        });
                    }
                }
            }
            for round in existing.iter().skip(form.rounds.len()) {
                order += 1;
                records.save_round(RoundEntity {
                    quiz_order: order,
                    ..round.clone()
                });
            }

            if !updates.is_empty() {
                restart_quiz(scope.quiz, scope.contest, records);
                scope.contest.changed_sync();
            }
            scope.quiz.set_num_rounds(records.count_rounds());
            refresh_format(scope.contest, records, scope.config.slide_items);
            set_prompts(scope.quiz, scope.contest);
            Ok((round_views(records), updates))
        })
        .await?;

    if !updates.is_empty() {
        info!(removed = updates.len(), "rounds removed; quiz restarted");
    }
    for update in updates {
        state.enqueue_round_update(update);
    }
    Ok(views)
}

// ---------------------------------------------------------------------------
// Teams
// ---------------------------------------------------------------------------

fn team_views(records: &Records) -> Vec<TeamSetupView> {
    records
        .teams_by_name()
        .into_iter()
        .zip(1..)
        .map(|(team, index)| TeamSetupView {
            index,
            id: team.id,
            name: team.name.clone(),
            access: team.access.clone(),
        })
        .collect()
}

/// Teams in name order, with their access codes.
pub async fn teams(state: &SharedState) -> Result<Vec<TeamSetupView>, ServiceError> {
    state.read(|scope| team_views(scope.records)).await
}

/// Random access code not used by any other team.
fn access_code(records: &Records) -> String {
    let mut rng = rand::rng();
    loop {
        let code: String = (&mut rng)
            .sample_iter(Alphanumeric)
            .take(ACCESS_CODE_LEN)
            .map(|byte| char::from(byte).to_ascii_lowercase())
            .collect();
        if records.teams_by_name().iter().all(|team| team.access != code) {
            return code;
        }
    }
}

/// Keep, add or delete teams.
pub async fn edit_teams(
    state: &SharedState,
    form: TeamsForm,
) -> Result<Vec<TeamSetupView>, ServiceError> {
    let (views, removed, added) = state
        .update_all(|scope| {
            check_sequence(form.teams.iter().map(|edit| edit.index))?;
            let quiz_id = scope.quiz.quiz.id;
            let records = scope.tx.records_mut();
            let existing: Vec<TeamEntity> = records.teams_by_name().into_iter().cloned().collect();

            let mut removed = Vec::new();
            let mut added = 0;
            for edit in &form.teams {
                match (existing.get(edit.index as usize - 1), edit.delete) {
                    (Some(team), true) => {
                        records.delete_team(team.id);
                        removed.push(team.id);
                    }
                    (Some(team), false) => {
                        if team.name != edit.name {
                            records.save_team(TeamEntity {
                                name: edit.name.clone(),
                                ..team.clone()
                            });
                        }
                    }
                    (None, true) => {}
                    (None, false) => {
                        let access = access_code(records);
                        records.save_team(TeamEntity {
                            id: 0,
                            quiz: quiz_id,
                            name: edit.name.clone(),
                            access,
                            rank: 1,
                            total: 0.0,
                        });
                        added += 1;
                    }
                }
            }

            if !removed.is_empty() {
                scope.quiz.changed_all();
                scope.contest.changed_sync();
            }
            scope.quiz.n_teams = records.count_teams();
            Ok((team_views(records), removed, added))
        })
        .await?;

    for team in &removed {
        state.forget_team(*team);
    }
    if added > 0 {
        state.cache_teams().await?;
    }
    info!(added, removed = removed.len(), "teams edited");
    Ok(views)
}

// ---------------------------------------------------------------------------
// Questions
// ---------------------------------------------------------------------------

fn questions_view(records: &Records, round: &RoundEntity, tx: TxId) -> QuestionsView {
    let questions = records
        .questions_for_round(round.id)
        .into_iter()
        .zip(1..)
        .map(|(question, index)| QuestionSetupView {
            index,
            question: question.question.clone(),
            answer: question.answer.clone(),
            media: question.media.as_ref().map(|media| media.name().to_string()),
        })
        .collect();
    QuestionsView {
        round: round.quiz_order,
        title: round.title.clone(),
        tx,
        questions,
    }
}

/// Questions of a round, with a fresh transaction id for the edit.
pub async fn questions(state: &SharedState, n_round: u32) -> Result<QuestionsView, ServiceError> {
    state
        .read(|scope| -> Result<QuestionsView, ServiceError> {
            let round = scope
                .records
                .round_by_order(n_round)
                .ok_or_else(|| ServiceError::NotFound(format!("round {n_round} is not defined")))?;
            Ok(questions_view(scope.records, round, Uuid::new_v4()))
        })
        .await?
}

/// Media reference after an edit: unchanged names keep their reference, new names wait for
/// the worker to bind the upload.
fn edited_media(existing: Option<&MediaRef>, name: Option<&str>, tx: TxId) -> Option<MediaRef> {
    let name = name?;
    match existing {
        Some(media) if media.name() == name => Some(media.clone()),
        _ => Some(MediaRef::Pending {
            tx,
            name: name.to_string(),
        }),
    }
}

/// Keep, add or delete a round's questions and queue their media for binding.
pub async fn edit_questions(
    state: &SharedState,
    n_round: u32,
    form: QuestionsForm,
) -> Result<QuestionsView, ServiceError> {
    let tx = form.tx;
    let (view, update) = state
        .update_quiz(|scope| {
            check_sequence(form.questions.iter().map(|edit| edit.index))?;
            let records = scope.tx.records_mut();
            let round = records
                .round_by_order(n_round)
                .cloned()
                .ok_or_else(|| ServiceError::NotFound(format!("round {n_round} is not defined")))?;
            let existing: Vec<QuestionEntity> = records
                .questions_for_round(round.id)
                .into_iter()
                .cloned()
                .collect();

            let mut order = 0;
            for edit in &form.questions {
                match (existing.get(edit.index as usize - 1), edit.delete) {
                    (Some(question), true) => {
                        records.delete_question(question.id);
                    }
                    (Some(question), false) => {
                        order += 1;
                        records.save_question(QuestionEntity {
                            quiz_order: order,
                            question: edit.question.clone(),
                            answer: edit.answer.clone(),
                            media: edited_media(question.media.as_ref(), edit.media.as_deref(), tx),
                            ..question.clone()
                        });
                    }
                    (None, true) => {}
                    (None, false) => {
                        order += 1;
                        records.save_question(QuestionEntity {
                            id: 0,
                            round: round.id,
                            quiz_order: order,
                            question: edit.question.clone(),
                            answer: edit.answer.clone(),
                            media: edited_media(None, edit.media.as_deref(), tx),
                        });
                    }
                }
            }
            for question in existing.iter().skip(form.questions.len()) {
                order += 1;
                records.save_question(QuestionEntity {
                    quiz_order: order,
                    ..question.clone()
                });
            }

            let update = RoundUpdate::record(records, round.id, tx)?;
            scope.quiz.changed_scorer();
            Ok((questions_view(records, &round, Uuid::new_v4()), update))
        })
        .await?;

    info!(round = n_round, tx = %tx, "questions edited");
    state.enqueue_round_update(update);
    Ok(view)
}

// ---------------------------------------------------------------------------
// Uploads
// ---------------------------------------------------------------------------

/// Accept a media file for a question edit. Files are processed as they arrive.
///
/// An edit already committed under the same transaction, for instance one recovered after a
/// restart, is handed to the worker again so it can bind the file.
pub async fn upload(state: &SharedState, request: UploadRequest) -> Result<UploadAck, ServiceError> {
    let uploads = state.uploads();
    uploads.begin_upload(request.tx, &request.name);
    let version = uploads.finish_upload(request.tx, &request.name);
    info!(tx = %request.tx, name = %request.name, version, "media uploaded");

    let waiting = state
        .read(|scope| RoundUpdate::pending(scope.records))
        .await?
        .into_iter()
        .filter(|update| update.tx == request.tx);
    for update in waiting {
        debug!(op = %update.op_id, "round update redelivered after upload");
        state.enqueue_round_update(update);
    }

    Ok(UploadAck {
        name: request.name,
        version,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        dao::{
            models::{ResponseEntity, ScoreEntity},
            quiz_store::{MemoryQuizStore, QuizStore},
        },
        dto::setup::{QuestionEdit, RoundEdit, TeamEdit},
        services::round_worker,
        state::tests::test_state,
    };

    fn round(index: u32, title: &str) -> RoundEdit {
        RoundEdit {
            index,
            title: title.into(),
            format: String::new(),
            delete: false,
        }
    }

    fn team(index: u32, name: &str, delete: bool) -> TeamEdit {
        TeamEdit {
            index,
            name: name.into(),
            delete,
        }
    }

    fn question(index: u32, text: &str, media: Option<&str>) -> QuestionEdit {
        QuestionEdit {
            index,
            question: text.into(),
            answer: format!("{text}?"),
            media: media.map(str::to_string),
            delete: false,
        }
    }

    async fn with_rounds(state: &SharedState, titles: &[&str]) {
        let rounds = titles
            .iter()
            .zip(1..)
            .map(|(title, index)| round(index, title))
            .collect();
        edit_rounds(state, RoundsForm { rounds }).await.unwrap();
    }

    #[tokio::test]
    async fn rounds_added_and_counted() {
        let store = Arc::new(MemoryQuizStore::new());
        let (state, _rx) = test_state(store).await;
        with_rounds(&state, &["Music", "Sport", "Tie"]).await;

        let titles: Vec<String> = rounds(&state).await.unwrap().into_iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["Music", "Sport", "Tie"]);

        let mut settings = quiz_settings(&state).await.unwrap();
        settings.n_tie_breakers = 1;
        edit_quiz(&state, settings).await.unwrap();
        let counts = state.read(|scope| scope.quiz.counts).await.unwrap();
        assert_eq!((counts.full, counts.tie), (2, 1));
    }

    #[tokio::test]
    async fn out_of_sequence_index_rejected() {
        let store = Arc::new(MemoryQuizStore::new());
        let (state, _rx) = test_state(store.clone()).await;
        with_rounds(&state, &["Music"]).await;

        let result = edit_rounds(
            &state,
            RoundsForm {
                rounds: vec![round(1, "Music"), round(3, "Lost")],
            },
        )
        .await;
        assert!(matches!(result, Err(ServiceError::InvalidInput(_))));
        assert_eq!(store.snapshot().await.unwrap().count_rounds(), 1);
    }

    #[tokio::test]
    async fn removing_a_round_restarts_and_queues_cleanup() {
        let store = Arc::new(MemoryQuizStore::new());
        let (state, mut rx) = test_state(store.clone()).await;
        with_rounds(&state, &["One", "Two", "Three"]).await;
        let (team, question) = state
            .update_quiz(|scope| {
                scope.quiz.quiz_mut().scoring_round = 3;
                let records = scope.tx.records_mut();
                let first = records.round_by_order(1).unwrap().id;
                let team = records.save_team(TeamEntity {
                    id: 0,
                    quiz: 1,
                    name: "Owls".into(),
                    access: "abc123".into(),
                    rank: 2,
                    total: 7.5,
                });
                let question = records.save_question(QuestionEntity {
                    id: 0,
                    round: first,
                    quiz_order: 1,
                    question: "Capital of France?".into(),
                    answer: "Paris".into(),
                    media: None,
                });
                records.save_response(ResponseEntity {
                    id: 0,
                    question,
                    team,
                    value: "Paris".into(),
                    score: Some(1.0),
                    confirmed: Some(1.0),
                });
                records.save_score(ScoreEntity {
                    id: 0,
                    team,
                    round: 1,
                    responses: 1,
                    value: Some(7.5),
                    confirmed: Some(7.5),
                });
                Ok((team, question))
            })
            .await
            .unwrap();

        let mut removal = round(2, "Two");
        removal.delete = true;
        let views = edit_rounds(
            &state,
            RoundsForm {
                rounds: vec![round(1, "One"), removal],
            },
        )
        .await
        .unwrap();

        let remaining: Vec<(u32, String)> = views.into_iter().map(|r| (r.index, r.title)).collect();
        assert_eq!(remaining, vec![(1, "One".into()), (2, "Three".into())]);
        let records = store.snapshot().await.unwrap();
        assert_eq!(records.quiz().unwrap().scoring_round, 1);
        assert_eq!(records.pending_operations().len(), 1);
        assert!(records.responses_for_question(question).is_empty());
        assert!(records.scores_for_round(1).is_empty());
        assert!(records.score_for(team, 1).is_none());
        let owls = records.team(team).unwrap();
        assert_eq!((owls.total, owls.rank), (0.0, 1));

        let update = rx.try_recv().unwrap();
        round_worker::process(&state, state.uploads().as_ref(), update)
            .await
            .unwrap();
        assert!(store.snapshot().await.unwrap().pending_operations().is_empty());
    }

    #[tokio::test]
    async fn teams_get_access_codes() {
        let store = Arc::new(MemoryQuizStore::new());
        let (state, _rx) = test_state(store).await;

        let views = edit_teams(
            &state,
            TeamsForm {
                teams: vec![team(1, "Owls", false), team(2, "Bats", false)],
            },
        )
        .await
        .unwrap();
        // listed by name
        assert_eq!(views[0].name, "Bats");
        assert_eq!(views[0].access.len(), ACCESS_CODE_LEN);
        assert_ne!(views[0].access, views[1].access);
        assert!(state.team_access_ok(views[1].id, &views[1].access));

        let owls = views[1].id;
        let views = edit_teams(
            &state,
            TeamsForm {
                teams: vec![team(1, "Bats", false), team(2, "Owls", true)],
            },
        )
        .await
        .unwrap();
        assert_eq!(views.len(), 1);
        assert!(!state.team_access_ok(owls, "anything"));
        let n_teams = state.read(|scope| scope.quiz.n_teams).await.unwrap();
        assert_eq!(n_teams, 1);
    }

    #[tokio::test]
    async fn question_media_bound_by_worker() {
        let store = Arc::new(MemoryQuizStore::new());
        let (state, mut rx) = test_state(store.clone()).await;
        with_rounds(&state, &["Pictures"]).await;

        let form = questions(&state, 1).await.unwrap();
        assert!(form.questions.is_empty());
        let tx = form.tx;

        let ack = upload(
            &state,
            UploadRequest {
                tx,
                name: "map.png".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(ack.version, 1);

        let view = edit_questions(
            &state,
            1,
            QuestionsForm {
                tx,
                questions: vec![
                    question(1, "Where?", Some("map.png")),
                    question(2, "When?", None),
                ],
            },
        )
        .await
        .unwrap();
        assert_eq!(view.questions.len(), 2);
        assert_eq!(view.questions[0].media.as_deref(), Some("map.png"));

        let update = rx.try_recv().unwrap();
        round_worker::process(&state, state.uploads().as_ref(), update)
            .await
            .unwrap();

        let records = store.snapshot().await.unwrap();
        let round_id = records.round_by_order(1).unwrap().id;
        let bound = records.questions_for_round(round_id)[0].media.clone();
        assert_eq!(
            bound,
            Some(MediaRef::Bound {
                name: "map.png".into(),
                version: 1
            })
        );

        // an unchanged name keeps the bound reference
        let again = questions(&state, 1).await.unwrap();
        edit_questions(
            &state,
            1,
            QuestionsForm {
                tx: again.tx,
                questions: vec![question(1, "Where exactly?", Some("map.png"))],
            },
        )
        .await
        .unwrap();
        let records = store.snapshot().await.unwrap();
        let kept = records.questions_for_round(round_id);
        assert_eq!(kept.len(), 2);
        assert!(matches!(kept[0].media, Some(MediaRef::Bound { .. })));
        assert_eq!(kept[1].quiz_order, 2);
    }
}
