//! Puppet polling and the JSON views the displays render.

use std::cmp::Ordering;

use tracing::debug;

use crate::{
    config::{AppConfig, MediaTypes},
    dao::{
        models::{MediaRef, QuestionEntity, StaticPage},
        records::Records,
    },
    dto::display::{
        DisplayReply, MediaView, PuppetRequest, ResponsesView, RoundView, ScoresView, SlideItem,
        SlideView, StaticView, TeamResponseStatus, TeamScoreView, ViewQuery,
    },
    error::ServiceError,
    state::{
        SharedState,
        broker::{self, Puppet, PuppetPoll, ready_to, scored_to, slide_index},
        contest::ContestCache,
        format::RoundFormat,
        quiz::QuizCache,
        ranking::sort_by_rank,
        scoring,
    },
};

/// Answer a puppet poll.
pub async fn puppet_update(
    state: &SharedState,
    request: PuppetRequest,
) -> Result<DisplayReply, ServiceError> {
    let poll = PuppetPoll::from(request);
    let reply = state.read(|scope| broker::puppet_update(scope, &poll)).await?;
    Ok(reply.into())
}

fn parse_puppet(code: &str) -> Result<Puppet<'_>, ServiceError> {
    Puppet::parse(code).ok_or_else(|| ServiceError::InvalidInput(format!("unknown puppet `{code}`")))
}

// ---------------------------------------------------------------------------
// Round slides
// ---------------------------------------------------------------------------

fn media_view(media: Option<&MediaRef>, types: &MediaTypes) -> Option<MediaView> {
    match media? {
        MediaRef::Bound { name, version } => Some(MediaView {
            name: name.clone(),
            version: *version,
            kind: types.kind_of(name).code().into(),
        }),
        // not yet processed
        MediaRef::Pending { .. } => None,
    }
}

/// Split a round's questions into slides. Pictures and videos get a slide of their own.
pub fn split_slides(
    questions: &[&QuestionEntity],
    format: &RoundFormat,
    answers: bool,
    types: &MediaTypes,
) -> Vec<SlideView> {
    let capacity = if answers && !format.combined {
        format.slide_answers
    } else {
        format.slide_questions
    }
    .max(1);
    let with_answer = answers || format.combined;

    let mut slides = Vec::new();
    let mut current: Vec<SlideItem> = Vec::new();
    for question in questions {
        let media = media_view(question.media.as_ref(), types);
        let alone = question
            .media
            .as_ref()
            .is_some_and(|media| types.kind_of(media.name()).needs_own_slide());
        let item = SlideItem {
            order: question.quiz_order,
            question: question.question.clone(),
            answer: with_answer.then(|| question.answer.clone()),
            media,
        };

        if alone {
            if !current.is_empty() {
                slides.push(SlideView {
                    items: std::mem::take(&mut current),
                });
            }
            slides.push(SlideView { items: vec![item] });
            continue;
        }

        current.push(item);
        if current.len() == capacity {
            slides.push(SlideView {
                items: std::mem::take(&mut current),
            });
        }
    }
    if !current.is_empty() {
        slides.push(SlideView { items: current });
    }
    slides
}

/// Questions or answers of a round, split into slides.
pub async fn round_view(
    state: &SharedState,
    n_round: u32,
    query: ViewQuery,
) -> Result<RoundView, ServiceError> {
    state
        .read(|scope| -> Result<RoundView, ServiceError> {
            let puppet = parse_puppet(&query.puppet)?;
            let round = scope
                .records
                .round_by_order(n_round)
                .ok_or_else(|| ServiceError::NotFound(format!("round {n_round} is not defined")))?;
            let format = RoundFormat::decode(&round.format, scope.config.slide_items);
            let questions = scope.records.questions_for_round(round.id);
            let slides = split_slides(&questions, &format, query.answers, &scope.config.media);

            Ok(RoundView {
                round: n_round,
                title: round.title.clone(),
                answers: query.answers,
                sudden_death: format.combined,
                additional: format.additional.clone(),
                slides,
                index: slide_index(scope.contest, &puppet),
            })
        })
        .await?
}

// ---------------------------------------------------------------------------
// Scores
// ---------------------------------------------------------------------------

fn by_score_desc(a: &TeamScoreView, b: &TeamScoreView) -> Ordering {
    let score = |view: &TeamScoreView| view.score.unwrap_or(f64::NEG_INFINITY);
    score(b)
        .partial_cmp(&score(a))
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.name.cmp(&b.name))
}

fn build_scores(
    quiz: &QuizCache,
    contest: &ContestCache,
    records: &Records,
    config: &AppConfig,
    n_round: u32,
    puppet: &Puppet<'_>,
) -> Result<ScoresView, ServiceError> {
    if n_round == 0 || n_round >= quiz.quiz.scoring_round {
        return Err(ServiceError::NotFound(format!(
            "scores for round {n_round} are not published"
        )));
    }
    let title = records
        .round_by_order(n_round)
        .map(|round| round.title.clone())
        .ok_or_else(|| ServiceError::NotFound(format!("round {n_round} is not defined")))?;

    let mut ranking = scoring::rank(records, quiz, n_round);
    sort_by_rank(&mut ranking.standings);

    let line = |team: u64, name: &str, total: f64, rank: u32| TeamScoreView {
        name: name.to_string(),
        score: records.score_for(team, n_round).and_then(|score| score.value),
        total,
        rank,
    };

    let mut by_score: Vec<TeamScoreView> = ranking
        .standings
        .iter()
        .map(|s| line(s.team, &s.name, s.total, s.rank))
        .collect();
    by_score.sort_by(by_score_desc);

    let mut by_rank: Vec<TeamScoreView> = ranking
        .standings
        .iter()
        .map(|s| line(s.team, &s.name, s.total, s.rank))
        .collect();
    if config.top_teams > 0 {
        by_rank.truncate(config.top_teams as usize);
    }

    let final_slots = if n_round >= quiz.counts.full {
        let mut slots: Vec<TeamScoreView> = ranking
            .standings
            .iter()
            .take(quiz.quiz.n_final_scores as usize)
            .map(|s| line(s.team, &s.name, s.total, s.rank))
            .collect();
        slots.reverse();
        slots
    } else {
        Vec::new()
    };

    Ok(ScoresView {
        round: n_round,
        title,
        by_score,
        by_rank,
        final_slots,
        is_tied: ranking.is_tied,
        scored_to: scored_to(contest, puppet),
        ready_to: ready_to(quiz, contest),
        index: slide_index(contest, puppet),
        leaderboard_index: contest.contest.leaderboard_index,
        update: quiz.revisions.published.value(),
    })
}

/// Slide where the ranked leaderboard starts: after the round and cumulative slides for a
/// round before the last full round.
fn leaderboard_start(quiz: &QuizCache, n_round: u32, ranked: usize) -> u32 {
    let ranked = ranked as u32;
    if n_round < quiz.counts.full {
        ranked + 2
    } else {
        ranked
    }
}

/// Scores after a round. When the controller loads the view the leaderboard index is noted
/// for the scoreboard.
pub async fn scores_view(
    state: &SharedState,
    n_round: u32,
    query: ViewQuery,
) -> Result<ScoresView, ServiceError> {
    let puppet = parse_puppet(&query.puppet)?;
    if puppet != Puppet::Controller {
        return state
            .read(|scope| {
                build_scores(
                    scope.quiz,
                    scope.contest,
                    scope.records,
                    scope.config,
                    n_round,
                    &puppet,
                )
            })
            .await?;
    }

    state
        .update_contest(|scope| {
            let mut view = build_scores(
                scope.quiz,
                scope.contest,
                scope.tx.records(),
                scope.config,
                n_round,
                &puppet,
            )?;
            let start = leaderboard_start(scope.quiz, n_round, view.by_rank.len());
            if scope.contest.contest.leaderboard_index != start {
                debug!(round = n_round, start, "leaderboard index set");
                scope.contest.contest_mut().leaderboard_index = start;
            }
            view.leaderboard_index = start;
            Ok(view)
        })
        .await
}

// ---------------------------------------------------------------------------
// Static and quizmaster views
// ---------------------------------------------------------------------------

/// Welcome, interval or end page for the current cursor.
pub async fn static_view(state: &SharedState, query: ViewQuery) -> Result<StaticView, ServiceError> {
    state
        .read(|scope| -> Result<StaticView, ServiceError> {
            let puppet = parse_puppet(&query.puppet)?;
            let quiz = &scope.quiz.quiz;
            let s = &scope.contest.contest;

            let upcoming = match s.current_static {
                StaticPage::Start => Some(1),
                StaticPage::Interval => {
                    let n = s.current_round;
                    Some(n + scope.quiz.counts.defer_at(n) + 1)
                }
                StaticPage::End => None,
            };
            let next_round = upcoming
                .and_then(|n| scope.records.round_by_order(n))
                .map(|round| round.title.clone());

            Ok(StaticView {
                page: s.current_static.code(),
                title: quiz.title.clone(),
                organiser: quiz.organiser.clone(),
                access: quiz.access.clone(),
                next_round,
                index: slide_index(scope.contest, &puppet),
                tick: s.tick.clone(),
            })
        })
        .await?
}

/// Which teams have responded to a round, for the quizmaster.
pub async fn responses_view(state: &SharedState, n_round: u32) -> Result<ResponsesView, ServiceError> {
    state
        .read(|scope| -> Result<ResponsesView, ServiceError> {
            let round = scope
                .records
                .round_by_order(n_round)
                .ok_or_else(|| ServiceError::NotFound(format!("round {n_round} is not defined")))?;
            let teams = scope
                .records
                .teams_by_name()
                .into_iter()
                .map(|team| {
                    let responses = scope
                        .records
                        .score_for(team.id, n_round)
                        .map(|score| score.responses)
                        .unwrap_or_default();
                    TeamResponseStatus {
                        name: team.name.clone(),
                        responded: scope.records.team_responded(team.id, round.id),
                        responses,
                    }
                })
                .collect();

            Ok(ResponsesView {
                round: n_round,
                title: round.title.clone(),
                teams,
                do_now: scope.contest.prompts.do_now.clone(),
                do_next: scope.contest.prompts.do_next.clone(),
                update: scope.quiz.revisions.response.value(),
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
            models::{RoundEntity, ScoreEntity, TeamEntity},
            quiz_store::MemoryQuizStore,
        },
        state::tests::test_state,
    };

    fn question(order: u32, media: Option<&str>) -> QuestionEntity {
        QuestionEntity {
            id: order as u64,
            round: 1,
            quiz_order: order,
            question: format!("Q{order}"),
            answer: format!("A{order}"),
            media: media.map(|name| MediaRef::Bound {
                name: name.into(),
                version: 1,
            }),
        }
    }

    fn sizes(slides: &[SlideView]) -> Vec<usize> {
        slides.iter().map(|slide| slide.items.len()).collect()
    }

    #[test]
    fn slides_respect_capacity() {
        let questions: Vec<QuestionEntity> = (1..=7).map(|n| question(n, None)).collect();
        let refs: Vec<&QuestionEntity> = questions.iter().collect();
        let format = RoundFormat::decode("Q3|A5", 10);
        let types = MediaTypes::default();

        assert_eq!(sizes(&split_slides(&refs, &format, false, &types)), vec![3, 3, 1]);
        let answers = split_slides(&refs, &format, true, &types);
        assert_eq!(sizes(&answers), vec![5, 2]);
        assert_eq!(answers[0].items[0].answer.as_deref(), Some("A1"));
    }

    #[test]
    fn pictures_get_their_own_slide() {
        let questions = vec![
            question(1, None),
            question(2, Some("castle.jpg")),
            question(3, Some("anthem.mp3")),
            question(4, None),
        ];
        let refs: Vec<&QuestionEntity> = questions.iter().collect();
        let slides = split_slides(&refs, &RoundFormat::plain(10), false, &MediaTypes::default());

        assert_eq!(sizes(&slides), vec![1, 1, 2]);
        assert_eq!(slides[1].items[0].media.as_ref().unwrap().kind, "P");
        assert_eq!(slides[2].items[0].media.as_ref().unwrap().kind, "A");
        assert!(slides[0].items[0].answer.is_none());
    }

    #[test]
    fn sudden_death_shows_answers_with_questions() {
        let questions: Vec<QuestionEntity> = (1..=4).map(|n| question(n, None)).collect();
        let refs: Vec<&QuestionEntity> = questions.iter().collect();
        let slides = split_slides(&refs, &RoundFormat::decode("C2", 10), false, &MediaTypes::default());
        assert_eq!(sizes(&slides), vec![2, 2]);
        assert_eq!(slides[1].items[1].answer.as_deref(), Some("A4"));
    }

    fn scored_quiz() -> Arc<MemoryQuizStore> {
        let mut records = Records::default();
        let (mut quiz, _) = records.ensure_quiz();
        quiz.scoring_round = 2;
        quiz.n_final_scores = 2;
        records.save_quiz(quiz.clone());
        for order in 1..=3 {
            records.save_round(RoundEntity {
                id: 0,
                quiz: quiz.id,
                quiz_order: order,
                title: format!("Round {order}"),
                format: String::new(),
            });
        }
        for (name, value) in [("Ants", 4.0), ("Bees", 9.0), ("Cats", 6.0)] {
            let team = records.save_team(TeamEntity {
                id: 0,
                quiz: quiz.id,
                name: name.into(),
                access: format!("{name}-code"),
                rank: 1,
                total: 0.0,
            });
            records.save_score(ScoreEntity {
                id: 0,
                team,
                round: 1,
                responses: 0,
                value: Some(value),
                confirmed: None,
            });
        }
        Arc::new(MemoryQuizStore::with_records(records))
    }

    fn view(puppet: &str) -> ViewQuery {
        ViewQuery {
            puppet: puppet.into(),
            answers: false,
        }
    }

    #[tokio::test]
    async fn scores_ranked_and_published_only() {
        let (state, _rx) = test_state(scored_quiz()).await;

        let scores = scores_view(&state, 1, view("Q")).await.unwrap();
        let names: Vec<&str> = scores.by_rank.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Bees", "Cats", "Ants"]);
        assert_eq!(scores.by_score[0].score, Some(9.0));
        // not the final round
        assert!(scores.final_slots.is_empty());

        assert!(matches!(
            scores_view(&state, 2, view("Q")).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn controller_sets_leaderboard_index() {
        let (state, _rx) = test_state(scored_quiz()).await;
        let scores = scores_view(&state, 1, view("C")).await.unwrap();
        assert_eq!(scores.leaderboard_index, 5);

        let stored = state
            .read(|scope| scope.contest.contest.leaderboard_index)
            .await
            .unwrap();
        assert_eq!(stored, 5);
    }

    #[tokio::test]
    async fn static_view_names_next_round() {
        let (state, _rx) = test_state(scored_quiz()).await;
        let page = static_view(&state, view("R")).await.unwrap();
        assert_eq!(page.page, 0);
        assert_eq!(page.next_round.as_deref(), Some("Round 1"));
        assert_eq!(page.title, "The Quiz");
    }

    #[tokio::test]
    async fn responses_view_lists_teams() {
        let (state, _rx) = test_state(scored_quiz()).await;
        let responses = responses_view(&state, 1).await.unwrap();
        assert_eq!(responses.teams.len(), 3);
        assert!(responses.teams.iter().all(|team| !team.responded));
        assert_eq!(responses.do_now, "Welcome");
    }

    #[tokio::test]
    async fn unknown_puppet_poll_goes_to_error() {
        let (state, _rx) = test_state(scored_quiz()).await;
        let reply = puppet_update(
            &state,
            PuppetRequest {
                puppet: String::new(),
                access: String::new(),
                page: 0,
                param: 0,
                index: 0,
                update: 0,
            },
        )
        .await
        .unwrap();
        assert_eq!(reply.href, "/error");
    }
}
