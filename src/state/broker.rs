//! Display broker: tells each polling display whether to stay or where to navigate.
//!
//! A display reports the page it shows, the page parameter (round or static sub-page), its
//! slide index and the revision it last loaded. The reply is empty to stay, or a route to load.

use crate::{
    dao::models::{Page, StaticPage},
    state::{ReadScope, contest::ContestCache, quiz::QuizCache},
};

/// Page templates a display can be sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Welcome page.
    QuizStart,
    /// Question slides.
    QuizQuestions,
    /// Answer slides.
    QuizAnswers,
    /// Round scores.
    QuizScores,
    /// Final scores.
    QuizFinal,
    /// Waiting on scorers.
    QuizWait,
    /// Interval or goodbye page.
    QuizStatic,
    /// Display out of step with the quiz.
    QuizError,
    /// Unknown display.
    PuppetError,
    /// Quizmaster following team responses.
    QuizmasterResponses,
    /// Quizmaster before the first round.
    QuizmasterWait,
    /// Scoreboard before any scores.
    ScoreboardStart,
    /// Scoreboard waiting on published scores.
    ScoreboardWait,
}

impl Route {
    /// Path segment of the route.
    pub fn as_str(self) -> &'static str {
        match self {
            Route::QuizStart => "quiz-start",
            Route::QuizQuestions => "quiz-questions",
            Route::QuizAnswers => "quiz-answers",
            Route::QuizScores => "quiz-scores",
            Route::QuizFinal => "quiz-final",
            Route::QuizWait => "quiz-wait",
            Route::QuizStatic => "quiz-static",
            Route::QuizError => "quiz-error",
            Route::PuppetError => "puppet-error",
            Route::QuizmasterResponses => "quizmaster-responses",
            Route::QuizmasterWait => "quizmaster-wait",
            Route::ScoreboardStart => "scoreboard-start",
            Route::ScoreboardWait => "scoreboard-wait",
        }
    }

    /// Route showing a page of the main sequence.
    pub fn for_page(page: Page, current_static: StaticPage) -> Self {
        match page {
            Page::Static => match current_static {
                StaticPage::Start => Route::QuizStart,
                StaticPage::Interval | StaticPage::End => Route::QuizStatic,
            },
            Page::Questions => Route::QuizQuestions,
            Page::Answers => Route::QuizAnswers,
            Page::Scores => Route::QuizScores,
            Page::Final => Route::QuizFinal,
            Page::ScoresWait => Route::QuizWait,
            _ => Route::QuizError,
        }
    }
}

/// Display roles, identified by the code a display sends with each poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Puppet<'a> {
    /// Main display driven by the controller.
    Controller,
    /// Rehearsal display following the controller.
    Practice,
    /// Quizmaster's console.
    Quizmaster,
    /// Scoreboard in the room.
    Scoreboard,
    /// Second screen mirroring the main display.
    Replica,
    /// Scorer's console.
    Scorer,
    /// Team or visitor, identified by an access token.
    Access(&'a str),
}

impl<'a> Puppet<'a> {
    /// Code sent by the controller's own display.
    pub const CONTROLLER: &'static str = "C";

    /// Decode a display code; a longer code is an access token.
    pub fn parse(code: &'a str) -> Option<Self> {
        let puppet = match code {
            "C" => Puppet::Controller,
            "P" => Puppet::Practice,
            "Q" => Puppet::Quizmaster,
            "S" => Puppet::Scoreboard,
            "R" => Puppet::Replica,
            "X" => Puppet::Scorer,
            token if token.chars().count() > 1 => Puppet::Access(token),
            _ => return None,
        };
        Some(puppet)
    }
}

/// Reply to a poll. An empty `href` means stay on the current page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    /// Route to load, or empty to stay.
    pub href: String,
    /// Slide to show.
    pub index: u32,
    /// Controller tick to echo back.
    pub tick: String,
}

impl Reply {
    /// Reply sending the display to `href`.
    pub fn navigate(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            ..Self::default()
        }
    }

    /// The display keeps its page.
    pub fn is_stay(&self) -> bool {
        self.href.is_empty()
    }
}

/// What a puppet reports about itself.
#[derive(Debug, Clone)]
pub struct PuppetPoll {
    /// Display code.
    pub puppet: String,
    /// Access token for team and visitor displays.
    pub access: String,
    /// `None` when the display reported a page code we don't know.
    pub page: Option<Page>,
    /// Round number, or static sub-page code.
    pub param: i64,
    /// Slide the display shows.
    pub index: u32,
    /// Revision the display last loaded.
    pub update: i64,
}

/// `/{route}/{display}/{param}`, with a slide anchor for a non-zero index.
pub fn path_to_page(route: Route, display: &str, param: u32, index: u32) -> String {
    let mut path = format!("/{}/{}/{}", route.as_str(), display, param);
    if index > 0 {
        path.push_str(&format!("#slide-{index}"));
    }
    path
}

/// Response form of a team for a round.
pub fn path_to_respond(access: &str, team: u64, round: u32) -> String {
    format!("/respond-round/{access}/{team}/{round}")
}

/// Page a team waits on between rounds.
pub fn path_to_respond_wait(access: &str, team: u64) -> String {
    format!("/respond-wait/{access}/{team}")
}

/// Marking page for a round.
pub fn path_to_score(round: u32) -> String {
    format!("/scorer-questions/{round}")
}

/// Scorer's round list.
pub const PATH_SCORER_ROUNDS: &str = "/scorer-rounds";

/// Update for any puppet display.
pub fn puppet_update(scope: &ReadScope<'_>, poll: &PuppetPoll) -> Reply {
    let contest = &scope.contest.contest;

    match Puppet::parse(&poll.puppet) {
        None => Reply::navigate("/error"),
        Some(Puppet::Access(_)) if poll.page == Some(Page::RespondWait) => {
            respond_update(scope, &poll.access, poll.param, poll.index)
        }
        Some(Puppet::Quizmaster) => quizmaster_update(scope, poll),
        Some(Puppet::Scoreboard) if contest.live => scoreboard_update(scope, poll),
        Some(Puppet::Scorer) => scorer_update(scope.quiz, poll),
        Some(_) if !contest.live => practice(scope.contest),
        Some(_) if contest.current_page == Page::Static => {
            main_static(scope.contest, poll.page, poll.param, &poll.puppet)
        }
        Some(_) => main_round(
            scope.quiz,
            scope.contest,
            poll.page,
            poll.param,
            poll.update,
            &poll.puppet,
        ),
    }
}

/// Rehearsal mode: every puppet stays put and only sees the tick.
pub fn practice(contest: &ContestCache) -> Reply {
    Reply {
        href: String::new(),
        index: 0,
        tick: contest.contest.tick.clone(),
    }
}

/// Main display following a round page of the cursor.
pub fn main_round(
    quiz: &QuizCache,
    contest: &ContestCache,
    page: Option<Page>,
    param: i64,
    update: i64,
    puppet: &str,
) -> Reply {
    let s = &contest.contest;
    let stale_scores = page.is_some_and(Page::is_scores) && quiz.revisions.published.differs(update);

    let (href, index) = if page != Some(s.current_page)
        || param != i64::from(s.current_round)
        || stale_scores
    {
        let route = Route::for_page(s.current_page, s.current_static);
        (
            path_to_page(route, puppet, s.current_round, s.current_index),
            // the page must reload before it can take an index
            0,
        )
    } else {
        (String::new(), s.current_index)
    };

    let tick = if s.current_page == Page::ScoresWait {
        s.tick.clone()
    } else {
        String::new()
    };

    Reply { href, index, tick }
}

/// Main display following a static page of the cursor.
pub fn main_static(contest: &ContestCache, page: Option<Page>, param: i64, puppet: &str) -> Reply {
    let s = &contest.contest;
    let current = s.current_static.code();

    let (href, index) = if page != Some(Page::Static) || param != i64::from(current) {
        let route = Route::for_page(Page::Static, s.current_static);
        (
            path_to_page(route, puppet, current.into(), s.current_index),
            0,
        )
    } else {
        (String::new(), s.current_index)
    };

    Reply {
        href,
        index,
        tick: s.tick.clone(),
    }
}

/// Quizmaster console. It follows team responses while questions are shown, and otherwise
/// trails its own round pointer, which moves only when scores are ready or the controller steps
/// back.
pub fn quizmaster_update(scope: &ReadScope<'_>, poll: &PuppetPoll) -> Reply {
    let quiz = scope.quiz;
    let s = &scope.contest.contest;
    let mut quizmaster_round = s.quizmaster_round;
    let mut update = scope.contest.quizmaster.value();

    let (route, page) = if scope.config.online && s.current_page == Page::Questions {
        quizmaster_round = s.current_round;
        update = quiz.revisions.response.value();
        (Route::QuizmasterResponses, Page::QuizResponses)
    } else if quizmaster_round == 0 {
        (Route::ScoreboardStart, Page::Start)
    } else if quizmaster_round < quiz.quiz.scoring_round {
        if quizmaster_round < quiz.counts.full {
            (Route::QuizScores, Page::Scores)
        } else {
            (Route::QuizFinal, Page::Final)
        }
    } else {
        (Route::QuizmasterWait, Page::ScoresWait)
    };

    let (href, index) = if poll.page != Some(page)
        || poll.param != i64::from(quizmaster_round)
        || poll.update != update
    {
        (path_to_page(route, "Q", quizmaster_round, 0), 0)
    } else {
        (String::new(), poll.index)
    };

    Reply {
        href,
        index,
        tick: s.tick.clone(),
    }
}

/// Audience scoreboard. Never shows scores the quizmaster is previewing ahead of the audience.
pub fn scoreboard_update(scope: &ReadScope<'_>, poll: &PuppetPoll) -> Reply {
    let quiz = scope.quiz;
    let s = &scope.contest.contest;
    let scoreboard_round = s.scoreboard_round;
    let mut update = poll.update;

    let (route, page, index) = if scoreboard_round == 0 {
        (Route::ScoreboardStart, Page::Start, 0)
    } else if s.quizmaster_round > scoreboard_round {
        (Route::ScoreboardWait, Page::PublicWait, 0)
    } else {
        let (route, page) = if scoreboard_round < quiz.counts.full {
            (Route::QuizScores, Page::Scores)
        } else {
            (Route::QuizFinal, Page::Final)
        };

        // only follow score changes while the controller shows them, else the screen glitches
        if s.current_page.is_scores() {
            update = quiz.revisions.published.value();
            (route, page, s.current_index)
        } else {
            (route, page, s.leaderboard_index)
        }
    };

    let href = if poll.page != Some(page)
        || poll.param != i64::from(scoreboard_round)
        || poll.update != update
    {
        path_to_page(route, "S", scoreboard_round, 0)
    } else {
        String::new()
    };

    Reply {
        href,
        index,
        tick: s.tick.clone(),
    }
}

/// Team response client waiting for the next round to open.
pub fn respond_update(scope: &ReadScope<'_>, access: &str, team: i64, index: u32) -> Reply {
    let Ok(team_id) = u64::try_from(team) else {
        return Reply::navigate("/error");
    };
    let known = scope
        .records
        .team(team_id)
        .is_some_and(|team| team.access == access);
    if !known {
        return Reply::navigate("/error");
    }

    let round = scope.quiz.quiz.response_round;
    let href = if scope.contest.contest.current_page == Page::Questions {
        let answered = scope
            .records
            .score_for(team_id, round)
            .is_some_and(|score| score.responses > 0);
        if answered {
            String::new()
        } else {
            path_to_respond(access, team_id, round)
        }
    } else if index != round {
        path_to_respond_wait(access, team_id)
    } else {
        String::new()
    };

    Reply::navigate(href)
}

/// Scorer consoles reload whenever anything they show has changed.
pub fn scorer_update(quiz: &QuizCache, poll: &PuppetPoll) -> Reply {
    if !quiz.revisions.scorer.differs(poll.update) {
        return Reply::default();
    }

    match poll.page {
        Some(Page::ScorerRounds) => Reply::navigate(PATH_SCORER_ROUNDS),
        Some(Page::ScorerQuestions) => {
            if poll.param == i64::from(quiz.quiz.scoring_round) {
                Reply::navigate(path_to_score(quiz.quiz.scoring_round))
            } else {
                // someone else published this round
                Reply::navigate(PATH_SCORER_ROUNDS)
            }
        }
        _ => Reply::default(),
    }
}

/// Slide index a display should open at when it loads a page.
pub fn slide_index(contest: &ContestCache, puppet: &Puppet<'_>) -> u32 {
    let s = &contest.contest;
    match puppet {
        Puppet::Quizmaster | Puppet::Scorer => 0,
        Puppet::Scoreboard => {
            if s.current_page.is_scores() {
                s.current_index
            } else {
                s.leaderboard_index
            }
        }
        _ => s.current_index,
    }
}

/// Marker telling the quizmaster a later round has been published but not shown.
pub fn ready_to(quiz: &QuizCache, contest: &ContestCache) -> String {
    let ready = quiz.quiz.scoring_round.saturating_sub(1);
    if ready > contest.contest.quizmaster_round {
        format!("[R{ready} ready]")
    } else {
        String::new()
    }
}

/// Latest round whose scores a display may show.
pub fn scored_to(contest: &ContestCache, puppet: &Puppet<'_>) -> u32 {
    match puppet {
        Puppet::Quizmaster => contest.contest.quizmaster_round,
        _ => contest.contest.scoreboard_round,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::{ContestEntity, QuizEntity, ScoreEntity, TeamEntity},
            records::Records,
        },
        state::format::RoundFormat,
    };

    struct Fixture {
        quiz: QuizCache,
        contest: ContestCache,
        records: Records,
        config: AppConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let mut quiz = QuizCache::new(QuizEntity::with_defaults(1), 4, 2);
            quiz.changed_all();
            let mut contest = ContestEntity::new(2, 1);
            contest.live = true;
            Self {
                quiz,
                contest: ContestCache::new(contest, RoundFormat::plain(10)),
                records: Records::default(),
                config: AppConfig::default(),
            }
        }

        fn poll(&self, poll: &PuppetPoll) -> Reply {
            let scope = ReadScope {
                quiz: &self.quiz,
                contest: &self.contest,
                records: &self.records,
                config: &self.config,
            };
            puppet_update(&scope, poll)
        }
    }

    fn poll(puppet: &str, page: Page, param: i64, update: i64) -> PuppetPoll {
        PuppetPoll {
            puppet: puppet.into(),
            access: String::new(),
            page: Some(page),
            param,
            index: 0,
            update,
        }
    }

    #[test]
    fn path_includes_slide_anchor() {
        assert_eq!(path_to_page(Route::QuizScores, "S", 2, 0), "/quiz-scores/S/2");
        assert_eq!(
            path_to_page(Route::QuizQuestions, "R", 3, 4),
            "/quiz-questions/R/3#slide-4"
        );
    }

    #[test]
    fn unknown_puppet_code_is_an_error() {
        let fx = Fixture::new();
        assert_eq!(fx.poll(&poll("Z", Page::Static, 0, 0)).href, "/error");
        assert_eq!(fx.poll(&poll("", Page::Static, 0, 0)).href, "/error");
    }

    #[test]
    fn replica_follows_cursor() {
        let mut fx = Fixture::new();
        {
            let c = fx.contest.contest_mut();
            c.current_page = Page::Questions;
            c.current_round = 2;
            c.current_index = 3;
        }

        let reply = fx.poll(&poll("R", Page::Static, 0, 0));
        assert_eq!(reply.href, "/quiz-questions/R/2#slide-3");
        assert_eq!(reply.index, 0);

        let reply = fx.poll(&poll("R", Page::Questions, 2, 0));
        assert!(reply.is_stay());
        assert_eq!(reply.index, 3);
    }

    #[test]
    fn replica_reloads_stale_scores() {
        let mut fx = Fixture::new();
        {
            let c = fx.contest.contest_mut();
            c.current_page = Page::Scores;
            c.current_round = 1;
        }
        let seen = fx.quiz.revisions.published.value();
        assert!(fx.poll(&poll("R", Page::Scores, 1, seen)).is_stay());

        fx.quiz.changed_published();
        assert_eq!(
            fx.poll(&poll("R", Page::Scores, 1, seen)).href,
            "/quiz-scores/R/1"
        );
    }

    #[test]
    fn rehearsal_freezes_puppets() {
        let mut fx = Fixture::new();
        fx.contest.contest_mut().live = false;
        fx.contest.contest_mut().current_page = Page::Answers;

        let reply = fx.poll(&poll("R", Page::Static, 0, 0));
        assert!(reply.is_stay());
        assert_eq!(reply.tick, "*");
        assert!(fx.poll(&poll("S", Page::Start, 0, 0)).is_stay());
    }

    #[test]
    fn scoreboard_waits_while_quizmaster_previews() {
        let mut fx = Fixture::new();
        {
            let c = fx.contest.contest_mut();
            c.current_page = Page::Answers;
            c.current_round = 2;
            c.scoreboard_round = 1;
            c.quizmaster_round = 2;
        }
        let reply = fx.poll(&poll("S", Page::Scores, 1, 0));
        assert_eq!(reply.href, "/scoreboard-wait/S/1");

        fx.contest.contest_mut().quizmaster_round = 1;
        fx.contest.contest_mut().leaderboard_index = 6;
        let reply = fx.poll(&poll("S", Page::Scores, 1, 0));
        assert!(reply.is_stay());
        assert_eq!(reply.index, 6);
    }

    #[test]
    fn quizmaster_sees_responses_during_questions() {
        let mut fx = Fixture::new();
        {
            let c = fx.contest.contest_mut();
            c.current_page = Page::Questions;
            c.current_round = 3;
        }
        let reply = fx.poll(&poll("Q", Page::Scores, 1, 0));
        assert_eq!(reply.href, "/quizmaster-responses/Q/3");

        let seen = fx.quiz.revisions.response.value();
        assert!(fx.poll(&poll("Q", Page::QuizResponses, 3, seen)).is_stay());
    }

    #[test]
    fn quizmaster_waits_for_unpublished_round() {
        let mut fx = Fixture::new();
        {
            let c = fx.contest.contest_mut();
            c.current_page = Page::Answers;
            c.quizmaster_round = 1;
        }
        let reply = fx.poll(&poll("Q", Page::Start, 0, 0));
        assert_eq!(reply.href, "/quizmaster-wait/Q/1");

        fx.quiz.quiz_mut().scoring_round = 2;
        let reply = fx.poll(&poll("Q", Page::ScoresWait, 1, 0));
        assert_eq!(reply.href, "/quiz-scores/Q/1");
    }

    #[test]
    fn team_is_sent_to_open_round_until_answered() {
        let mut fx = Fixture::new();
        let team = fx.records.save_team(TeamEntity {
            id: 0,
            quiz: 1,
            name: "Owls".into(),
            access: "owl-token".into(),
            rank: 1,
            total: 0.0,
        });
        fx.quiz.quiz_mut().response_round = 1;
        fx.contest.contest_mut().current_page = Page::Questions;

        let mut request = poll("owl-token", Page::RespondWait, team as i64, 0);
        request.access = "owl-token".into();
        assert_eq!(
            fx.poll(&request).href,
            format!("/respond-round/owl-token/{team}/1")
        );

        fx.records.save_score(ScoreEntity {
            id: 0,
            team,
            round: 1,
            responses: 5,
            value: None,
            confirmed: None,
        });
        assert!(fx.poll(&request).is_stay());

        request.access = "wrong".into();
        assert_eq!(fx.poll(&request).href, "/error");
    }

    #[test]
    fn scorer_returns_to_rounds_when_round_moves_on() {
        let fx = Fixture::new();
        let stale = fx.quiz.revisions.scorer.value() - 1;
        let reply = fx.poll(&poll("X", Page::ScorerQuestions, 1, stale));
        assert_eq!(reply.href, "/scorer-questions/1");

        let reply = fx.poll(&poll("X", Page::ScorerQuestions, 3, stale));
        assert_eq!(reply.href, "/scorer-rounds");

        let current = fx.quiz.revisions.scorer.value();
        assert!(fx.poll(&poll("X", Page::ScorerRounds, 0, current)).is_stay());
    }

    #[test]
    fn ready_marker_only_when_ahead() {
        let mut fx = Fixture::new();
        assert_eq!(ready_to(&fx.quiz, &fx.contest), "");
        fx.quiz.quiz_mut().scoring_round = 3;
        fx.contest.contest_mut().quizmaster_round = 1;
        assert_eq!(ready_to(&fx.quiz, &fx.contest), "[R2 ready]");
    }
}
