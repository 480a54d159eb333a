use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of an extended edit transaction, shared by a round edit and its media work.
pub type TxId = Uuid;

/// Page shown by a display. The numeric codes are shared with the display clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum Page {
    /// Static page, qualified by a [`StaticPage`].
    Static,
    /// Questions for the current round.
    Questions,
    /// Answers for the current round.
    Answers,
    /// Waiting on scorers.
    ScoresWait,
    /// Scores for a round before the final full round.
    Scores,
    /// Final scores, or tie-break scores.
    Final,
    /// Quizmaster or scoreboard waiting for the first scores.
    Start,
    /// Scoreboard waiting on public scores.
    PublicWait,
    /// Team waiting to respond.
    RespondWait,
    /// Quizmaster viewing team responses.
    QuizResponses,
    /// Scorer's question status for a round.
    ScorerQuestions,
    /// Scorer's round status.
    ScorerRounds,
}

impl Page {
    /// Wire code for the page.
    pub fn code(self) -> u16 {
        match self {
            Page::Static => 0,
            Page::Questions => 1,
            Page::Answers => 2,
            Page::ScoresWait => 3,
            Page::Scores => 4,
            Page::Final => 5,
            Page::Start => 10,
            Page::PublicWait => 11,
            Page::RespondWait => 12,
            Page::QuizResponses => 13,
            Page::ScorerQuestions => 14,
            Page::ScorerRounds => 15,
        }
    }

    /// Decode a wire code, returning `None` for codes no client should send.
    pub fn from_code(code: i64) -> Option<Self> {
        let page = match code {
            0 => Page::Static,
            1 => Page::Questions,
            2 => Page::Answers,
            3 => Page::ScoresWait,
            4 => Page::Scores,
            5 => Page::Final,
            10 => Page::Start,
            11 => Page::PublicWait,
            12 => Page::RespondWait,
            13 => Page::QuizResponses,
            14 => Page::ScorerQuestions,
            15 => Page::ScorerRounds,
            _ => return None,
        };
        Some(page)
    }

    /// Pages that show published scores.
    pub fn is_scores(self) -> bool {
        matches!(self, Page::Scores | Page::Final)
    }
}

impl From<Page> for u16 {
    fn from(value: Page) -> Self {
        value.code()
    }
}

impl TryFrom<u16> for Page {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Page::from_code(value.into()).ok_or_else(|| format!("unknown page code {value}"))
    }
}

/// Sub-page of [`Page::Static`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum StaticPage {
    /// Welcome page before round 1.
    Start,
    /// Interval after a round's scores.
    Interval,
    /// End of the quiz.
    End,
}

impl StaticPage {
    /// Wire code for the static page.
    pub fn code(self) -> u16 {
        match self {
            StaticPage::Start => 0,
            StaticPage::Interval => 1,
            StaticPage::End => 999,
        }
    }
}

impl From<StaticPage> for u16 {
    fn from(value: StaticPage) -> Self {
        value.code()
    }
}

impl TryFrom<u16> for StaticPage {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(StaticPage::Start),
            1 => Ok(StaticPage::Interval),
            999 => Ok(StaticPage::End),
            other => Err(format!("unknown static page code {other}")),
        }
    }
}

/// Quiz parameters and scoring pointers. Exactly one per deployment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuizEntity {
    /// Record id; there is only ever one quiz.
    pub id: u64,
    /// Display title.
    pub title: String,
    /// Person or club running the quiz.
    pub organiser: String,
    /// Rounds at the end of the quiz kept for breaking ties.
    pub n_tie_breakers: u32,
    /// Rounds whose answers are held back until later questions have been asked.
    pub n_deferred: u32,
    /// Rounds before the end after which the scoreboard stops showing totals.
    pub n_final_scores: u32,
    /// Places that win a prize; ties across this cut-off need a tie-break.
    pub n_winners: u32,
    /// Access code shown to teams joining the quiz.
    pub access: String,
    /// Polling interval hint for display clients, in seconds.
    pub refresh: u32,
    /// Latest round for which teams may submit responses (0 before the first round).
    pub response_round: u32,
    /// Next round to be published by the scorers.
    pub scoring_round: u32,
}

impl QuizEntity {
    /// Quiz created on first start, before any setup edits.
    pub fn with_defaults(id: u64) -> Self {
        Self {
            id,
            title: "The Quiz".into(),
            organiser: String::new(),
            n_tie_breakers: 0,
            n_deferred: 1,
            n_final_scores: 4,
            n_winners: 1,
            access: String::new(),
            refresh: 3,
            response_round: 0,
            scoring_round: 1,
        }
    }
}

/// Live cursor shared by every display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContestEntity {
    /// Record id.
    pub id: u64,
    /// Owning quiz.
    pub quiz: u64,
    /// 1-based round being shown.
    pub current_round: u32,
    /// Page being shown.
    pub current_page: Page,
    /// Sub-page shown while `current_page` is static.
    pub current_static: StaticPage,
    /// Slide within the current page.
    pub current_index: u32,
    /// Slide where the ranked leaderboard starts on the current scores page.
    pub leaderboard_index: u32,
    /// Round the quizmaster's console follows.
    pub quizmaster_round: u32,
    /// Latest round whose scores the scoreboard may show.
    pub scoreboard_round: u32,
    /// Rotating marker proving to puppets that the controller is alive.
    pub tick: String,
    /// The controller is driving the displays.
    pub live: bool,
    /// Steps are taken from a touch controller rather than the keyboard.
    pub touch_controller: bool,
}

impl ContestEntity {
    /// Cursor for a quiz that has not been started.
    pub fn new(id: u64, quiz: u64) -> Self {
        Self {
            id,
            quiz,
            current_round: 1,
            current_page: Page::Static,
            current_static: StaticPage::Start,
            current_index: 0,
            leaderboard_index: 0,
            quizmaster_round: 0,
            scoreboard_round: 0,
            tick: "*".into(),
            live: false,
            touch_controller: true,
        }
    }
}

/// A round of questions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundEntity {
    /// Record id.
    pub id: u64,
    /// Owning quiz.
    pub quiz: u64,
    /// 1-based position in the quiz.
    pub quiz_order: u32,
    /// Display title.
    pub title: String,
    /// Flags decoded into a round format, e.g. `Q3|A6|I`.
    pub format: String,
}

/// Reference from a question to a media file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MediaRef {
    /// Uploaded under an edit transaction, waiting for the worker to bind it.
    Pending {
        /// Edit transaction the file was uploaded under.
        tx: TxId,
        /// File name chosen by the editor.
        name: String,
    },
    /// Processed version in use by the slides.
    Bound {
        /// File name chosen by the editor.
        name: String,
        /// Processed version, bumped by each upload of the same name.
        version: u32,
    },
}

impl MediaRef {
    /// File name as chosen by the editor, independent of its version.
    pub fn name(&self) -> &str {
        match self {
            MediaRef::Pending { name, .. } | MediaRef::Bound { name, .. } => name,
        }
    }
}

/// A question and its answer, in a round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionEntity {
    /// Record id.
    pub id: u64,
    /// Owning round.
    pub round: u64,
    /// 1-based position in the round.
    pub quiz_order: u32,
    /// Question text.
    pub question: String,
    /// Expected answer.
    pub answer: String,
    /// Picture, audio or video shown with the question.
    pub media: Option<MediaRef>,
}

/// A team taking part.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeamEntity {
    /// Record id.
    pub id: u64,
    /// Owning quiz.
    pub quiz: u64,
    /// Display name.
    pub name: String,
    /// Access token used by the team's response client.
    pub access: String,
    /// Standard competition rank after the last published round.
    pub rank: u32,
    /// Cumulative published score over full rounds.
    pub total: f64,
}

/// A team's answer to one question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseEntity {
    /// Record id.
    pub id: u64,
    /// Question answered.
    pub question: u64,
    /// Answering team.
    pub team: u64,
    /// Answer as typed by the team.
    pub value: String,
    /// Working score entered by a scorer.
    pub score: Option<f64>,
    /// Score confirmed by a second check.
    pub confirmed: Option<f64>,
}

/// A team's score for one round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreEntity {
    /// Record id.
    pub id: u64,
    /// Team id.
    pub team: u64,
    /// 1-based round number.
    pub round: u32,
    /// Number of responses the team submitted for the round.
    pub responses: u32,
    /// Score entered or summed from marks.
    pub value: Option<f64>,
    /// Published value.
    pub confirmed: Option<f64>,
}

/// Kinds of durable operation recorded in the ledger.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Rebind media after a round was edited or removed.
    RoundUpdate,
}

/// Progress of a ledger entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    /// Waiting for the worker.
    Pending,
    /// Completed; pruned from the ledger.
    Done,
}

/// Entry in the write-ahead ledger of background operations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationEntity {
    /// Record id.
    pub id: Uuid,
    /// What the worker must do.
    pub kind: OperationKind,
    /// Kind-specific arguments, stored as JSON.
    pub payload: serde_json::Value,
    /// Whether the worker has finished.
    pub status: OperationStatus,
    /// Unix seconds when the operation was recorded.
    pub created_at: u64,
}
