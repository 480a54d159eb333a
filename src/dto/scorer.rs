//! DTOs for the scorer consoles.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::state::scoring::ScoreSource;

/// Scoring progress of one round.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoundStatusView {
    pub round: u32,
    pub title: String,
    pub status: String,
}

/// Scorer's list of rounds.
#[derive(Debug, Serialize, ToSchema)]
pub struct ScorerRoundsView {
    pub scoring_round: u32,
    pub rounds: Vec<RoundStatusView>,
    /// Scorer revision the view reflects.
    pub update: i64,
}

/// A team's answer to a question, with its marks.
#[derive(Debug, Serialize, ToSchema)]
pub struct ResponseView {
    pub id: u64,
    pub team: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed: Option<f64>,
}

/// A question with its scoring status and responses.
#[derive(Debug, Serialize, ToSchema)]
pub struct QuestionStatusView {
    pub id: u64,
    pub order: u32,
    pub question: String,
    pub answer: String,
    pub status: String,
    pub responses: Vec<ResponseView>,
}

/// Scorer's view of one round.
#[derive(Debug, Serialize, ToSchema)]
pub struct ScorerQuestionsView {
    pub round: u32,
    pub title: String,
    pub published: bool,
    pub questions: Vec<QuestionStatusView>,
    pub update: i64,
}

/// One team's line in the summary.
#[derive(Debug, Serialize, ToSchema)]
pub struct SummaryTeam {
    pub name: String,
    /// Score per completed round, in round order.
    pub scores: Vec<Option<f64>>,
    pub total: f64,
    pub rank: u32,
}

/// Round scores and ranks for every completed round.
#[derive(Debug, Serialize, ToSchema)]
pub struct SummaryView {
    pub rounds: u32,
    pub teams: Vec<SummaryTeam>,
    pub is_tied: bool,
}

/// Mark for one response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResponseMark {
    pub response: u64,
    pub score: f64,
}

/// Marks for a question's responses.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ScoreQuestion {
    #[validate(length(min = 1))]
    pub marks: Vec<ResponseMark>,
}

/// Round score for a team; `None` withdraws it where allowed.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TeamScoreEntry {
    pub team: u64,
    #[serde(default)]
    pub score: Option<f64>,
}

/// Round scores entered directly.
#[derive(Debug, Deserialize, ToSchema)]
pub struct EditRoundScores {
    pub scores: Vec<TeamScoreEntry>,
}

/// Where published scores come from.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PublishSource {
    /// Sum the marks of each team's responses.
    Responses,
    /// Use the round scores entered directly.
    Entered,
}

impl From<PublishSource> for ScoreSource {
    fn from(source: PublishSource) -> Self {
        match source {
            PublishSource::Responses => ScoreSource::Responses,
            PublishSource::Entered => ScoreSource::Entered,
        }
    }
}

/// Publish request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PublishRound {
    pub source: PublishSource,
}
