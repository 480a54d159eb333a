//! Payloads exchanged with polling displays and the controller.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    dao::models::Page,
    state::broker::{PuppetPoll, Reply},
};

/// Poll sent by every puppet display.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PuppetRequest {
    /// Role code (`C`, `P`, `Q`, `S`, `R`, `X`) or a team access token.
    pub puppet: String,
    #[serde(default)]
    pub access: String,
    /// Code of the page the display is showing.
    pub page: i64,
    /// Round number, static sub-page code or team id, depending on the page.
    pub param: i64,
    #[serde(default)]
    pub index: u32,
    /// Revision the display last loaded.
    #[serde(default)]
    pub update: i64,
}

impl From<PuppetRequest> for PuppetPoll {
    fn from(request: PuppetRequest) -> Self {
        Self {
            puppet: request.puppet,
            access: request.access,
            page: Page::from_code(request.page),
            param: request.param,
            index: request.index,
            update: request.update,
        }
    }
}

/// Reply to any poll or controller step. An empty `newHRef` means stay.
#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
pub struct DisplayReply {
    #[serde(rename = "newHRef")]
    pub href: String,
    #[serde(rename = "newIndex")]
    pub index: u32,
    #[serde(rename = "newTick")]
    pub tick: String,
}

impl From<Reply> for DisplayReply {
    fn from(reply: Reply) -> Self {
        Self {
            href: reply.href,
            index: reply.index,
            tick: reply.tick,
        }
    }
}

/// Controller start request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ControlStart {
    /// False for a rehearsal, where puppets stay put.
    pub live: bool,
}

/// Controller step request quoting the sync revision it last saw.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ControlStep {
    pub sync: i64,
}

/// Slide change reported by the controller.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ControlIndex {
    pub sync: i64,
    pub index: u32,
    /// The slide was reached by touch navigation.
    #[serde(default)]
    pub touch_nav: bool,
}

/// Periodic controller poll.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ControlUpdate {
    /// Published revision of the scores the controller shows.
    pub update: i64,
    /// Seconds component of the controller's clock.
    pub second: u32,
}

/// Controller page to open.
#[derive(Debug, Serialize, ToSchema)]
pub struct ControlPath {
    pub href: String,
    /// Sync revision to quote on the next step.
    pub sync: i64,
}

/// Which role is asking for a view.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ViewQuery {
    #[serde(default = "default_puppet")]
    pub puppet: String,
    /// Show answers rather than questions.
    #[serde(default)]
    pub answers: bool,
}

fn default_puppet() -> String {
    "R".into()
}

/// Media attached to a slide item.
#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
pub struct MediaView {
    pub name: String,
    pub version: u32,
    /// Renderer code: `T`, `A`, `P` or `V`.
    pub kind: String,
}

/// One question on a slide.
#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
pub struct SlideItem {
    pub order: u32,
    pub question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaView>,
}

/// A slide of a round page.
#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
pub struct SlideView {
    pub items: Vec<SlideItem>,
}

/// Questions or answers of a round, split into slides.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoundView {
    pub round: u32,
    pub title: String,
    pub answers: bool,
    pub sudden_death: bool,
    /// Tag of an extra end-of-round slide.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional: Option<String>,
    pub slides: Vec<SlideView>,
    pub index: u32,
}

/// A team's line on a scores page.
#[derive(Debug, Serialize, ToSchema, PartialEq)]
pub struct TeamScoreView {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub total: f64,
    pub rank: u32,
}

/// Scores and standings after a round.
#[derive(Debug, Serialize, ToSchema)]
pub struct ScoresView {
    pub round: u32,
    pub title: String,
    /// Round scores, best first.
    pub by_score: Vec<TeamScoreView>,
    /// Standings, leader first.
    pub by_rank: Vec<TeamScoreView>,
    /// Final places revealed one by one, last place first.
    pub final_slots: Vec<TeamScoreView>,
    pub is_tied: bool,
    pub scored_to: u32,
    pub ready_to: String,
    pub index: u32,
    pub leaderboard_index: u32,
    /// Published revision the view reflects.
    pub update: i64,
}

/// Welcome, interval or end page.
#[derive(Debug, Serialize, ToSchema)]
pub struct StaticView {
    /// Static sub-page code.
    pub page: u16,
    pub title: String,
    pub organiser: String,
    pub access: String,
    /// Title of the round coming up, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_round: Option<String>,
    pub index: u32,
    pub tick: String,
}

/// Response status of one team, for the quizmaster.
#[derive(Debug, Serialize, ToSchema)]
pub struct TeamResponseStatus {
    pub name: String,
    pub responded: bool,
    pub responses: u32,
}

/// Quizmaster view of team responses while questions are open.
#[derive(Debug, Serialize, ToSchema)]
pub struct ResponsesView {
    pub round: u32,
    pub title: String,
    pub teams: Vec<TeamResponseStatus>,
    pub do_now: String,
    pub do_next: String,
    pub update: i64,
}
