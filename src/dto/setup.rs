//! DTOs for quiz setup: settings, rounds, teams, questions and uploads.
//!
//! Edits of rounds, teams and questions list every child by its 1-based index in display
//! order. An entry either keeps (and updates) the child at that index, adds a new one past the
//! end, or deletes it.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::dto::validation::validate_media_name;

/// Quiz-wide settings.
#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct QuizSettings {
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    #[serde(default)]
    pub organiser: String,
    #[validate(range(max = 20))]
    pub n_tie_breakers: u32,
    pub n_deferred: u32,
    pub n_final_scores: u32,
    #[validate(range(min = 1))]
    pub n_winners: u32,
    #[serde(default)]
    #[validate(length(max = 32))]
    pub access: String,
    #[validate(range(min = 1, max = 60))]
    pub refresh: u32,
}

/// A round as listed for editing.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoundSetupView {
    pub index: u32,
    pub title: String,
    pub format: String,
}

/// Edit of one round.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RoundEdit {
    pub index: u32,
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub delete: bool,
}

/// Edit of every round.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RoundsForm {
    #[validate(nested)]
    pub rounds: Vec<RoundEdit>,
}

/// A team as listed for editing.
#[derive(Debug, Serialize, ToSchema)]
pub struct TeamSetupView {
    pub index: u32,
    pub id: u64,
    pub name: String,
    pub access: String,
}

/// Edit of one team. New teams get a generated access code.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct TeamEdit {
    pub index: u32,
    #[validate(length(min = 1, max = 60))]
    pub name: String,
    #[serde(default)]
    pub delete: bool,
}

/// Edit of every team.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct TeamsForm {
    #[validate(nested)]
    pub teams: Vec<TeamEdit>,
}

/// A question as listed for editing.
#[derive(Debug, Serialize, ToSchema)]
pub struct QuestionSetupView {
    pub index: u32,
    pub question: String,
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<String>,
}

/// Questions of a round, with the transaction id to quote on the edit and its uploads.
#[derive(Debug, Serialize, ToSchema)]
pub struct QuestionsView {
    pub round: u32,
    pub title: String,
    pub tx: Uuid,
    pub questions: Vec<QuestionSetupView>,
}

/// Edit of one question.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct QuestionEdit {
    pub index: u32,
    #[validate(length(min = 1))]
    pub question: String,
    #[serde(default)]
    pub answer: String,
    /// Media file name; omitted to remove the media.
    #[serde(default)]
    #[validate(custom(function = "validate_media_name"))]
    pub media: Option<String>,
    #[serde(default)]
    pub delete: bool,
}

/// Edit of every question of a round.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct QuestionsForm {
    pub tx: Uuid,
    #[validate(nested)]
    pub questions: Vec<QuestionEdit>,
}

/// Media file received for a question edit.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UploadRequest {
    pub tx: Uuid,
    #[validate(custom(function = "validate_media_name"))]
    pub name: String,
}

/// Processed upload.
#[derive(Debug, Serialize, ToSchema)]
pub struct UploadAck {
    pub name: String,
    pub version: u32,
}
