//! DTOs for team response clients.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::dto::validation::validate_access_code;

/// A team's answers for every question of a round, in question order.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SubmitResponses {
    #[validate(custom(function = "validate_access_code"))]
    pub access: String,
    pub answers: Vec<String>,
}

/// Access token presented with a team request.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TeamAccess {
    pub access: String,
}

/// A round the team may answer or review.
#[derive(Debug, Serialize, ToSchema)]
pub struct RespondRound {
    pub round: u32,
    pub title: String,
    pub answered: bool,
    pub href: String,
}

/// Page shown to a team between rounds.
#[derive(Debug, Serialize, ToSchema)]
pub struct RespondWaitView {
    pub team: String,
    pub rounds: Vec<RespondRound>,
}
