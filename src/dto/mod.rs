use serde::Serialize;
use utoipa::ToSchema;

pub mod display;
pub mod health;
pub mod respond;
pub mod scorer;
pub mod setup;
pub mod validation;

/// Generic acknowledgement carrying a message for the operator.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    pub message: String,
}

impl ActionResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
