/// Controller actions driving the quiz forward and back.
pub mod control_service;
/// Page views and puppet polling for displays.
pub mod display_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Uploaded media files and their binding to questions.
pub mod media;
/// Team answer submission.
pub mod respond_service;
/// Background worker applying committed round edits.
pub mod round_worker;
/// Marking, confirmation and publication of scores.
pub mod scorer_service;
/// Quiz settings, rounds, teams and questions.
pub mod setup_service;
