use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the quiz server.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::control::start,
        crate::routes::control::resume,
        crate::routes::control::next,
        crate::routes::control::back,
        crate::routes::control::index,
        crate::routes::control::update,
        crate::routes::display::puppet_update,
        crate::routes::display::round_view,
        crate::routes::display::scores_view,
        crate::routes::display::static_view,
        crate::routes::display::responses_view,
        crate::routes::respond::submit,
        crate::routes::respond::wait_view,
        crate::routes::scorer::rounds,
        crate::routes::scorer::questions,
        crate::routes::scorer::summary,
        crate::routes::scorer::score_question,
        crate::routes::scorer::confirm_question,
        crate::routes::scorer::edit_scores,
        crate::routes::scorer::publish,
        crate::routes::setup::quiz_settings,
        crate::routes::setup::edit_quiz,
        crate::routes::setup::rounds,
        crate::routes::setup::edit_rounds,
        crate::routes::setup::teams,
        crate::routes::setup::edit_teams,
        crate::routes::setup::questions,
        crate::routes::setup::edit_questions,
        crate::routes::setup::upload,
    ),
    components(
        schemas(
            crate::dto::ActionResponse,
            crate::dto::health::HealthResponse,
            crate::dto::display::PuppetRequest,
            crate::dto::display::DisplayReply,
            crate::dto::display::ControlStart,
            crate::dto::display::ControlStep,
            crate::dto::display::ControlIndex,
            crate::dto::display::ControlUpdate,
            crate::dto::display::ControlPath,
            crate::dto::display::RoundView,
            crate::dto::display::SlideView,
            crate::dto::display::SlideItem,
            crate::dto::display::MediaView,
            crate::dto::display::ScoresView,
            crate::dto::display::TeamScoreView,
            crate::dto::display::StaticView,
            crate::dto::display::ResponsesView,
            crate::dto::display::TeamResponseStatus,
            crate::dto::respond::SubmitResponses,
            crate::dto::respond::RespondRound,
            crate::dto::respond::RespondWaitView,
            crate::dto::scorer::ScorerRoundsView,
            crate::dto::scorer::RoundStatusView,
            crate::dto::scorer::ScorerQuestionsView,
            crate::dto::scorer::QuestionStatusView,
            crate::dto::scorer::ResponseView,
            crate::dto::scorer::SummaryView,
            crate::dto::scorer::SummaryTeam,
            crate::dto::scorer::ScoreQuestion,
            crate::dto::scorer::ResponseMark,
            crate::dto::scorer::EditRoundScores,
            crate::dto::scorer::TeamScoreEntry,
            crate::dto::scorer::PublishRound,
            crate::dto::scorer::PublishSource,
            crate::dto::setup::QuizSettings,
            crate::dto::setup::RoundSetupView,
            crate::dto::setup::RoundsForm,
            crate::dto::setup::RoundEdit,
            crate::dto::setup::TeamSetupView,
            crate::dto::setup::TeamsForm,
            crate::dto::setup::TeamEdit,
            crate::dto::setup::QuestionsView,
            crate::dto::setup::QuestionSetupView,
            crate::dto::setup::QuestionsForm,
            crate::dto::setup::QuestionEdit,
            crate::dto::setup::UploadRequest,
            crate::dto::setup::UploadAck,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "control", description = "Controller stepping through the quiz"),
        (name = "display", description = "Display polling and page views"),
        (name = "respond", description = "Team answer submission"),
        (name = "scorer", description = "Marking and publishing scores"),
        (name = "setup", description = "Quiz, rounds, teams and questions"),
    )
)]
/// OpenAPI document for every route.
pub struct ApiDoc;
