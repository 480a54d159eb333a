/// Routing of polling displays.
pub mod broker;
/// Live contest cursor.
pub mod contest;
/// Round format flags.
pub mod format;
mod gate;
/// Quiz parameters and revisions.
pub mod quiz;
/// Team ranking.
pub mod ranking;
/// Marking, publishing and restarting.
pub mod scoring;
/// Stepping through the pages of the quiz.
pub mod sequencer;

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::sync::{RwLock, mpsc};
use tracing::{info, warn};

use crate::{
    config::AppConfig,
    dao::{quiz_store::QuizStore, records::Records},
    error::ServiceError,
    services::{media::UploadRegistry, round_worker::RoundUpdate},
    state::{contest::ContestCache, format::RoundFormat, quiz::QuizCache},
};

pub use self::gate::{ContestScope, FullScope, QuizScope, ReadScope};

/// Application state shared between handlers.
pub type SharedState = Arc<AppState>;
/// Longest wait for the state gate when the configuration does not say.
pub const DEFAULT_GATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Central application state: the two cached state objects, the store behind them and the
/// handles shared with the background worker.
pub struct AppState {
    store: Arc<dyn QuizStore>,
    config: AppConfig,
    quiz: RwLock<QuizCache>,
    contest: RwLock<ContestCache>,
    /// Team id to access token, checked by team response handlers without taking the gate.
    team_access: DashMap<u64, String>,
    uploads: Arc<UploadRegistry>,
    worker: mpsc::Sender<RoundUpdate>,
    gate_timeout: Option<Duration>,
}

impl AppState {
    /// Load (or create) the quiz from the store and build the caches.
    ///
    /// Returns the state together with the receiving end of the round edit queue, for the
    /// worker task.
    pub async fn load(
        config: AppConfig,
        store: Arc<dyn QuizStore>,
    ) -> Result<(SharedState, mpsc::Receiver<RoundUpdate>), ServiceError> {
        let mut tx = store.begin().await?;
        let existing = tx.records().quiz().cloned().zip(tx.records().contest().cloned());
        let (quiz, contest) = match existing {
            Some(pair) => pair,
            None => {
                info!("no quiz found; creating a new one");
                tx.records_mut().ensure_quiz()
            }
        };

        let records = tx.records();
        let format = records
            .round_by_order(contest.current_round)
            .map(|round| RoundFormat::decode(&round.format, config.slide_items))
            .unwrap_or_else(|| RoundFormat::plain(config.slide_items));

        let mut quiz_cache = QuizCache::new(quiz, records.count_rounds(), records.count_teams());
        quiz_cache.changed_all();

        let mut contest_cache = ContestCache::new(contest, format);
        if contest_cache.contest.quizmaster_round > 0 {
            // the tie flag is derived, not stored
            contest_cache.is_tied =
                scoring::rank(records, &quiz_cache, contest_cache.contest.quizmaster_round).is_tied;
        }
        contest_cache.changed_sync();
        sequencer::set_prompts(&quiz_cache, &mut contest_cache);

        let team_access = DashMap::new();
        fill_team_access(&team_access, records);

        store.commit(tx).await?;

        info!(
            title = %quiz_cache.quiz.title,
            rounds = quiz_cache.counts.total(),
            teams = quiz_cache.n_teams,
            page = ?contest_cache.contest.current_page,
            round = contest_cache.contest.current_round,
            "quiz loaded"
        );

        let (worker, rx) = mpsc::channel(config.worker_queue);
        let uploads = Arc::new(UploadRegistry::new(config.upload_wait));
        let gate_timeout = config.gate_timeout;

        let state = Arc::new(Self {
            store,
            config,
            quiz: RwLock::new(quiz_cache),
            contest: RwLock::new(contest_cache),
            team_access,
            uploads,
            worker,
            gate_timeout,
        });
        Ok((state, rx))
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Store holding the committed records.
    pub fn store(&self) -> Arc<dyn QuizStore> {
        self.store.clone()
    }

    /// Registry of uploaded media, also the binder used by the round worker.
    pub fn uploads(&self) -> Arc<UploadRegistry> {
        self.uploads.clone()
    }

    /// Reload the team access cache from committed records.
    pub async fn cache_teams(&self) -> Result<(), ServiceError> {
        let records = self.store.snapshot().await?;
        self.team_access.clear();
        fill_team_access(&self.team_access, &records);
        Ok(())
    }

    /// Drop a deleted team from the access cache.
    pub fn forget_team(&self, team_id: u64) {
        self.team_access.remove(&team_id);
    }

    /// Check a team's access token.
    pub fn team_access_ok(&self, team_id: u64, access: &str) -> bool {
        self.team_access
            .get(&team_id)
            .is_some_and(|token| token.value() == access)
    }

    /// Hand a committed round edit to the worker. A full queue leaves the operation pending in
    /// the ledger for the next recovery pass.
    pub fn enqueue_round_update(&self, update: RoundUpdate) {
        if let Err(err) = self.worker.try_send(update) {
            warn!(error = %err, "round worker queue unavailable; operation left pending");
        }
    }

    /// Queue a recovered operation, waiting for room in the queue.
    pub async fn requeue_round_update(&self, update: RoundUpdate) -> bool {
        self.worker.send(update).await.is_ok()
    }
}

fn fill_team_access(cache: &DashMap<u64, String>, records: &Records) {
    for team in records.teams_by_name() {
        cache.insert(team.id, team.access.clone());
    }
}
