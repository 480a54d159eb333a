use crate::{
    dao::models::{ContestEntity, Page, StaticPage},
    state::{format::RoundFormat, quiz::Revision},
};

/// Prompter text shown on the quizmaster's console.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prompts {
    /// What the quizmaster should do now.
    pub do_now: String,
    /// What comes after.
    pub do_next: String,
}

/// In-memory copy of the live contest cursor, plus state derived while sequencing.
#[derive(Debug, Clone)]
pub struct ContestCache {
    /// Cursor as persisted.
    pub contest: ContestEntity,
    /// Decoded format of the current round.
    pub format: RoundFormat,
    /// A tie was detected at the last ranking.
    pub is_tied: bool,
    /// Quizmaster prompter.
    pub prompts: Prompts,
    /// Controller synchronisation; a step request must quote the latest value.
    pub sync: Revision,
    /// Anything the quizmaster's console shows.
    pub quizmaster: Revision,
    dirty: bool,
}

impl ContestCache {
    /// Clean cache over a loaded cursor.
    pub fn new(contest: ContestEntity, format: RoundFormat) -> Self {
        Self {
            contest,
            format,
            is_tied: false,
            prompts: Prompts::default(),
            sync: Revision::default(),
            quizmaster: Revision::default(),
            dirty: false,
        }
    }

    /// Mutable access to the cursor, marking the cache for persistence.
    pub fn contest_mut(&mut self) -> &mut ContestEntity {
        self.dirty = true;
        &mut self.contest
    }

    /// The cursor changed since it was last saved.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Drop pending changes from persistence, used when a poll changed nothing.
    pub fn cancel_update(&mut self) {
        self.dirty = false;
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Invalidate the controller's sync value so stale step requests are refused.
    pub fn changed_sync(&mut self) {
        self.sync.bump();
    }

    /// The quizmaster's console needs reloading.
    pub fn changed_quizmaster(&mut self) {
        self.quizmaster.bump();
    }

    /// Page parameter: the static sub-page code, or the current round.
    pub fn param(&self) -> u32 {
        if self.contest.current_page == Page::Static {
            self.contest.current_static.code().into()
        } else {
            self.contest.current_round
        }
    }

    /// Reset the cursor for a quiz restart.
    pub fn restart(&mut self) {
        self.is_tied = false;
        let contest = self.contest_mut();
        contest.current_page = Page::Static;
        contest.current_static = StaticPage::Start;
        contest.current_round = 1;
        contest.current_index = 0;
        contest.leaderboard_index = 0;
        contest.quizmaster_round = 0;
        contest.scoreboard_round = 0;
        contest.touch_controller = true;
    }
}
