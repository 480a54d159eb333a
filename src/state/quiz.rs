//! Cached quiz parameters, round counts and the quiz-level revision counters.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::dao::models::QuizEntity;

const LOW_31_BITS: u64 = (1 << 31) - 1;

/// "Changed since" marker handed to polling clients.
///
/// Values are 31-bit wall-clock seconds, so they fit a JavaScript integer, but a bump always
/// moves forward even when two changes land in the same second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Revision(i64);

impl Revision {
    /// Raw value sent to clients.
    pub fn value(self) -> i64 {
        self.0
    }

    /// Move forward, to now or past the last value.
    pub fn bump(&mut self) {
        self.0 = (self.0 + 1).max(timestamp());
    }

    /// True when a client's last-seen value is out of date.
    pub fn differs(self, seen: i64) -> bool {
        self.0 != seen
    }
}

fn timestamp() -> i64 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default();
    (secs & LOW_31_BITS) as i64
}

/// Split of the configured rounds into full and tie-break rounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundCounts {
    /// Rounds counted towards the total.
    pub full: u32,
    /// Tie-break rounds after the full rounds.
    pub tie: u32,
    /// Rounds whose answers are shown after later questions.
    pub deferred: u32,
}

impl RoundCounts {
    /// Derive the counts from the rounds created so far and the quiz settings.
    pub fn new(n_rounds: u32, n_tie_breakers: u32, n_deferred: u32) -> Self {
        let (full, tie) = if n_rounds == 0 {
            (0, 0)
        } else if n_rounds <= n_tie_breakers {
            // always at least one full round
            (1, n_rounds - 1)
        } else {
            (n_rounds - n_tie_breakers, n_tie_breakers)
        };

        let deferred = if n_deferred >= full {
            // answers for the final round must come before the end
            full.saturating_sub(1)
        } else {
            n_deferred
        };

        Self {
            full,
            tie,
            deferred,
        }
    }

    /// Every round in the quiz.
    pub fn total(&self) -> u32 {
        self.full + self.tie
    }

    /// Deferred rounds in effect at `n_round`; tie-breaks never defer.
    pub fn defer_at(&self, n_round: u32) -> u32 {
        if n_round <= self.full {
            self.deferred
        } else {
            0
        }
    }
}

/// Quiz-level revision counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuizRevisions {
    /// Published scores.
    pub published: Revision,
    /// Team responses.
    pub response: Revision,
    /// Anything a scorer's console shows.
    pub scorer: Revision,
}

/// In-memory copy of the quiz record and values derived from it.
#[derive(Debug, Clone)]
pub struct QuizCache {
    /// Quiz record as persisted.
    pub quiz: QuizEntity,
    /// Round counts derived from the settings.
    pub counts: RoundCounts,
    /// Change markers for polling clients.
    pub revisions: QuizRevisions,
    /// Teams registered.
    pub n_teams: u32,
    dirty: bool,
}

impl QuizCache {
    /// Clean cache over a loaded quiz record.
    pub fn new(quiz: QuizEntity, n_rounds: u32, n_teams: u32) -> Self {
        let counts = RoundCounts::new(n_rounds, quiz.n_tie_breakers, quiz.n_deferred);
        Self {
            quiz,
            counts,
            revisions: QuizRevisions::default(),
            n_teams,
            dirty: false,
        }
    }

    /// Mutable access to the quiz record, marking the cache for persistence.
    pub fn quiz_mut(&mut self) -> &mut QuizEntity {
        self.dirty = true;
        &mut self.quiz
    }

    /// The quiz record changed since it was last saved.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Recompute the round counts after rounds or settings changed.
    pub fn set_num_rounds(&mut self, n_rounds: u32) {
        self.counts = RoundCounts::new(n_rounds, self.quiz.n_tie_breakers, self.quiz.n_deferred);
    }

    /// Scores were published.
    pub fn changed_published(&mut self) {
        self.revisions.published.bump();
        self.revisions.scorer.bump();
    }

    /// A team submitted or changed responses.
    pub fn changed_response(&mut self) {
        self.revisions.response.bump();
        self.revisions.scorer.bump();
    }

    /// Something on a scorer's console changed.
    pub fn changed_scorer(&mut self) {
        self.revisions.scorer.bump();
    }

    /// Everything shown to clients may have changed.
    pub fn changed_all(&mut self) {
        self.revisions.published.bump();
        self.revisions.response.bump();
        self.revisions.scorer.bump();
    }
}
