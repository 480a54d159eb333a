//! Typed record tables shared by every storage backend.
//!
//! A [`Records`] value is the complete durable state of one quiz. Backends hand out a committed
//! copy for readers and a working copy inside each transaction, so all queries here are plain
//! synchronous functions over owned data.

use std::{cmp::Reverse, collections::BTreeMap};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{
    ContestEntity, OperationEntity, OperationStatus, QuestionEntity, QuizEntity, ResponseEntity,
    RoundEntity, ScoreEntity, TeamEntity,
};

/// All tables for a single quiz deployment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Records {
    next_id: u64,
    quiz: Option<QuizEntity>,
    contest: Option<ContestEntity>,
    rounds: BTreeMap<u64, RoundEntity>,
    questions: BTreeMap<u64, QuestionEntity>,
    teams: BTreeMap<u64, TeamEntity>,
    responses: BTreeMap<u64, ResponseEntity>,
    scores: BTreeMap<u64, ScoreEntity>,
    /// Round edit ledger in the order operations were recorded.
    operations: IndexMap<Uuid, OperationEntity>,
}

impl Records {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Create the quiz and its contest on first use, returning both.
    pub fn ensure_quiz(&mut self) -> (QuizEntity, ContestEntity) {
        let quiz = match self.quiz.clone() {
            Some(quiz) => quiz,
            None => {
                let quiz = QuizEntity::with_defaults(self.allocate_id());
                self.quiz = Some(quiz.clone());
                quiz
            }
        };
        let contest = match self.contest.clone() {
            Some(contest) => contest,
            None => {
                let contest = ContestEntity::new(self.allocate_id(), quiz.id);
                self.contest = Some(contest.clone());
                contest
            }
        };
        (quiz, contest)
    }

    /// The quiz record, once created.
    pub fn quiz(&self) -> Option<&QuizEntity> {
        self.quiz.as_ref()
    }

    /// Replace the quiz record.
    pub fn save_quiz(&mut self, quiz: QuizEntity) {
        self.quiz = Some(quiz);
    }

    /// Live cursor of the quiz.
    pub fn contest(&self) -> Option<&ContestEntity> {
        self.contest.as_ref()
    }

    /// Replace the contest cursor.
    pub fn save_contest(&mut self, contest: ContestEntity) {
        self.contest = Some(contest);
    }

    // ---------------------------------------------------------------------------
    // Rounds and questions
    // ---------------------------------------------------------------------------

    /// Rounds in quiz order.
    pub fn rounds(&self) -> Vec<&RoundEntity> {
        let mut rounds: Vec<_> = self.rounds.values().collect();
        rounds.sort_by_key(|round| (round.quiz_order, round.id));
        rounds
    }

    /// Round by id.
    pub fn round(&self, id: u64) -> Option<&RoundEntity> {
        self.rounds.get(&id)
    }

    /// Round at a 1-based position in the quiz.
    pub fn round_by_order(&self, n_round: u32) -> Option<&RoundEntity> {
        self.rounds.values().find(|round| round.quiz_order == n_round)
    }

    /// Rounds defined so far.
    pub fn count_rounds(&self) -> u32 {
        self.rounds.len() as u32
    }

    /// Insert a round (id 0) or update an existing one, returning its id.
    pub fn save_round(&mut self, mut round: RoundEntity) -> u64 {
        if round.id == 0 {
            round.id = self.allocate_id();
        }
        let id = round.id;
        self.rounds.insert(id, round);
        id
    }

    /// Delete a round together with its questions and their responses.
    pub fn delete_round(&mut self, id: u64) -> Option<RoundEntity> {
        let removed = self.rounds.remove(&id)?;
        let question_ids: Vec<u64> = self
            .questions
            .values()
            .filter(|question| question.round == id)
            .map(|question| question.id)
            .collect();
        for question_id in question_ids {
            self.delete_question(question_id);
        }
        Some(removed)
    }

    /// Questions for a round in order. When two questions share an order the newer one comes
    /// first, so an inserted question takes the place of the one it displaced.
    pub fn questions_for_round(&self, round_id: u64) -> Vec<&QuestionEntity> {
        let mut questions: Vec<_> = self
            .questions
            .values()
            .filter(|question| question.round == round_id)
            .collect();
        questions.sort_by_key(|question| (question.quiz_order, Reverse(question.id)));
        questions
    }

    /// Question by id.
    pub fn question(&self, id: u64) -> Option<&QuestionEntity> {
        self.questions.get(&id)
    }

    /// Insert a question (id 0) or update an existing one, returning its id.
    pub fn save_question(&mut self, mut question: QuestionEntity) -> u64 {
        if question.id == 0 {
            question.id = self.allocate_id();
        }
        let id = question.id;
        self.questions.insert(id, question);
        id
    }

    /// Delete a question with its responses.
    pub fn delete_question(&mut self, id: u64) -> Option<QuestionEntity> {
        let removed = self.questions.remove(&id)?;
        self.responses.retain(|_, response| response.question != id);
        Some(removed)
    }

    // ---------------------------------------------------------------------------
    // Teams
    // ---------------------------------------------------------------------------

    /// Teams ordered by name.
    pub fn teams_by_name(&self) -> Vec<&TeamEntity> {
        let mut teams: Vec<_> = self.teams.values().collect();
        teams.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        teams
    }

    /// Team by id.
    pub fn team(&self, id: u64) -> Option<&TeamEntity> {
        self.teams.get(&id)
    }

    /// Teams registered.
    pub fn count_teams(&self) -> u32 {
        self.teams.len() as u32
    }

    /// Insert a team (id 0) or update an existing one, returning its id.
    pub fn save_team(&mut self, mut team: TeamEntity) -> u64 {
        if team.id == 0 {
            team.id = self.allocate_id();
        }
        let id = team.id;
        self.teams.insert(id, team);
        id
    }

    /// Delete a team together with its responses and scores.
    pub fn delete_team(&mut self, id: u64) -> Option<TeamEntity> {
        let removed = self.teams.remove(&id)?;
        self.responses.retain(|_, response| response.team != id);
        self.scores.retain(|_, score| score.team != id);
        Some(removed)
    }

    // ---------------------------------------------------------------------------
    // Responses
    // ---------------------------------------------------------------------------

    /// Responses to a question, ordered by team name.
    pub fn responses_for_question(&self, question_id: u64) -> Vec<&ResponseEntity> {
        let mut responses: Vec<_> = self
            .responses
            .values()
            .filter(|response| response.question == question_id)
            .collect();
        responses.sort_by(|a, b| {
            let name_a = self.teams.get(&a.team).map(|team| team.name.as_str());
            let name_b = self.teams.get(&b.team).map(|team| team.name.as_str());
            name_a.cmp(&name_b).then(a.team.cmp(&b.team))
        });
        responses
    }

    /// Every question of a round paired with the team's response, if any.
    pub fn responses_for_team_round(
        &self,
        team_id: u64,
        round_id: u64,
    ) -> Vec<(&QuestionEntity, Option<&ResponseEntity>)> {
        self.questions_for_round(round_id)
            .into_iter()
            .map(|question| {
                let response = self
                    .responses
                    .values()
                    .find(|response| response.question == question.id && response.team == team_id);
                (question, response)
            })
            .collect()
    }

    /// Insert a response (id 0) or update an existing one, returning its id.
    pub fn save_response(&mut self, mut response: ResponseEntity) -> u64 {
        if response.id == 0 {
            response.id = self.allocate_id();
        }
        let id = response.id;
        self.responses.insert(id, response);
        id
    }

    /// True when the team has at least one response for the round.
    pub fn team_responded(&self, team_id: u64, round_id: u64) -> bool {
        self.responses.values().any(|response| {
            response.team == team_id
                && self
                    .questions
                    .get(&response.question)
                    .is_some_and(|question| question.round == round_id)
        })
    }

    /// Number of teams with at least one response for the round.
    pub fn count_responded(&self, round_id: u64) -> u32 {
        self.teams
            .keys()
            .filter(|team_id| self.team_responded(**team_id, round_id))
            .count() as u32
    }

    /// Teams that responded to a round, each with the sum of its response scores.
    ///
    /// Confirmed scores take precedence over working scores.
    pub fn response_totals(&self, round_id: u64) -> Vec<(u64, f64)> {
        let mut totals: BTreeMap<u64, f64> = BTreeMap::new();
        for response in self.responses.values() {
            let in_round = self
                .questions
                .get(&response.question)
                .is_some_and(|question| question.round == round_id);
            if in_round && self.teams.contains_key(&response.team) {
                let value = response.confirmed.or(response.score).unwrap_or(0.0);
                *totals.entry(response.team).or_default() += value;
            }
        }
        totals.into_iter().collect()
    }

    /// Drop every response, as on a restart.
    pub fn clear_responses(&mut self) {
        self.responses.clear();
    }

    // ---------------------------------------------------------------------------
    // Scores
    // ---------------------------------------------------------------------------

    /// Score of a team for a round.
    pub fn score_for(&self, team_id: u64, n_round: u32) -> Option<&ScoreEntity> {
        self.scores
            .values()
            .find(|score| score.team == team_id && score.round == n_round)
    }

    /// Scores recorded for a round, any order.
    pub fn scores_for_round(&self, n_round: u32) -> Vec<&ScoreEntity> {
        self.scores
            .values()
            .filter(|score| score.round == n_round)
            .collect()
    }

    /// Scores for a team up to and including a round, in round order.
    pub fn scores_for_team(&self, team_id: u64, to_round: u32) -> Vec<&ScoreEntity> {
        let mut scores: Vec<_> = self
            .scores
            .values()
            .filter(|score| score.team == team_id && score.round <= to_round)
            .collect();
        scores.sort_by_key(|score| score.round);
        scores
    }

    /// Insert a score (id 0) or update an existing one, returning its id.
    pub fn save_score(&mut self, mut score: ScoreEntity) -> u64 {
        if score.id == 0 {
            score.id = self.allocate_id();
        }
        let id = score.id;
        self.scores.insert(id, score);
        id
    }

    /// Remove a score.
    pub fn delete_score(&mut self, id: u64) {
        self.scores.remove(&id);
    }

    /// Drop every round score.
    pub fn clear_scores(&mut self) {
        self.scores.clear();
    }

    /// Cumulative score for every team through a round.
    pub fn totals_through(&self, n_round: u32) -> Vec<(u64, f64)> {
        self.teams
            .keys()
            .map(|team_id| {
                let total = self
                    .scores_for_team(*team_id, n_round)
                    .iter()
                    .filter_map(|score| score.value)
                    .sum();
                (*team_id, total)
            })
            .collect()
    }

    // ---------------------------------------------------------------------------
    // Operation ledger
    // ---------------------------------------------------------------------------

    /// Add an entry to the ledger.
    pub fn record_operation(&mut self, operation: OperationEntity) {
        self.operations.insert(operation.id, operation);
    }

    /// Ledger entry by id.
    pub fn operation(&self, id: Uuid) -> Option<&OperationEntity> {
        self.operations.get(&id)
    }

    /// Update an operation's status, returning false when it is unknown.
    pub fn set_operation_status(&mut self, id: Uuid, status: OperationStatus) -> bool {
        match self.operations.get_mut(&id) {
            Some(op) => {
                op.status = status;
                true
            }
            None => false,
        }
    }

    /// Operations still waiting for the worker, oldest first.
    pub fn pending_operations(&self) -> Vec<&OperationEntity> {
        self.operations
            .values()
            .filter(|op| op.status == OperationStatus::Pending)
            .collect()
    }

    /// Drop completed operations from the ledger.
    pub fn prune_operations(&mut self) {
        self.operations
            .retain(|_, op| op.status == OperationStatus::Pending);
    }
}
