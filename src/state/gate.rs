//! Lock and transaction discipline around the two caches.
//!
//! Every operation picks one of four modes. Locks are always taken quiz first, then contest,
//! then the store's writer permit. Mutating closures run against clones of the caches and a
//! working copy of the records: when the closure returns `Ok` the dirty caches are written into
//! the transaction, the transaction commits and only then are the clones installed. Any error,
//! or a panic inside the closure, leaves both caches and the store untouched.

use std::future::Future;

use tokio::time::timeout;
use tracing::{error, info};

use crate::{
    config::AppConfig,
    dao::{quiz_store::Transaction, records::Records},
    error::ServiceError,
    state::{AppState, contest::ContestCache, quiz::QuizCache},
};

/// Shared view for polling and other read-only operations.
pub struct ReadScope<'a> {
    /// Quiz cache.
    pub quiz: &'a QuizCache,
    /// Contest cache.
    pub contest: &'a ContestCache,
    /// Committed records.
    pub records: &'a Records,
    /// Runtime configuration.
    pub config: &'a AppConfig,
}

/// Exclusive quiz cache plus a transaction.
pub struct QuizScope<'a> {
    /// Quiz cache.
    pub quiz: &'a mut QuizCache,
    /// Open transaction, committed when the closure succeeds.
    pub tx: &'a mut Transaction,
    /// Runtime configuration.
    pub config: &'a AppConfig,
}

/// Exclusive contest cache, shared quiz cache, plus a transaction.
pub struct ContestScope<'a> {
    /// Quiz cache.
    pub quiz: &'a QuizCache,
    /// Contest cache.
    pub contest: &'a mut ContestCache,
    /// Open transaction.
    pub tx: &'a mut Transaction,
    /// Runtime configuration.
    pub config: &'a AppConfig,
}

/// Both caches exclusively under one transaction.
pub struct FullScope<'a> {
    /// Quiz cache.
    pub quiz: &'a mut QuizCache,
    /// Contest cache.
    pub contest: &'a mut ContestCache,
    /// Open transaction.
    pub tx: &'a mut Transaction,
    /// Runtime configuration.
    pub config: &'a AppConfig,
}

impl AppState {
    async fn bounded<F: Future>(&self, fut: F) -> Result<F::Output, ServiceError> {
        match self.gate_timeout {
            Some(limit) => timeout(limit, fut).await.map_err(|_| ServiceError::Timeout),
            None => Ok(fut.await),
        }
    }

    async fn begin(&self) -> Result<Transaction, ServiceError> {
        self.bounded(self.store.begin()).await?.map_err(Into::into)
    }

    async fn finish<T>(
        &self,
        tx: Transaction,
        outcome: Result<T, ServiceError>,
        quiz: Option<&mut QuizCache>,
        contest: Option<&mut ContestCache>,
    ) -> Result<T, ServiceError> {
        let mut tx = tx;
        let value = match outcome {
            Ok(value) => value,
            Err(err) => {
                if err.is_client_error() {
                    info!(error = %err, "request refused; rolling back");
                } else {
                    error!(error = %err, "operation failed; rolling back");
                }
                return Err(err);
            }
        };

        if let Some(quiz) = quiz {
            if quiz.is_dirty() {
                tx.records_mut().save_quiz(quiz.quiz.clone());
                quiz.clear_dirty();
            }
        }
        if let Some(contest) = contest {
            if contest.is_dirty() {
                tx.records_mut().save_contest(contest.contest.clone());
                contest.clear_dirty();
            }
        }

        if let Err(err) = self.store.commit(tx).await {
            error!(error = %err, "commit failed; changes discarded");
            return Err(err.into());
        }
        Ok(value)
    }

    /// Read-only mode: shared locks on both caches, committed records, no transaction.
    pub async fn read<T>(&self, work: impl FnOnce(&ReadScope<'_>) -> T) -> Result<T, ServiceError> {
        let quiz = self.bounded(self.quiz.read()).await?;
        let contest = self.bounded(self.contest.read()).await?;
        let records = self.store.snapshot().await?;

        let scope = ReadScope {
            quiz: &quiz,
            contest: &contest,
            records: &records,
            config: &self.config,
        };
        Ok(work(&scope))
    }

    /// Quiz-mutating mode.
    pub async fn update_quiz<T>(
        &self,
        work: impl FnOnce(&mut QuizScope<'_>) -> Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        let mut guard = self.bounded(self.quiz.write()).await?;
        let mut tx = self.begin().await?;

        let mut quiz = guard.clone();
        let outcome = work(&mut QuizScope {
            quiz: &mut quiz,
            tx: &mut tx,
            config: &self.config,
        });

        let value = self.finish(tx, outcome, Some(&mut quiz), None).await?;
        *guard = quiz;
        Ok(value)
    }

    /// Display-mutating mode.
    pub async fn update_contest<T>(
        &self,
        work: impl FnOnce(&mut ContestScope<'_>) -> Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        let quiz = self.bounded(self.quiz.read()).await?;
        let mut guard = self.bounded(self.contest.write()).await?;
        let mut tx = self.begin().await?;

        let mut contest = guard.clone();
        let outcome = work(&mut ContestScope {
            quiz: &quiz,
            contest: &mut contest,
            tx: &mut tx,
            config: &self.config,
        });

        let value = self.finish(tx, outcome, None, Some(&mut contest)).await?;
        *guard = contest;
        Ok(value)
    }

    /// Both caches under one transaction.
    pub async fn update_all<T>(
        &self,
        work: impl FnOnce(&mut FullScope<'_>) -> Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        let mut quiz_guard = self.bounded(self.quiz.write()).await?;
        let mut contest_guard = self.bounded(self.contest.write()).await?;
        let mut tx = self.begin().await?;

        let mut quiz = quiz_guard.clone();
        let mut contest = contest_guard.clone();
        let outcome = work(&mut FullScope {
            quiz: &mut quiz,
            contest: &mut contest,
            tx: &mut tx,
            config: &self.config,
        });

        let value = self
            .finish(tx, outcome, Some(&mut quiz), Some(&mut contest))
            .await?;
        *quiz_guard = quiz;
        *contest_guard = contest;
        Ok(value)
    }
}
