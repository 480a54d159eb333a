/// JSON snapshot persisted to a file.
pub mod file;
/// Volatile store for tests and demos.
pub mod memory;

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::OwnedMutexGuard;

use crate::dao::{records::Records, storage::StorageResult};

pub use self::{file::FileQuizStore, memory::MemoryQuizStore};

/// Abstraction over the persistence layer for the quiz records.
///
/// Readers work from an immutable committed snapshot. Writers open a [`Transaction`], which holds
/// the store's single writer permit and a working copy of every table; committing publishes the
/// copy, dropping the transaction discards it.
pub trait QuizStore: Send + Sync {
    fn snapshot(&self) -> BoxFuture<'static, StorageResult<Arc<Records>>>;
    fn begin(&self) -> BoxFuture<'static, StorageResult<Transaction>>;
    fn commit(&self, tx: Transaction) -> BoxFuture<'static, StorageResult<()>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Exclusive write access to a working copy of the records.
pub struct Transaction {
    records: Records,
    permit: OwnedMutexGuard<()>,
    touched: bool,
}

impl Transaction {
    pub(crate) fn new(records: Records, permit: OwnedMutexGuard<()>) -> Self {
        Self {
            records,
            permit,
            touched: false,
        }
    }

    /// Working copy of the records.
    pub fn records(&self) -> &Records {
        &self.records
    }

    /// Writable working copy; the transaction will save on commit.
    pub fn records_mut(&mut self) -> &mut Records {
        self.touched = true;
        &mut self.records
    }

    /// True once the working copy has been borrowed for writing.
    pub fn is_touched(&self) -> bool {
        self.touched
    }

    /// Split into the working copy and the writer permit, for backends completing a commit.
    pub(crate) fn into_parts(self) -> (Records, OwnedMutexGuard<()>) {
        (self.records, self.permit)
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction").finish_non_exhaustive()
    }
}
