use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::dao::{
    quiz_store::{QuizStore, Transaction},
    records::Records,
    storage::StorageResult,
};

/// Volatile store: records live only as long as the process.
#[derive(Clone, Default)]
pub struct MemoryQuizStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    committed: RwLock<Arc<Records>>,
    writer: Arc<Mutex<()>>,
}

impl MemoryQuizStore {
    /// Empty store; the quiz is created on first load.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with previously persisted records.
    pub fn with_records(records: Records) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                committed: RwLock::new(Arc::new(records)),
                writer: Arc::new(Mutex::new(())),
            }),
        }
    }

    pub(super) async fn committed(&self) -> Arc<Records> {
        self.inner.committed.read().await.clone()
    }

    pub(super) async fn open_transaction(&self) -> Transaction {
        let permit = self.inner.writer.clone().lock_owned().await;
        let records = Records::clone(&*self.committed().await);
        Transaction::new(records, permit)
    }

    /// Make a working copy visible to readers. The permit is released only once the swap is done.
    pub(super) async fn publish(&self, records: Records, permit: OwnedMutexGuard<()>) {
        *self.inner.committed.write().await = Arc::new(records);
        drop(permit);
    }
}

impl QuizStore for MemoryQuizStore {
    fn snapshot(&self) -> BoxFuture<'static, StorageResult<Arc<Records>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.committed().await) })
    }

    fn begin(&self) -> BoxFuture<'static, StorageResult<Transaction>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.open_transaction().await) })
    }

    fn commit(&self, tx: Transaction) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            if !tx.is_touched() {
                return Ok(());
            }
            let (records, permit) = tx.into_parts();
            store.publish(records, permit).await;
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let store = MemoryQuizStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.records_mut().ensure_quiz();
        }
        assert!(store.snapshot().await.unwrap().quiz().is_none());

        let mut tx = store.begin().await.unwrap();
        tx.records_mut().ensure_quiz();
        store.commit(tx).await.unwrap();
        assert!(store.snapshot().await.unwrap().quiz().is_some());
    }

    #[tokio::test]
    async fn writers_are_serialized() {
        let store = MemoryQuizStore::new();
        let tx = store.begin().await.unwrap();

        let second = store.clone();
        let pending = tokio::spawn(async move { second.begin().await.map(|_| ()) });
        tokio::task::yield_now().await;
        assert!(!pending.is_finished());

        drop(tx);
        pending.await.unwrap().unwrap();
    }
}
