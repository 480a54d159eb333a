use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use futures::future::BoxFuture;
use tokio::fs;
use tracing::info;

use crate::dao::{
    quiz_store::{MemoryQuizStore, QuizStore, Transaction},
    records::Records,
    storage::{StorageError, StorageResult},
};

/// Store that keeps a JSON snapshot of the records on disk, so a restarted server resumes the
/// quiz exactly where it stopped.
#[derive(Clone)]
pub struct FileQuizStore {
    path: Arc<PathBuf>,
    memory: MemoryQuizStore,
}

impl FileQuizStore {
    /// Load the snapshot at `path`, starting empty when no snapshot exists yet.
    pub async fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        let records = match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Records>(&bytes).map_err(|err| {
                StorageError::corrupt(format!("decoding {}", path.display()), err)
            })?,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "no quiz snapshot found; starting empty");
                Records::default()
            }
            Err(err) => {
                return Err(StorageError::unavailable(
                    format!("reading {}", path.display()),
                    err,
                ));
            }
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|err| {
                StorageError::unavailable(format!("creating {}", parent.display()), err)
            })?;
        }

        Ok(Self {
            path: Arc::new(path),
            memory: MemoryQuizStore::with_records(records),
        })
    }

    async fn persist(path: &Path, records: &Records) -> StorageResult<()> {
        let bytes = serde_json::to_vec(records)
            .map_err(|err| StorageError::corrupt("encoding records".into(), err))?;

        let staging = path.with_extension("tmp");
        fs::write(&staging, &bytes).await.map_err(|err| {
            StorageError::unavailable(format!("writing {}", staging.display()), err)
        })?;
        fs::rename(&staging, path).await.map_err(|err| {
            StorageError::unavailable(format!("replacing {}", path.display()), err)
        })
    }
}

impl QuizStore for FileQuizStore {
    fn snapshot(&self) -> BoxFuture<'static, StorageResult<Arc<Records>>> {
        self.memory.snapshot()
    }

    fn begin(&self) -> BoxFuture<'static, StorageResult<Transaction>> {
        self.memory.begin()
    }

    fn commit(&self, tx: Transaction) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            if !tx.is_touched() {
                return Ok(());
            }
            let (records, permit) = tx.into_parts();
            // a failed write drops the permit with the working copy, leaving the committed state as it was
            Self::persist(&store.path, &records).await?;
            store.memory.publish(records, permit).await;
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let path = self.path.clone();
        Box::pin(async move {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            fs::metadata(dir)
                .await
                .map(|_| ())
                .map_err(|err| StorageError::unavailable(format!("checking {}", dir.display()), err))
        })
    }
}
