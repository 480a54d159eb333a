//! Media binding for round edits.
//!
//! Uploads arrive under the transaction id of the edit that references them. Until a round
//! worker binds them they are "claimed" by nobody and could be swept as abandoned; binding
//! claims every upload of the transaction, waits for processing to finish and then maps each
//! pending question reference to the processed version.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::{Duration, Instant},
};

use dashmap::DashMap;
use futures::future::BoxFuture;
use thiserror::Error;
use tokio::{sync::Notify, time::timeout};
use tracing::{debug, info};

use crate::dao::models::{MediaRef, TxId};

/// Failures of the media binder.
#[derive(Debug, Error)]
pub enum MediaError {
    /// A question references a file that was never uploaded.
    #[error("media file {0} not uploaded")]
    Missing(String),
    /// Processing an upload failed.
    #[error("media file {name} failed: {reason}")]
    Failed {
        /// File name.
        name: String,
        /// Why processing failed.
        reason: String,
    },
    /// Uploads were still being processed when the wait expired.
    #[error("uploads for transaction {0} still processing")]
    Timeout(TxId),
}

impl MediaError {
    /// The upload may still turn up: it was never seen by this process or is being processed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, MediaError::Failed { .. })
    }
}

/// Binds the media of one round edit.
pub trait MediaBinder: Send + Sync {
    /// Claim the uploads of `tx` for a round and wait until they are processed.
    fn start_bind(
        &self,
        round_id: u64,
        tx: TxId,
    ) -> BoxFuture<'static, Result<Box<dyn Bind>, MediaError>>;
}

/// An open binding session.
pub trait Bind: Send {
    /// New reference for a question's media, or `None` to leave it unchanged.
    fn file(&mut self, media: &MediaRef) -> Result<Option<MediaRef>, MediaError>;

    /// Release the claimed uploads.
    fn end(self: Box<Self>) -> BoxFuture<'static, Result<(), MediaError>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum UploadState {
    Processing,
    Ready { version: u32 },
    Failed(String),
}

#[derive(Debug, Clone)]
struct Upload {
    state: UploadState,
    claimed: bool,
    received: Instant,
}

#[derive(Default)]
struct RegistryInner {
    uploads: DashMap<(TxId, String), Upload>,
    versions: DashMap<String, AtomicU32>,
    processed: Notify,
}

/// In-process registry of uploaded media files.
#[derive(Clone)]
pub struct UploadRegistry {
    inner: Arc<RegistryInner>,
    wait: Duration,
}

impl UploadRegistry {
    /// Registry whose bind sessions wait at most `wait` for processing.
    pub fn new(wait: Duration) -> Self {
        Self {
            inner: Arc::new(RegistryInner::default()),
            wait,
        }
    }

    /// Note an upload received under an edit transaction, not yet processed.
    pub fn begin_upload(&self, tx: TxId, name: &str) {
        self.inner.uploads.insert(
            (tx, name.to_string()),
            Upload {
                state: UploadState::Processing,
                claimed: false,
                received: Instant::now(),
            },
        );
    }

    /// Mark an upload processed, returning its new version.
    pub fn finish_upload(&self, tx: TxId, name: &str) -> u32 {
        let version = self
            .inner
            .versions
            .entry(name.to_string())
            .or_default()
            .fetch_add(1, Ordering::SeqCst)
            + 1;
        if let Some(mut upload) = self.inner.uploads.get_mut(&(tx, name.to_string())) {
            upload.state = UploadState::Ready { version };
        }
        self.inner.processed.notify_waiters();
        version
    }

    /// Mark an upload failed.
    pub fn fail_upload(&self, tx: TxId, name: &str, reason: impl Into<String>) {
        if let Some(mut upload) = self.inner.uploads.get_mut(&(tx, name.to_string())) {
            upload.state = UploadState::Failed(reason.into());
        }
        self.inner.processed.notify_waiters();
    }

    /// Drop unclaimed uploads older than `age`, returning how many were removed.
    pub fn sweep_abandoned(&self, age: Duration) -> usize {
        let before = self.inner.uploads.len();
        self.inner
            .uploads
            .retain(|_, upload| upload.claimed || upload.received.elapsed() < age);
        before - self.inner.uploads.len()
    }

    fn processing(&self, tx: TxId) -> bool {
        self.inner
            .uploads
            .iter()
            .any(|entry| entry.key().0 == tx && entry.value().state == UploadState::Processing)
    }

    fn claim(&self, tx: TxId) -> usize {
        let mut claimed = 0;
        for mut entry in self.inner.uploads.iter_mut() {
            if entry.key().0 == tx {
                entry.value_mut().claimed = true;
                claimed += 1;
            }
        }
        claimed
    }

    async fn wait_processed(&self, tx: TxId) -> Result<(), MediaError> {
        let waiting = async {
            loop {
                let notified = self.inner.processed.notified();
                if !self.processing(tx) {
                    return;
                }
                notified.await;
            }
        };
        timeout(self.wait, waiting)
            .await
            .map_err(|_| MediaError::Timeout(tx))
    }
}

impl MediaBinder for UploadRegistry {
    fn start_bind(
        &self,
        round_id: u64,
        tx: TxId,
    ) -> BoxFuture<'static, Result<Box<dyn Bind>, MediaError>> {
        let registry = self.clone();
        Box::pin(async move {
            let claimed = registry.claim(tx);
            debug!(round = round_id, tx = %tx, claimed, "binding round media");
            registry.wait_processed(tx).await?;
            Ok(Box::new(RegistryBind { registry, tx }) as Box<dyn Bind>)
        })
    }
}

struct RegistryBind {
    registry: UploadRegistry,
    tx: TxId,
}

impl Bind for RegistryBind {
    fn file(&mut self, media: &MediaRef) -> Result<Option<MediaRef>, MediaError> {
        let MediaRef::Pending { tx, name } = media else {
            return Ok(None);
        };
        if *tx != self.tx {
            // belongs to another edit
            return Ok(None);
        }

        let key = (self.tx, name.clone());
        let upload = self
            .registry
            .inner
            .uploads
            .get(&key)
            .map(|upload| upload.state.clone());
        match upload {
            Some(UploadState::Ready { version }) => Ok(Some(MediaRef::Bound {
                name: name.clone(),
                version,
            })),
            Some(UploadState::Failed(reason)) => Err(MediaError::Failed {
                name: name.clone(),
                reason,
            }),
            Some(UploadState::Processing) => Err(MediaError::Timeout(self.tx)),
            None => Err(MediaError::Missing(name.clone())),
        }
    }

    fn end(self: Box<Self>) -> BoxFuture<'static, Result<(), MediaError>> {
        Box::pin(async move {
            let tx = self.tx;
            let before = self.registry.inner.uploads.len();
            self.registry.inner.uploads.retain(|key, _| key.0 != tx);
            let released = before - self.registry.inner.uploads.len();
            if released > 0 {
                info!(tx = %tx, released, "released round edit uploads");
            }
            Ok(())
        })
    }
}
