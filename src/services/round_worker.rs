//! Background worker binding media after round edits.
//!
//! A round edit commits its questions with pending media references and records a
//! [`OperationKind::RoundUpdate`] in the ledger within the same transaction. The worker then
//! binds the uploads, rewrites the references and marks the operation done. Operations still
//! pending at startup are queued again by [`recover`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        models::{OperationEntity, OperationKind, OperationStatus, TxId},
        records::Records,
    },
    error::ServiceError,
    services::media::{Bind, MediaBinder, MediaError},
    state::SharedState,
};

/// A committed round edit waiting for its media to be bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundUpdate {
    /// Ledger entry of the edit.
    pub op_id: Uuid,
    /// Edited or removed round.
    pub round_id: u64,
    /// Transaction the media were uploaded under.
    pub tx: TxId,
}

/// Ledger payload of a round update.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RoundUpdatePayload {
    round_id: u64,
    tx: TxId,
}

impl RoundUpdate {
    /// Record a new round update in the ledger of an open transaction.
    pub fn record(records: &mut Records, round_id: u64, tx: TxId) -> Result<Self, ServiceError> {
        let payload = serde_json::to_value(RoundUpdatePayload { round_id, tx })
            .map_err(|err| ServiceError::InvalidState(format!("operation payload: {err}")))?;
        let op_id = Uuid::new_v4();
        records.record_operation(OperationEntity {
            id: op_id,
            kind: OperationKind::RoundUpdate,
            payload,
            status: OperationStatus::Pending,
            created_at: now_secs(),
        });
        Ok(Self {
            op_id,
            round_id,
            tx,
        })
    }

    /// Round updates still pending in the ledger, oldest first.
    pub fn pending(records: &Records) -> Vec<Self> {
        records
            .pending_operations()
            .into_iter()
            .filter_map(Self::from_operation)
            .collect()
    }

    fn from_operation(op: &OperationEntity) -> Option<Self> {
        if op.kind != OperationKind::RoundUpdate {
            return None;
        }
        let payload: RoundUpdatePayload = serde_json::from_value(op.payload.clone()).ok()?;
        Some(Self {
            op_id: op.id,
            round_id: payload.round_id,
            tx: payload.tx,
        })
    }
}

fn now_secs() -> u64 {
    time::OffsetDateTime::now_utc().unix_timestamp().max(0) as u64
}

/// Run the worker until every sender is dropped.
pub async fn run(
    state: SharedState,
    binder: Arc<dyn MediaBinder>,
    mut rx: mpsc::Receiver<RoundUpdate>,
) {
    info!("round worker started");
    while let Some(update) = rx.recv().await {
        let op_id = update.op_id;
        if let Err(err) = process(&state, binder.as_ref(), update).await {
            warn!(op = %op_id, error = %err, "round update failed; operation left pending");
        }
    }
    info!("round worker stopped");
}

/// Bind the media of one round edit and complete its operation.
///
/// While any referenced upload is missing or still processing nothing is written: the
/// questions keep their pending references, the uploads stay claimed and the operation stays
/// pending for a later delivery.
pub async fn process(
    state: &SharedState,
    binder: &dyn MediaBinder,
    update: RoundUpdate,
) -> Result<(), ServiceError> {
    let pending = state
        .read(|scope| {
            scope
                .records
                .operation(update.op_id)
                .is_some_and(|op| op.status == OperationStatus::Pending)
        })
        .await?;
    if !pending {
        debug!(op = %update.op_id, "round update already done");
        return Ok(());
    }

    let mut bind = binder
        .start_bind(update.round_id, update.tx)
        .await
        .map_err(|err| ServiceError::InvalidState(err.to_string()))?;

    let bound = state
        .update_quiz(|scope| {
            bind_round(scope.tx.records_mut(), &update, bind.as_mut())
                .map_err(|err| ServiceError::InvalidState(format!("media not ready: {err}")))
        })
        .await?;

    bind.end()
        .await
        .map_err(|err| ServiceError::InvalidState(err.to_string()))?;

    state
        .update_quiz(|scope| {
            let records = scope.tx.records_mut();
            records.set_operation_status(update.op_id, OperationStatus::Done);
            records.prune_operations();
            Ok(())
        })
        .await?;

    info!(op = %update.op_id, round = update.round_id, bound, "round update done");
    Ok(())
}

/// Rewrite the media references of a round's questions, returning how many were bound.
/// References whose upload failed are cleared; any other binder error aborts the whole round.
fn bind_round(
    records: &mut Records,
    update: &RoundUpdate,
    bind: &mut dyn Bind,
) -> Result<usize, MediaError> {
    if records.round(update.round_id).is_none() {
        // round removed since the edit
        return Ok(0);
    }

    let questions: Vec<_> = records
        .questions_for_round(update.round_id)
        .into_iter()
        .filter(|question| question.media.is_some())
        .cloned()
        .collect();

    let mut bound = 0;
    for mut question in questions {
        let Some(media) = question.media.as_ref() else {
            continue;
        };
        match bind.file(media) {
            Ok(Some(media)) => {
                question.media = Some(media);
                records.save_question(question);
                bound += 1;
            }
            Ok(None) => {}
            Err(err) if err.is_retryable() => return Err(err),
            Err(err) => {
                warn!(question = question.id, error = %err, "media unusable; cleared");
                question.media = None;
                records.save_question(question);
            }
        }
    }
    Ok(bound)
}

/// Queue every operation left pending by a previous run.
pub async fn recover(state: &SharedState) -> Result<usize, ServiceError> {
    let updates = state.read(|scope| RoundUpdate::pending(scope.records)).await?;

    let mut queued = 0;
    for update in updates {
        if state.requeue_round_update(update).await {
            queued += 1;
        }
    }
    if queued > 0 {
        info!(queued, "recovered pending round updates");
    }
    Ok(queued)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        dao::{
            models::{MediaRef, QuestionEntity, RoundEntity},
            quiz_store::{MemoryQuizStore, QuizStore},
        },
        dto::setup::UploadRequest,
        services::{media::UploadRegistry, setup_service},
        state::tests::test_state,
    };

    struct Seeded {
        store: Arc<MemoryQuizStore>,
        round: u64,
        with_media: u64,
        broken: u64,
        tx: TxId,
        update: RoundUpdate,
    }

    fn seed() -> Seeded {
        let tx = Uuid::new_v4();
        let mut records = Records::default();
        records.ensure_quiz();
        let round = records.save_round(RoundEntity {
            id: 0,
            quiz: 1,
            quiz_order: 1,
            title: "Pictures".into(),
            format: String::new(),
        });
        let mut question = |order: u32, media: &str| {
            records.save_question(QuestionEntity {
                id: 0,
                round,
                quiz_order: order,
                question: format!("Q{order}"),
                answer: format!("A{order}"),
                media: Some(MediaRef::Pending {
                    tx,
                    name: media.into(),
                }),
            })
        };
        let with_media = question(1, "castle.jpg");
        let broken = question(2, "never.jpg");
        let update = RoundUpdate::record(&mut records, round, tx).unwrap();
        Seeded {
            store: Arc::new(MemoryQuizStore::with_records(records)),
            round,
            with_media,
            broken,
            tx,
            update,
        }
    }

    #[tokio::test]
    async fn binds_media_and_completes_operation() {
        let seeded = seed();
        let (state, _rx) = test_state(seeded.store.clone()).await;
        let registry = UploadRegistry::new(Duration::from_secs(1));
        registry.begin_upload(seeded.tx, "castle.jpg");
        registry.finish_upload(seeded.tx, "castle.jpg");
        registry.begin_upload(seeded.tx, "never.jpg");
        registry.fail_upload(seeded.tx, "never.jpg", "unsupported format");

        process(&state, &registry, seeded.update.clone())
            .await
            .unwrap();

        let records = seeded.store.snapshot().await.unwrap();
        assert_eq!(
            records.question(seeded.with_media).unwrap().media,
            Some(MediaRef::Bound {
                name: "castle.jpg".into(),
                version: 1
            })
        );
        assert_eq!(records.question(seeded.broken).unwrap().media, None);
        assert!(records.operation(seeded.update.op_id).is_none());
        assert!(records.pending_operations().is_empty());

        // a second delivery is a no-op
        process(&state, &registry, seeded.update).await.unwrap();
    }

    #[tokio::test]
    async fn removed_round_still_completes() {
        let seeded = seed();
        let (state, _rx) = test_state(seeded.store.clone()).await;
        state
            .update_quiz(|scope| {
                scope.tx.records_mut().delete_round(seeded.round);
                Ok(())
            })
            .await
            .unwrap();

        let registry = UploadRegistry::new(Duration::from_secs(1));
        process(&state, &registry, seeded.update.clone())
            .await
            .unwrap();
        let records = seeded.store.snapshot().await.unwrap();
        assert!(records.pending_operations().is_empty());
    }

    #[tokio::test]
    async fn unprocessed_uploads_leave_operation_pending() {
        let seeded = seed();
        let (state, _rx) = test_state(seeded.store.clone()).await;
        let registry = UploadRegistry::new(Duration::from_millis(10));
        registry.begin_upload(seeded.tx, "castle.jpg");

        assert!(process(&state, &registry, seeded.update.clone()).await.is_err());
        let records = seeded.store.snapshot().await.unwrap();
        assert_eq!(records.pending_operations().len(), 1);
        assert!(matches!(
            records.question(seeded.with_media).unwrap().media,
            Some(MediaRef::Pending { .. })
        ));
    }

    #[tokio::test]
    async fn recovery_requeues_pending_operations() {
        let seeded = seed();
        let (state, mut rx) = test_state(seeded.store.clone()).await;
        assert_eq!(recover(&state).await.unwrap(), 1);
        assert_eq!(rx.recv().await, Some(seeded.update));
    }

    fn still_pending(records: &Records, question: u64) -> bool {
        matches!(
            records.question(question).unwrap().media,
            Some(MediaRef::Pending { .. })
        )
    }

    #[tokio::test]
    async fn restart_with_empty_registry_keeps_media_pending() {
        let seeded = seed();
        // a fresh state over persisted records has never seen the uploads
        let (state, mut rx) = test_state(seeded.store.clone()).await;
        assert_eq!(recover(&state).await.unwrap(), 1);
        let update = rx.recv().await.unwrap();

        let err = process(&state, state.uploads().as_ref(), update)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        let records = seeded.store.snapshot().await.unwrap();
        assert!(still_pending(&records, seeded.with_media));
        assert!(still_pending(&records, seeded.broken));
        assert_eq!(records.pending_operations().len(), 1);

        // uploading again hands the operation back to the worker
        for name in ["castle.jpg", "never.jpg"] {
            setup_service::upload(
                &state,
                UploadRequest {
                    tx: seeded.tx,
                    name: name.into(),
                },
            )
            .await
            .unwrap();
        }
        while let Ok(update) = rx.try_recv() {
            let _ = process(&state, state.uploads().as_ref(), update).await;
        }

        let records = seeded.store.snapshot().await.unwrap();
        assert_eq!(
            records.question(seeded.with_media).unwrap().media,
            Some(MediaRef::Bound {
                name: "castle.jpg".into(),
                version: 1
            })
        );
        assert_eq!(
            records.question(seeded.broken).unwrap().media,
            Some(MediaRef::Bound {
                name: "never.jpg".into(),
                version: 1
            })
        );
        assert!(records.pending_operations().is_empty());
    }

    #[tokio::test]
    async fn upload_processing_at_restart_is_retried() {
        let seeded = seed();
        let (state, mut rx) = test_state(seeded.store.clone()).await;
        recover(&state).await.unwrap();
        let update = rx.recv().await.unwrap();

        let registry = UploadRegistry::new(Duration::from_millis(10));
        registry.begin_upload(seeded.tx, "castle.jpg");
        let err = process(&state, &registry, update.clone()).await;
        assert!(err.is_err());

        let records = seeded.store.snapshot().await.unwrap();
        assert!(still_pending(&records, seeded.with_media));
        assert!(still_pending(&records, seeded.broken));
        assert_eq!(records.pending_operations().len(), 1);

        // processing finishes; the second file turns out unusable
        registry.finish_upload(seeded.tx, "castle.jpg");
        registry.begin_upload(seeded.tx, "never.jpg");
        registry.fail_upload(seeded.tx, "never.jpg", "truncated");
        process(&state, &registry, update).await.unwrap();

        let records = seeded.store.snapshot().await.unwrap();
        assert!(matches!(
            records.question(seeded.with_media).unwrap().media,
            Some(MediaRef::Bound { .. })
        ));
        assert_eq!(records.question(seeded.broken).unwrap().media, None);
        assert!(records.pending_operations().is_empty());
    }
}
