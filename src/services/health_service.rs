use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report storage connectivity. The server keeps answering while storage is down.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.store().health_check().await {
        Ok(()) => HealthResponse::ok(),
        Err(err) => {
            warn!(error = %err, "storage health check failed");
            HealthResponse::degraded()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{dao::quiz_store::MemoryQuizStore, state::tests::test_state};

    #[tokio::test]
    async fn memory_store_is_healthy() {
        let (state, _rx) = test_state(Arc::new(MemoryQuizStore::new())).await;
        assert_eq!(health_status(&state).await.status, "ok");
    }
}
