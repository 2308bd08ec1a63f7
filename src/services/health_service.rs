use tracing::warn;

use crate::{
    dto::health::{HealthResponse, HealthStatus},
    state::SharedState,
};

/// Report `ok` or `degraded`, pinging the store and logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let status = match state.match_store().await {
        Some(store) => match store.health_check().await {
            Ok(()) if !state.is_degraded() => HealthStatus::Ok,
            Ok(()) => HealthStatus::Degraded,
            Err(err) => {
                warn!(error = %err, "storage health check failed");
                HealthStatus::Degraded
            }
        },
        None => {
            warn!("storage unavailable (degraded mode)");
            HealthStatus::Degraded
        }
    };

    HealthResponse {
        status,
        channels: state.registry().channel_count(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::test_support::{TestClock, memory_state};

    #[tokio::test]
    async fn reports_degraded_without_a_healthy_store() {
        let (state, store) = memory_state(Arc::new(TestClock::new())).await;
        assert_eq!(health_status(&state).await.status, HealthStatus::Ok);

        store.fail_next("health_check");
        assert_eq!(health_status(&state).await.status, HealthStatus::Degraded);

        state.update_degraded(true);
        assert_eq!(health_status(&state).await.status, HealthStatus::Degraded);
        state.update_degraded(false);

        state.clear_match_store().await;
        assert_eq!(health_status(&state).await.status, HealthStatus::Degraded);
    }
}
