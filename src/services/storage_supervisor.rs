use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{match_store::MatchStore, storage::StorageError},
    services::lifecycle_service,
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_FAILED_CHECKS: u32 = 3;

/// Connect to the storage backend and keep the shared state in degraded mode while it is unavailable.
///
/// Once a store is installed the countdowns of persisted active matches are resumed. After
/// [`MAX_FAILED_CHECKS`] consecutive failed health checks the store is dropped and a fresh
/// connection is attempted.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn MatchStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.install_match_store(store.clone()).await;
                info!("storage connection established; leaving degraded mode");
                delay = INITIAL_DELAY;

                if let Err(err) = lifecycle_service::resume_countdowns(&state).await {
                    warn!(error = %err, "failed to resume countdowns of active matches");
                }

                watch_health(&state, store.as_ref()).await;
                state.clear_match_store().await;
                warn!("exhausted storage health checks; reconnecting in degraded mode");

                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// Poll `store` until it fails [`MAX_FAILED_CHECKS`] times in a row.
async fn watch_health(state: &SharedState, store: &dyn MatchStore) {
    let mut failures = 0;
    let mut retry_delay = INITIAL_DELAY;

    while failures < MAX_FAILED_CHECKS {
        match store.health_check().await {
            Ok(()) => {
                if state.is_degraded() {
                    info!("storage healthy again; leaving degraded mode");
                    state.update_degraded(false);
                }
                failures = 0;
                retry_delay = INITIAL_DELAY;
                sleep(HEALTH_POLL_INTERVAL).await;
            }
            Err(err) => {
                if failures == 0 {
                    warn!(error = %err, "storage health check failed; entering degraded mode");
                    state.update_degraded(true);
                } else {
                    warn!(attempt = failures, error = %err, "storage health check failed again");
                }
                failures += 1;
                sleep(retry_delay).await;
                retry_delay = (retry_delay * 2).min(MAX_DELAY);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            match_store::memory::MemoryMatchStore,
            models::{GameMode, MatchStatus, NewMatch, SampleRef},
        },
        state::AppState,
        test_support::TestClock,
    };

    #[tokio::test(start_paused = true)]
    async fn retries_until_connected_then_resumes_countdowns() {
        let clock = Arc::new(TestClock::new());
        let state = AppState::with_clock(AppConfig::default(), clock.clone());
        let store = MemoryMatchStore::new(clock);
        let created = store
            .create_match(NewMatch {
                category: "funk".into(),
                mode: GameMode::Solo,
                sample: SampleRef {
                    name: "Today Dream".into(),
                    url: "/samples/soul/holiday_mood_orchestra_today_dream.mp3".into(),
                },
            })
            .await
            .unwrap();
        store
            .set_match_status(created.id, MatchStatus::Active)
            .await
            .unwrap();

        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let supervisor = tokio::spawn(run(state.clone(), move || {
            let store = store.clone();
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err(StorageError::Rejected("not yet".into()))
                } else {
                    Ok(Arc::new(store) as Arc<dyn MatchStore>)
                }
            }
        }));

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert!(!state.is_degraded());
        assert!(state.countdowns().is_running(created.id));

        supervisor.abort();
        state.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn failing_health_checks_enter_degraded_mode() {
        let clock = Arc::new(TestClock::new());
        let state = AppState::with_clock(AppConfig::default(), clock.clone());
        let store = MemoryMatchStore::new(clock);
        state.install_match_store(Arc::new(store.clone())).await;

        store.fail_next("health_check");
        let watcher = {
            let state = state.clone();
            let store = store.clone();
            tokio::spawn(async move { watch_health(&state, &store).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(state.is_degraded());
        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert!(!state.is_degraded());
        watcher.abort();
    }
}
