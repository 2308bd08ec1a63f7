/// Running countdown tasks and emission gates.
pub mod countdown;
/// Match status transitions and timer arithmetic.
pub mod lifecycle;
/// Live channels, players and rooms.
pub mod registry;

use std::sync::{Arc, Mutex as StdMutex};

use tokio::{
    sync::{Mutex, MutexGuard, RwLock, watch},
    task::JoinHandle,
};

use crate::{
    clock::{Clock, SystemClock},
    config::AppConfig,
    dao::match_store::MatchStore,
    error::ServiceError,
};

pub use self::countdown::CountdownRegistry;
pub use self::registry::{ChannelId, ConnectionRegistry};

/// Shared handle passed to every route and service.
pub type SharedState = Arc<AppState>;

/// Central application state: the store slot, the live connections, the running countdowns
/// and the configuration every service reads from.
pub struct AppState {
    match_store: RwLock<Option<Arc<dyn MatchStore>>>,
    registry: ConnectionRegistry,
    countdowns: CountdownRegistry,
    degraded: watch::Sender<bool>,
    scan_gate: Mutex<()>,
    config: Arc<AppConfig>,
    clock: Arc<dyn Clock>,
    background: StdMutex<Vec<JoinHandle<()>>>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Same as [`AppState::new`] with an explicit time source.
    pub fn with_clock(config: AppConfig, clock: Arc<dyn Clock>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            match_store: RwLock::new(None),
            registry: ConnectionRegistry::new(),
            countdowns: CountdownRegistry::new(),
            degraded: degraded_tx,
            scan_gate: Mutex::new(()),
            config: Arc::new(config),
            clock,
            background: StdMutex::new(Vec::new()),
        })
    }

    /// Obtain a handle to the current match store, if one is installed.
    pub async fn match_store(&self) -> Option<Arc<dyn MatchStore>> {
        let guard = self.match_store.read().await;
        guard.as_ref().cloned()
    }

    /// Current match store or [`ServiceError::Degraded`].
    pub async fn require_match_store(&self) -> Result<Arc<dyn MatchStore>, ServiceError> {
        self.match_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new match store implementation and leave degraded mode.
    pub async fn install_match_store(&self, store: Arc<dyn MatchStore>) {
        {
            let mut guard = self.match_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current match store and enter degraded mode.
    pub async fn clear_match_store(&self) {
        {
            let mut guard = self.match_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Live WebSocket channels, players and rooms.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Running countdown tasks.
    pub fn countdowns(&self) -> &CountdownRegistry {
        &self.countdowns
    }

    /// Loaded configuration.
    pub fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    /// Time source shared with the store.
    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// Serialize matchmaking passes; held for the duration of one scan.
    pub async fn scan_gate(&self) -> MutexGuard<'_, ()> {
        self.scan_gate.lock().await
    }

    /// Keep a process-wide background task so [`AppState::shutdown`] can stop it.
    pub fn track_background(&self, handle: JoinHandle<()>) {
        self.background
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(handle);
    }

    /// Abort the background tasks and every running countdown.
    pub fn shutdown(&self) {
        let handles = std::mem::take(
            &mut *self
                .background
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        for handle in handles {
            handle.abort();
        }
        self.countdowns.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dao::match_store::memory::MemoryMatchStore, test_support::TestClock};

    #[tokio::test]
    async fn starts_degraded_until_a_store_is_installed() {
        let clock = Arc::new(TestClock::new());
        let state = AppState::with_clock(AppConfig::default(), clock.clone());
        let mut watcher = state.degraded_watcher();
        assert!(state.is_degraded());
        assert!(matches!(
            state.require_match_store().await,
            Err(ServiceError::Degraded)
        ));

        state
            .install_match_store(Arc::new(MemoryMatchStore::new(clock)))
            .await;
        assert!(!state.is_degraded());
        assert!(watcher.has_changed().unwrap());
        assert!(!*watcher.borrow_and_update());
        assert!(state.require_match_store().await.is_ok());

        state.clear_match_store().await;
        assert!(state.is_degraded());
        assert!(state.match_store().await.is_none());
    }

    #[tokio::test]
    async fn unchanged_degraded_flag_is_not_rebroadcast() {
        let state = AppState::with_clock(AppConfig::default(), Arc::new(TestClock::new()));
        let watcher = state.degraded_watcher();
        state.update_degraded(true);
        assert!(!watcher.has_changed().unwrap());
    }
}
