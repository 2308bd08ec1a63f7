//! Shared fixtures for the unit tests.

use std::{
    sync::{Arc, Mutex},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use axum::extract::ws::Message;
use serde_json::Value;
use tokio::{sync::mpsc, time::Instant};

use crate::{
    clock::Clock,
    config::AppConfig,
    dao::match_store::memory::MemoryMatchStore,
    state::{AppState, SharedState},
};

/// Controllable clock anchored at a fixed wall-clock instant.
///
/// A frozen clock only moves through [`TestClock::advance`]; a tracking clock also follows
/// tokio's (possibly paused) timer so countdown tests can rely on auto-advance.
pub struct TestClock {
    anchor: SystemTime,
    tracking: Option<Instant>,
    offset: Mutex<Duration>,
}

impl TestClock {
    /// Frozen at 2023-11-14T22:13:20Z.
    pub fn new() -> Self {
        Self {
            anchor: UNIX_EPOCH + Duration::from_secs(1_700_000_000),
            tracking: None,
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Same anchor, but also moves with the tokio clock.
    pub fn tracking_tokio() -> Self {
        Self {
            tracking: Some(Instant::now()),
            ..Self::new()
        }
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap();
        *offset += by;
    }
}

impl Clock for TestClock {
    fn now(&self) -> SystemTime {
        let offset = *self.offset.lock().unwrap();
        let elapsed = self
            .tracking
            .map(|start| Instant::now().duration_since(start))
            .unwrap_or_default();
        self.anchor + offset + elapsed
    }
}

/// State wired to an in-memory store and the given clock.
pub async fn memory_state(clock: Arc<TestClock>) -> (SharedState, MemoryMatchStore) {
    memory_state_with(AppConfig::default(), clock).await
}

/// Like [`memory_state`], with an explicit configuration.
pub async fn memory_state_with(
    config: AppConfig,
    clock: Arc<TestClock>,
) -> (SharedState, MemoryMatchStore) {
    let store = MemoryMatchStore::new(clock.clone());
    let state = AppState::with_clock(config, clock);
    state.install_match_store(Arc::new(store.clone())).await;
    (state, store)
}

/// Fake socket: the sender half is registered in the registry, the receiver plays the client.
pub fn fake_channel() -> (mpsc::UnboundedSender<Message>, mpsc::UnboundedReceiver<Message>) {
    mpsc::unbounded_channel()
}

/// Drain every text frame currently buffered for a fake socket as JSON.
pub fn drain_json(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<Value> {
    let mut frames = Vec::new();
    while let Ok(message) = rx.try_recv() {
        if let Message::Text(text) = message {
            frames.push(serde_json::from_str(text.as_str()).unwrap());
        }
    }
    frames
}
