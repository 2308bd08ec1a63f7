#![allow(dead_code)]

use std::{
    sync::{Arc, Mutex},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use axum::extract::ws::Message;
use flip_battle_back::{
    clock::Clock,
    config::AppConfig,
    dao::match_store::memory::MemoryMatchStore,
    services::ws_dispatch::ChannelContext,
    state::{AppState, SharedState},
};
use serde_json::Value;
use tokio::{sync::mpsc, time::Instant};
use uuid::Uuid;

/// Wall clock that follows tokio's paused timer, plus manual offsets.
pub struct PausedClock {
    anchor: SystemTime,
    started: Instant,
    offset: Mutex<Duration>,
}

impl PausedClock {
    pub fn new() -> Self {
        Self {
            anchor: UNIX_EPOCH + Duration::from_secs(1_750_000_000),
            started: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock().unwrap() += by;
    }
}

impl Clock for PausedClock {
    fn now(&self) -> SystemTime {
        let offset = *self.offset.lock().unwrap();
        self.anchor + offset + Instant::now().duration_since(self.started)
    }
}

pub async fn setup() -> (SharedState, MemoryMatchStore, Arc<PausedClock>) {
    let clock = Arc::new(PausedClock::new());
    let store = MemoryMatchStore::new(clock.clone());
    let state = AppState::with_clock(AppConfig::default(), clock.clone());
    state.install_match_store(Arc::new(store.clone())).await;
    (state, store, clock)
}

/// A connected player: the registered channel and the frames the server wrote to it.
pub struct Client {
    pub ctx: ChannelContext,
    pub rx: mpsc::UnboundedReceiver<Message>,
}

impl Client {
    pub fn connect(state: &SharedState) -> Self {
        let channel_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        state.registry().register_channel(channel_id, tx);
        Self {
            ctx: ChannelContext { channel_id },
            rx,
        }
    }

    pub fn frames(&mut self) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            if let Message::Text(text) = message {
                frames.push(serde_json::from_str(text.as_str()).unwrap());
            }
        }
        frames
    }
}
