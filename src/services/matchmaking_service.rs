use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{
    clock::unix_millis,
    dao::{
        match_store::MatchStore,
        models::{GameMode, MatchEntity, MatchStatus, NewMatch, QueueEntryEntity},
    },
    dto::ws::ServerMessage,
    error::ServiceError,
    services::{
        broadcast::notify_player,
        content::pick_sample,
        lifecycle_service,
        scheduler::{TickOutcome, spawn_repeating},
    },
    state::{SharedState, lifecycle::LifecycleEvent},
};

/// Project name every participant starts with.
pub const DEFAULT_PROJECT_NAME: &str = "New Project";

/// Put `player_id` in the queue of (`category`, `mode`) and trigger a scan.
///
/// Joining again replaces the previous entry, whichever bucket it was in. Players with an
/// `active` match are refused until it ends.
pub async fn join_queue(
    state: &SharedState,
    player_id: String,
    category: String,
    mode: GameMode,
) -> Result<QueueEntryEntity, ServiceError> {
    ensure_category(state, &category)?;
    let store = state.require_match_store().await?;
    if let Some(current) = store.get_active_match_for_player(player_id.clone()).await? {
        return Err(ServiceError::InvalidState(format!(
            "player `{player_id}` is already playing match `{}`",
            current.id
        )));
    }
    let entry = store.enqueue(player_id, category, mode).await?;
    info!(
        player_id = %entry.player_id,
        category = %entry.category,
        mode = %entry.mode,
        "player joined matchmaking queue"
    );

    trigger_scan(state);
    Ok(entry)
}

/// Remove `player_id` from the queue. Returns whether an entry was removed.
pub async fn leave_queue(state: &SharedState, player_id: &str) -> Result<bool, ServiceError> {
    let store = state.require_match_store().await?;
    let removed = store.dequeue(player_id.to_owned()).await?;
    if let Some(entry) = &removed {
        info!(
            player_id = %entry.player_id,
            category = %entry.category,
            mode = %entry.mode,
            "player left matchmaking queue"
        );
    }
    Ok(removed.is_some())
}

/// Entries waiting in one bucket, oldest first.
pub async fn queue_status(
    state: &SharedState,
    category: &str,
    mode: GameMode,
) -> Result<Vec<QueueEntryEntity>, ServiceError> {
    ensure_category(state, category)?;
    let store = state.require_match_store().await?;
    Ok(store.queue_by_bucket(category.to_owned(), mode).await?)
}

fn ensure_category(state: &SharedState, category: &str) -> Result<(), ServiceError> {
    if state.config().has_category(category) {
        Ok(())
    } else {
        Err(ServiceError::InvalidInput(format!(
            "unknown category `{category}`"
        )))
    }
}

fn trigger_scan(state: &SharedState) {
    let state = state.clone();
    tokio::spawn(async move {
        if let Err(err) = run_scan(&state).await {
            warn!(error = %err, "matchmaking scan after join failed");
        }
    });
}

/// Start the periodic matchmaking scan.
pub fn spawn_matchmaker(state: &SharedState) -> JoinHandle<()> {
    let task_state = state.clone();
    spawn_repeating("matchmaker", state.config().scan_interval(), move || {
        let state = task_state.clone();
        async move {
            match run_scan(&state).await {
                Ok(0) => {}
                Ok(formed) => debug!(formed, "matchmaking pass formed matches"),
                Err(ServiceError::Degraded) => debug!("matchmaking skipped (degraded mode)"),
                Err(err) => warn!(error = %err, "matchmaking pass failed"),
            }
            TickOutcome::Continue
        }
    })
}

/// One pass over every (category, mode) bucket, forming at most one match per bucket.
///
/// Returns the number of matches formed. Passes never run concurrently.
pub async fn run_scan(state: &SharedState) -> Result<usize, ServiceError> {
    let _pass = state.scan_gate().await;
    let store = state.require_match_store().await?;
    let config = state.config();

    let mut formed = 0;
    for category in config.categories() {
        for mode in GameMode::ALL {
            let entries = match store.queue_by_bucket(category.name.clone(), mode).await {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(category = %category.name, %mode, error = %err, "failed to read queue bucket");
                    continue;
                }
            };
            if entries.len() < mode.required_players() {
                continue;
            }

            let selected = entries
                .into_iter()
                .take(mode.required_players())
                .collect::<Vec<_>>();
            if form_match(state, &store, &category.name, mode, selected)
                .await
                .is_some()
            {
                formed += 1;
            }
        }
    }
    Ok(formed)
}

/// Turn the selected queue entries into an active match and announce it.
async fn form_match(
    state: &SharedState,
    store: &Arc<dyn MatchStore>,
    category: &str,
    mode: GameMode,
    selected: Vec<QueueEntryEntity>,
) -> Option<MatchEntity> {
    let taken = take_players(store, category, mode, selected).await?;

    let created = build_match(state, store, category, mode, &taken).await;

    let active = match created {
        Ok(active) => active,
        Err(err) => {
            error!(category, %mode, error = %err, "match formation failed; players restored to queue");
            restore_players(store, taken).await;
            return None;
        }
    };

    let player_ids = taken
        .iter()
        .map(|entry| entry.player_id.as_str())
        .collect::<Vec<_>>();
    info!(match_id = %active.id, category, %mode, players = ?player_ids, "match formed");

    if let Err(err) = lifecycle_service::start_countdown(state, active.id).await {
        error!(match_id = %active.id, error = %err, "failed to start countdown");
    }

    let now = state.clock().now();
    let announcement = ServerMessage::MatchStarted {
        match_id: active.id,
        mode,
        remaining_seconds: lifecycle_service::remaining_for(state, &active, now),
        server_time: unix_millis(now),
    };
    for player_id in player_ids {
        let reached = notify_player(state.registry(), player_id, &announcement);
        if reached == 0 {
            debug!(match_id = %active.id, player_id, "matched player has no open channel");
        }
    }

    Some(active)
}

/// Atomically take every selected entry out of the queue, or none of them.
///
/// An entry that vanished (left, matched elsewhere) or moved to another bucket aborts the
/// formation; entries already taken are put back with their original `joined_at`. A player
/// found in an `active` match loses the stale entry and aborts the formation too.
async fn take_players(
    store: &Arc<dyn MatchStore>,
    category: &str,
    mode: GameMode,
    selected: Vec<QueueEntryEntity>,
) -> Option<Vec<QueueEntryEntity>> {
    let mut taken = Vec::with_capacity(selected.len());
    for candidate in selected {
        match store.dequeue(candidate.player_id.clone()).await {
            Ok(Some(entry)) if entry.category == category && entry.mode == mode => {
                match store.get_active_match_for_player(entry.player_id.clone()).await {
                    Ok(None) => taken.push(entry),
                    Ok(Some(current)) => {
                        warn!(
                            player_id = %entry.player_id,
                            match_id = %current.id,
                            "queued player is already in an active match; entry dropped"
                        );
                        restore_players(store, taken).await;
                        return None;
                    }
                    Err(err) => {
                        warn!(player_id = %entry.player_id, error = %err, "failed to check active match of player");
                        taken.push(entry);
                        restore_players(store, taken).await;
                        return None;
                    }
                }
            }
            Ok(Some(moved)) => {
                debug!(player_id = %moved.player_id, "player switched bucket during formation");
                taken.push(moved);
                restore_players(store, taken).await;
                return None;
            }
            Ok(None) => {
                debug!(player_id = %candidate.player_id, "player left queue during formation");
                restore_players(store, taken).await;
                return None;
            }
            Err(err) => {
                warn!(player_id = %candidate.player_id, error = %err, "failed to take player from queue");
                restore_players(store, taken).await;
                return None;
            }
        }
    }
    Some(taken)
}

async fn build_match(
    state: &SharedState,
    store: &Arc<dyn MatchStore>,
    category: &str,
    mode: GameMode,
    taken: &[QueueEntryEntity],
) -> Result<MatchEntity, ServiceError> {
    let sample = pick_sample(&state.config(), category)?;
    let created = store
        .create_match(NewMatch {
            category: category.to_owned(),
            mode,
            sample,
        })
        .await?;
    match activate(store, &created, taken).await {
        Ok(active) => Ok(active),
        Err(err) => {
            discard_match(store, created.id).await;
            Err(err)
        }
    }
}

async fn activate(
    store: &Arc<dyn MatchStore>,
    created: &MatchEntity,
    taken: &[QueueEntryEntity],
) -> Result<MatchEntity, ServiceError> {
    for entry in taken {
        store
            .add_participant(
                created.id,
                entry.player_id.clone(),
                DEFAULT_PROJECT_NAME.to_owned(),
            )
            .await?;
    }

    let status = created.status.next(LifecycleEvent::Activate, created.mode)?;
    store.set_match_status(created.id, status).await?;

    let active = store
        .get_match(created.id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("match `{}` vanished", created.id)))?;
    if active.status != MatchStatus::Active {
        return Err(ServiceError::InvalidState(format!(
            "match `{}` is `{}` after activation",
            active.id, active.status
        )));
    }
    Ok(active)
}

async fn discard_match(store: &Arc<dyn MatchStore>, match_id: uuid::Uuid) {
    if let Err(err) = store.delete_match(match_id).await {
        error!(%match_id, error = %err, "failed to discard partially formed match");
    }
}

async fn restore_players(store: &Arc<dyn MatchStore>, entries: Vec<QueueEntryEntity>) {
    for entry in entries {
        let player_id = entry.player_id.clone();
        match store.requeue(entry).await {
            Ok(true) => {}
            Ok(false) => debug!(%player_id, "player re-joined meanwhile; newer entry kept"),
            Err(err) => error!(%player_id, error = %err, "failed to restore player to queue"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::Value;
    use uuid::Uuid;

    use super::*;
    use crate::{
        dao::match_store::memory::MemoryMatchStore,
        test_support::{TestClock, drain_json, fake_channel, memory_state},
    };

    async fn setup() -> (SharedState, MemoryMatchStore, Arc<TestClock>) {
        let clock = Arc::new(TestClock::new());
        let (state, store) = memory_state(clock.clone()).await;
        (state, store, clock)
    }

    async fn enqueue(store: &MemoryMatchStore, clock: &TestClock, player: &str, mode: GameMode) {
        store
            .enqueue(player.into(), "soul".into(), mode)
            .await
            .unwrap();
        clock.advance(Duration::from_millis(10));
    }

    fn connect(state: &SharedState, player: &str) -> tokio::sync::mpsc::UnboundedReceiver<axum::extract::ws::Message> {
        let id = Uuid::new_v4();
        let (tx, rx) = fake_channel();
        state.registry().register_channel(id, tx);
        state.registry().bind_player(id, player);
        rx
    }

    #[tokio::test]
    async fn join_rejects_unknown_categories() {
        let (state, _store, _clock) = setup().await;
        let err = join_queue(&state, "p1".into(), "polka".into(), GameMode::Solo)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn join_surfaces_storage_failures() {
        let (state, store, _clock) = setup().await;
        store.fail_next("enqueue");
        let err = join_queue(&state, "p1".into(), "soul".into(), GameMode::Duel)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));
    }

    #[tokio::test]
    async fn four_group_players_form_one_match() {
        let (state, store, clock) = setup().await;
        let mut sockets = Vec::new();
        for player in ["a", "b", "c", "d", "e"] {
            enqueue(&store, &clock, player, GameMode::Group).await;
            sockets.push(connect(&state, player));
        }

        assert_eq!(run_scan(&state).await.unwrap(), 1);
        assert_eq!(run_scan(&state).await.unwrap(), 0);

        let left = store
            .queue_by_bucket("soul".into(), GameMode::Group)
            .await
            .unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].player_id, "e");

        let mut match_ids = Vec::new();
        for socket in sockets.iter_mut().take(4) {
            let frames = drain_json(socket);
            assert_eq!(frames.len(), 1);
            assert_eq!(frames[0]["type"], "match_started");
            assert_eq!(frames[0]["mode"], "battle");
            assert_eq!(frames[0]["remainingSeconds"], 600);
            match_ids.push(frames[0]["matchId"].clone());
        }
        assert!(match_ids.iter().all(|id| *id == match_ids[0]));
        assert!(drain_json(&mut sockets[4]).is_empty());

        let id: Uuid = serde_json::from_value::<Uuid>(match_ids[0].clone()).unwrap();
        let record = store.get_match(id).await.unwrap().unwrap();
        assert_eq!(record.status, MatchStatus::Active);
        assert!(record.start_time.is_some());
        let participants = store.participants(id).await.unwrap();
        assert_eq!(participants.len(), 4);
        assert!(participants.iter().all(|p| p.project_name == DEFAULT_PROJECT_NAME));
        assert!(state.countdowns().is_running(id));
        state.shutdown();
    }

    #[tokio::test]
    async fn players_in_an_active_match_cannot_queue_again() {
        let (state, store, _clock) = setup().await;
        store
            .enqueue("a".into(), "soul".into(), GameMode::Solo)
            .await
            .unwrap();
        assert_eq!(run_scan(&state).await.unwrap(), 1);

        let err = join_queue(&state, "a".into(), "funk".into(), GameMode::Solo)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        assert_eq!(run_scan(&state).await.unwrap(), 0);

        let playing = store.get_active_matches().await.unwrap();
        assert_eq!(playing.len(), 1);
        state.shutdown();
    }

    #[tokio::test]
    async fn stale_entry_of_a_playing_player_is_dropped() {
        let (state, store, clock) = setup().await;
        store
            .enqueue("a".into(), "soul".into(), GameMode::Solo)
            .await
            .unwrap();
        assert_eq!(run_scan(&state).await.unwrap(), 1);
        // Entry written behind the join check, e.g. by a racing request.
        store
            .enqueue("a".into(), "funk".into(), GameMode::Duel)
            .await
            .unwrap();
        clock.advance(Duration::from_millis(10));
        store
            .enqueue("b".into(), "funk".into(), GameMode::Duel)
            .await
            .unwrap();

        assert_eq!(run_scan(&state).await.unwrap(), 0);
        let queued = store
            .queue_by_bucket("funk".into(), GameMode::Duel)
            .await
            .unwrap();
        assert_eq!(queued.iter().map(|e| e.player_id.as_str()).collect::<Vec<_>>(), ["b"]);

        let active = store.get_active_matches().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].category, "soul");
        state.shutdown();
    }

    #[tokio::test]
    async fn oldest_players_are_matched_first() {
        let (state, store, clock) = setup().await;
        for player in ["first", "second", "third"] {
            enqueue(&store, &clock, player, GameMode::Duel).await;
        }

        assert_eq!(run_scan(&state).await.unwrap(), 1);
        let left = store
            .queue_by_bucket("soul".into(), GameMode::Duel)
            .await
            .unwrap();
        assert_eq!(left.iter().map(|e| e.player_id.as_str()).collect::<Vec<_>>(), ["third"]);
        state.shutdown();
    }

    #[tokio::test]
    async fn each_bucket_forms_independently() {
        let (state, store, clock) = setup().await;
        enqueue(&store, &clock, "solo", GameMode::Solo).await;
        enqueue(&store, &clock, "d1", GameMode::Duel).await;
        enqueue(&store, &clock, "g1", GameMode::Group).await;

        assert_eq!(run_scan(&state).await.unwrap(), 1);
        let active = store.get_active_matches().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].mode, GameMode::Solo);
        state.shutdown();
    }

    #[tokio::test]
    async fn participant_failure_is_compensated() {
        let (state, store, clock) = setup().await;
        let mut socket = None;
        for player in ["a", "b"] {
            enqueue(&store, &clock, player, GameMode::Duel).await;
            socket = Some(connect(&state, player));
        }
        store.fail_next("add_participant");

        assert_eq!(run_scan(&state).await.unwrap(), 0);
        let queued = store
            .queue_by_bucket("soul".into(), GameMode::Duel)
            .await
            .unwrap();
        assert_eq!(queued.len(), 2);
        assert_eq!(queued[0].player_id, "a");
        assert!(store.get_active_matches().await.unwrap().is_empty());
        let frames: Vec<Value> = drain_json(socket.as_mut().unwrap());
        assert!(frames.is_empty());

        // The next pass succeeds with the restored entries.
        assert_eq!(run_scan(&state).await.unwrap(), 1);
        state.shutdown();
    }

    #[tokio::test]
    async fn activation_failure_discards_the_match() {
        let (state, store, clock) = setup().await;
        enqueue(&store, &clock, "solo", GameMode::Solo).await;
        store.fail_next("set_match_status");

        assert_eq!(run_scan(&state).await.unwrap(), 0);
        assert_eq!(
            store
                .queue_by_bucket("soul".into(), GameMode::Solo)
                .await
                .unwrap()
                .len(),
            1
        );
        assert!(store.get_active_matches().await.unwrap().is_empty());
        assert!(state.countdowns().is_empty());
    }

    #[tokio::test]
    async fn vanished_player_aborts_without_losing_the_others() {
        let (state, store, clock) = setup().await;
        enqueue(&store, &clock, "a", GameMode::Duel).await;
        enqueue(&store, &clock, "b", GameMode::Duel).await;
        let selected = store
            .queue_by_bucket("soul".into(), GameMode::Duel)
            .await
            .unwrap();
        leave_queue(&state, "b").await.unwrap();

        let store_dyn: Arc<dyn MatchStore> = Arc::new(store.clone());
        let formed = form_match(&state, &store_dyn, "soul", GameMode::Duel, selected).await;
        assert!(formed.is_none());
        let queued = store
            .queue_by_bucket("soul".into(), GameMode::Duel)
            .await
            .unwrap();
        assert_eq!(queued.iter().map(|e| e.player_id.as_str()).collect::<Vec<_>>(), ["a"]);
    }

    #[tokio::test]
    async fn player_who_switched_bucket_keeps_the_new_entry() {
        let (state, store, clock) = setup().await;
        enqueue(&store, &clock, "a", GameMode::Duel).await;
        enqueue(&store, &clock, "b", GameMode::Duel).await;
        let selected = store
            .queue_by_bucket("soul".into(), GameMode::Duel)
            .await
            .unwrap();
        store
            .enqueue("b".into(), "jazz".into(), GameMode::Solo)
            .await
            .unwrap();

        let store_dyn: Arc<dyn MatchStore> = Arc::new(store.clone());
        assert!(
            form_match(&state, &store_dyn, "soul", GameMode::Duel, selected)
                .await
                .is_none()
        );
        let jazz = store
            .queue_by_bucket("jazz".into(), GameMode::Solo)
            .await
            .unwrap();
        assert_eq!(jazz.len(), 1);
        assert_eq!(
            store
                .queue_by_bucket("soul".into(), GameMode::Duel)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn leaving_is_idempotent() {
        let (state, store, clock) = setup().await;
        enqueue(&store, &clock, "a", GameMode::Duel).await;
        assert!(leave_queue(&state, "a").await.unwrap());
        assert!(!leave_queue(&state, "a").await.unwrap());
    }

    #[tokio::test]
    async fn degraded_state_refuses_to_scan() {
        let (state, _store, _clock) = setup().await;
        state.clear_match_store().await;
        assert!(matches!(run_scan(&state).await, Err(ServiceError::Degraded)));
    }
}
