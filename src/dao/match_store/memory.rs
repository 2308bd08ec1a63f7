//! Process-local [`MatchStore`] used when no database is configured and by the test suites.

use std::{
    collections::{HashMap, HashSet},
    io,
    sync::{Arc, Mutex, MutexGuard},
};

use futures::{FutureExt, future::BoxFuture};
use uuid::Uuid;

use crate::{
    clock::Clock,
    dao::{
        match_store::MatchStore,
        models::{GameMode, MatchEntity, MatchStatus, NewMatch, ParticipantEntity, QueueEntryEntity},
        storage::{StorageError, StorageResult},
    },
};

/// In-memory store; a single mutex makes every operation atomic.
#[derive(Clone)]
pub struct MemoryMatchStore {
    inner: Arc<Mutex<MemoryState>>,
    clock: Arc<dyn Clock>,
}

#[derive(Default)]
struct MemoryState {
    queue: HashMap<String, QueueEntryEntity>,
    matches: HashMap<Uuid, MatchEntity>,
    participants: Vec<ParticipantEntity>,
    failing: HashSet<&'static str>,
}

impl MemoryMatchStore {
    /// Create an empty store stamping timestamps with `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryState::default())),
            clock,
        }
    }

    /// Make the next call to `operation` (trait method name) fail as unavailable.
    ///
    /// Lets callers exercise the partial-failure paths without a real backend.
    pub fn fail_next(&self, operation: &'static str) {
        self.lock().failing.insert(operation);
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn run<T, F>(&self, operation: &'static str, work: F) -> BoxFuture<'static, StorageResult<T>>
    where
        T: Send + 'static,
        F: FnOnce(&mut MemoryState) -> StorageResult<T>,
    {
        let result = {
            let mut state = self.lock();
            if state.failing.remove(operation) {
                Err(StorageError::unavailable(
                    format!("{operation} failed"),
                    io::Error::other("injected failure"),
                ))
            } else {
                work(&mut state)
            }
        };
        futures::future::ready(result).boxed()
    }
}

impl MatchStore for MemoryMatchStore {
    fn enqueue(
        &self,
        player_id: String,
        category: String,
        mode: GameMode,
    ) -> BoxFuture<'static, StorageResult<QueueEntryEntity>> {
        let joined_at = self.clock.now();
        self.run("enqueue", move |state| {
            let entry = QueueEntryEntity {
                player_id: player_id.clone(),
                category,
                mode,
                joined_at,
            };
            state.queue.insert(player_id, entry.clone());
            Ok(entry)
        })
    }

    fn dequeue(
        &self,
        player_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<QueueEntryEntity>>> {
        self.run("dequeue", move |state| Ok(state.queue.remove(&player_id)))
    }

    fn requeue(&self, entry: QueueEntryEntity) -> BoxFuture<'static, StorageResult<bool>> {
        self.run("requeue", move |state| {
            if state.queue.contains_key(&entry.player_id) {
                return Ok(false);
            }
            state.queue.insert(entry.player_id.clone(), entry);
            Ok(true)
        })
    }

    fn queue_by_bucket(
        &self,
        category: String,
        mode: GameMode,
    ) -> BoxFuture<'static, StorageResult<Vec<QueueEntryEntity>>> {
        self.run("queue_by_bucket", move |state| {
            let mut entries = state
                .queue
                .values()
                .filter(|entry| entry.category == category && entry.mode == mode)
                .cloned()
                .collect::<Vec<_>>();
            entries.sort_by(|a, b| {
                a.joined_at
                    .cmp(&b.joined_at)
                    .then_with(|| a.player_id.cmp(&b.player_id))
            });
            Ok(entries)
        })
    }

    fn create_match(&self, new_match: NewMatch) -> BoxFuture<'static, StorageResult<MatchEntity>> {
        let now = self.clock.now();
        self.run("create_match", move |state| {
            let entity = MatchEntity::new(new_match, now);
            state.matches.insert(entity.id, entity.clone());
            Ok(entity)
        })
    }

    fn delete_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        self.run("delete_match", move |state| {
            state.matches.remove(&id);
            state
                .participants
                .retain(|participant| participant.match_id != id);
            Ok(())
        })
    }

    fn add_participant(
        &self,
        match_id: Uuid,
        player_id: String,
        project_name: String,
    ) -> BoxFuture<'static, StorageResult<ParticipantEntity>> {
        self.run("add_participant", move |state| {
            let mode = state
                .matches
                .get(&match_id)
                .map(|entity| entity.mode)
                .ok_or_else(|| StorageError::Rejected(format!("match `{match_id}` not found")))?;

            let members = state
                .participants
                .iter()
                .filter(|participant| participant.match_id == match_id)
                .collect::<Vec<_>>();
            if members.len() >= mode.required_players() {
                return Err(StorageError::Rejected(format!(
                    "match `{match_id}` already has {} participants",
                    members.len()
                )));
            }
            if members
                .iter()
                .any(|participant| participant.player_id == player_id)
            {
                return Err(StorageError::Rejected(format!(
                    "player `{player_id}` already participates in match `{match_id}`"
                )));
            }

            let participant = ParticipantEntity {
                id: Uuid::new_v4(),
                match_id,
                player_id,
                project_name,
            };
            state.participants.push(participant.clone());
            Ok(participant)
        })
    }

    fn participants(
        &self,
        match_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>> {
        self.run("participants", move |state| {
            Ok(state
                .participants
                .iter()
                .filter(|participant| participant.match_id == match_id)
                .cloned()
                .collect())
        })
    }

    fn set_match_status(
        &self,
        id: Uuid,
        status: MatchStatus,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let now = self.clock.now();
        self.run("set_match_status", move |state| {
            let entity = state
                .matches
                .get_mut(&id)
                .ok_or_else(|| StorageError::Rejected(format!("match `{id}` not found")))?;
            entity.apply_status(status, now);
            Ok(())
        })
    }

    fn transition_match_status(
        &self,
        id: Uuid,
        from: Vec<MatchStatus>,
        to: MatchStatus,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let now = self.clock.now();
        self.run("transition_match_status", move |state| {
            match state.matches.get_mut(&id) {
                Some(entity) if from.contains(&entity.status) => {
                    entity.apply_status(to, now);
                    Ok(true)
                }
                _ => Ok(false),
            }
        })
    }

    fn get_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        self.run("get_match", move |state| Ok(state.matches.get(&id).cloned()))
    }

    fn get_active_matches(&self) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
        self.run("get_active_matches", |state| {
            let mut matches = state
                .matches
                .values()
                .filter(|entity| matches!(entity.status, MatchStatus::Active | MatchStatus::Voting))
                .cloned()
                .collect::<Vec<_>>();
            matches.sort_by_key(|entity| entity.created_at);
            Ok(matches)
        })
    }

    fn get_active_match_for_player(
        &self,
        player_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        self.run("get_active_match_for_player", move |state| {
            Ok(state
                .participants
                .iter()
                .filter(|participant| participant.player_id == player_id)
                .filter_map(|participant| state.matches.get(&participant.match_id))
                .find(|entity| entity.status == MatchStatus::Active)
                .cloned())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.run("health_check", |_| Ok(()))
    }
}
