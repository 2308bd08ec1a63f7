/// Process-local store.
pub mod memory;
/// MongoDB-backed store.
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{
    GameMode, MatchEntity, MatchStatus, NewMatch, ParticipantEntity, QueueEntryEntity,
};
use crate::dao::storage::StorageResult;

/// Abstraction over the durable store for queue entries, matches and participants.
///
/// Every queue removal is conditional: [`MatchStore::dequeue`] hands the entry to exactly one
/// caller, which is what keeps concurrent scans and leave requests from double-matching a player.
pub trait MatchStore: Send + Sync {
    /// Insert or replace the queue entry of `player_id`, resetting `joined_at`.
    fn enqueue(
        &self,
        player_id: String,
        category: String,
        mode: GameMode,
    ) -> BoxFuture<'static, StorageResult<QueueEntryEntity>>;
    /// Remove the queue entry of `player_id`, returning it if this call removed it.
    fn dequeue(&self, player_id: String)
    -> BoxFuture<'static, StorageResult<Option<QueueEntryEntity>>>;
    /// Put a previously taken entry back unless the player already has a newer one.
    ///
    /// Returns `true` when the entry was restored.
    fn requeue(&self, entry: QueueEntryEntity) -> BoxFuture<'static, StorageResult<bool>>;
    /// Entries of one bucket ordered by `joined_at` ascending.
    fn queue_by_bucket(
        &self,
        category: String,
        mode: GameMode,
    ) -> BoxFuture<'static, StorageResult<Vec<QueueEntryEntity>>>;
    /// Create a match record in `waiting` status.
    fn create_match(&self, new_match: NewMatch) -> BoxFuture<'static, StorageResult<MatchEntity>>;
    /// Remove a match and its participants.
    fn delete_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>>;
    /// Attach a player to a match; rejected once the mode's player count is reached.
    fn add_participant(
        &self,
        match_id: Uuid,
        player_id: String,
        project_name: String,
    ) -> BoxFuture<'static, StorageResult<ParticipantEntity>>;
    /// Participants of a match.
    fn participants(&self, match_id: Uuid)
    -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>>;
    /// Unconditionally set the status, stamping `start_time`/`end_time` as needed.
    fn set_match_status(&self, id: Uuid, status: MatchStatus)
    -> BoxFuture<'static, StorageResult<()>>;
    /// Set the status only if the current one is listed in `from`.
    ///
    /// Returns `true` when this call performed the change.
    fn transition_match_status(
        &self,
        id: Uuid,
        from: Vec<MatchStatus>,
        to: MatchStatus,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Fetch a match by id.
    fn get_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>>;
    /// Matches that are `active` or `voting`.
    fn get_active_matches(&self) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>>;
    /// The `active` match `player_id` participates in, if any.
    fn get_active_match_for_player(
        &self,
        player_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>>;
    /// Cheap liveness probe.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
