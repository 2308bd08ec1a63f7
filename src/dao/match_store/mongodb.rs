//! MongoDB-backed [`MatchStore`].
//!
//! Queue documents are keyed by player id, which gives upsert-on-join and makes
//! `find_one_and_delete` the single point where a queued player can be taken.

use std::sync::Arc;

use futures::{FutureExt, TryStreamExt, future::BoxFuture};
use mongodb::{
    Collection,
    bson::{DateTime, Document, doc},
    error::Error as MongoError,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    clock::Clock,
    dao::{
        match_store::MatchStore,
        models::{
            GameMode, MatchEntity, MatchStatus, NewMatch, ParticipantEntity, QueueEntryEntity,
            SampleRef,
        },
        mongodb::{
            MATCH_COLLECTION, MongoManager, PARTICIPANT_COLLECTION, QUEUE_COLLECTION, connect,
            ensure_indexes,
        },
        storage::{StorageError, StorageResult},
    },
};

#[derive(Debug, Serialize, Deserialize)]
struct QueueDocument {
    #[serde(rename = "_id")]
    player_id: String,
    category: String,
    mode: GameMode,
    joined_at: DateTime,
}

#[derive(Debug, Serialize, Deserialize)]
struct MatchDocument {
    #[serde(rename = "_id")]
    id: String,
    status: MatchStatus,
    category: String,
    mode: GameMode,
    sample: SampleRef,
    start_time: Option<DateTime>,
    end_time: Option<DateTime>,
    created_at: DateTime,
}

#[derive(Debug, Serialize, Deserialize)]
struct ParticipantDocument {
    #[serde(rename = "_id")]
    id: String,
    match_id: String,
    player_id: String,
    project_name: String,
}

impl From<QueueDocument> for QueueEntryEntity {
    fn from(value: QueueDocument) -> Self {
        Self {
            player_id: value.player_id,
            category: value.category,
            mode: value.mode,
            joined_at: value.joined_at.to_system_time(),
        }
    }
}

impl From<&QueueEntryEntity> for QueueDocument {
    fn from(value: &QueueEntryEntity) -> Self {
        Self {
            player_id: value.player_id.clone(),
            category: value.category.clone(),
            mode: value.mode,
            joined_at: DateTime::from_system_time(value.joined_at),
        }
    }
}

impl From<&MatchEntity> for MatchDocument {
    fn from(value: &MatchEntity) -> Self {
        Self {
            id: value.id.to_string(),
            status: value.status,
            category: value.category.clone(),
            mode: value.mode,
            sample: value.sample.clone(),
            start_time: value.start_time.map(DateTime::from_system_time),
            end_time: value.end_time.map(DateTime::from_system_time),
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MatchDocument> for MatchEntity {
    type Error = StorageError;

    fn try_from(value: MatchDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_id(&value.id)?,
            status: value.status,
            category: value.category,
            mode: value.mode,
            sample: value.sample,
            start_time: value.start_time.map(DateTime::to_system_time),
            end_time: value.end_time.map(DateTime::to_system_time),
            created_at: value.created_at.to_system_time(),
        })
    }
}

impl TryFrom<ParticipantDocument> for ParticipantEntity {
    type Error = StorageError;

    fn try_from(value: ParticipantDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_id(&value.id)?,
            match_id: parse_id(&value.match_id)?,
            player_id: value.player_id,
            project_name: value.project_name,
        })
    }
}

fn parse_id(raw: &str) -> StorageResult<Uuid> {
    Uuid::parse_str(raw).map_err(|err| StorageError::Corrupted(format!("invalid id `{raw}`: {err}")))
}

fn unavailable(operation: &str, source: MongoError) -> StorageError {
    StorageError::unavailable(format!("MongoDB {operation} failed"), source)
}

/// Build the `$set` update for a status change, stamping the timestamps tied to it.
fn status_update(status: MatchStatus, now: DateTime) -> Document {
    let mut set = doc! {"status": status.as_str()};
    match status {
        MatchStatus::Active => {
            set.insert("start_time", now);
        }
        MatchStatus::Completed => {
            set.insert("end_time", now);
        }
        _ => {}
    }
    doc! {"$set": set}
}

/// Connect to MongoDB, prepare the indexes and wrap the connection as a [`MatchStore`].
pub async fn connect_store(
    uri: &str,
    db_name: Option<&str>,
    clock: Arc<dyn Clock>,
) -> StorageResult<Arc<dyn MatchStore>> {
    let manager = connect(uri, db_name)
        .await
        .map_err(|err| StorageError::unavailable(err.to_string(), err))?;
    ensure_indexes(manager.database())
        .await
        .map_err(|err| StorageError::unavailable(err.to_string(), err))?;
    Ok(Arc::new(MongoMatchStore::new(manager, clock)))
}

/// [`MatchStore`] implementation persisting into three MongoDB collections.
#[derive(Clone)]
pub struct MongoMatchStore {
    mongo: MongoManager,
    clock: Arc<dyn Clock>,
}

impl MongoMatchStore {
    /// Wrap an established connection.
    pub fn new(mongo: MongoManager, clock: Arc<dyn Clock>) -> Self {
        Self { mongo, clock }
    }

    fn now(&self) -> DateTime {
        DateTime::from_system_time(self.clock.now())
    }

    fn queue(&self) -> Collection<QueueDocument> {
        self.mongo.database().collection(QUEUE_COLLECTION)
    }

    fn matches(&self) -> Collection<MatchDocument> {
        self.mongo.database().collection(MATCH_COLLECTION)
    }

    fn participant_collection(&self) -> Collection<ParticipantDocument> {
        self.mongo.database().collection(PARTICIPANT_COLLECTION)
    }
}

impl MatchStore for MongoMatchStore {
    fn enqueue(
        &self,
        player_id: String,
        category: String,
        mode: GameMode,
    ) -> BoxFuture<'static, StorageResult<QueueEntryEntity>> {
        let store = self.clone();
        async move {
            let joined_at = store.now();
            store
                .queue()
                .update_one(
                    doc! {"_id": player_id.as_str()},
                    doc! {"$set": {
                        "category": category.as_str(),
                        "mode": mode.as_str(),
                        "joined_at": joined_at,
                    }},
                )
                .upsert(true)
                .await
                .map_err(|source| unavailable("enqueue", source))?;

            Ok(QueueEntryEntity {
                player_id,
                category,
                mode,
                joined_at: joined_at.to_system_time(),
            })
        }
        .boxed()
    }

    fn dequeue(
        &self,
        player_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<QueueEntryEntity>>> {
        let store = self.clone();
        async move {
            let removed = store
                .queue()
                .find_one_and_delete(doc! {"_id": player_id.as_str()})
                .await
                .map_err(|source| unavailable("dequeue", source))?;
            Ok(removed.map(Into::into))
        }
        .boxed()
    }

    fn requeue(&self, entry: QueueEntryEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        async move {
            let document = QueueDocument::from(&entry);
            let result = store
                .queue()
                .update_one(
                    doc! {"_id": document.player_id.as_str()},
                    doc! {"$setOnInsert": {
                        "category": document.category.as_str(),
                        "mode": document.mode.as_str(),
                        "joined_at": document.joined_at,
                    }},
                )
                .upsert(true)
                .await
                .map_err(|source| unavailable("requeue", source))?;
            Ok(result.upserted_id.is_some())
        }
        .boxed()
    }

    fn queue_by_bucket(
        &self,
        category: String,
        mode: GameMode,
    ) -> BoxFuture<'static, StorageResult<Vec<QueueEntryEntity>>> {
        let store = self.clone();
        async move {
            let cursor = store
                .queue()
                .find(doc! {"category": category.as_str(), "mode": mode.as_str()})
                .sort(doc! {"joined_at": 1, "_id": 1})
                .await
                .map_err(|source| unavailable("queue lookup", source))?;
            let documents: Vec<QueueDocument> = cursor
                .try_collect()
                .await
                .map_err(|source| unavailable("queue lookup", source))?;
            Ok(documents.into_iter().map(Into::into).collect())
        }
        .boxed()
    }

    fn create_match(&self, new_match: NewMatch) -> BoxFuture<'static, StorageResult<MatchEntity>> {
        let store = self.clone();
        async move {
            let now = store.now();
            let entity = MatchEntity::new(new_match, now.to_system_time());
            store
                .matches()
                .insert_one(MatchDocument::from(&entity))
                .await
                .map_err(|source| unavailable("match insert", source))?;
            Ok(entity)
        }
        .boxed()
    }

    fn delete_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        async move {
            let key = id.to_string();
            store
                .participant_collection()
                .delete_many(doc! {"match_id": key.as_str()})
                .await
                .map_err(|source| unavailable("participant delete", source))?;
            store
                .matches()
                .delete_one(doc! {"_id": key.as_str()})
                .await
                .map_err(|source| unavailable("match delete", source))?;
            Ok(())
        }
        .boxed()
    }

    fn add_participant(
        &self,
        match_id: Uuid,
        player_id: String,
        project_name: String,
    ) -> BoxFuture<'static, StorageResult<ParticipantEntity>> {
        let store = self.clone();
        async move {
            let key = match_id.to_string();
            let entity = store
                .matches()
                .find_one(doc! {"_id": key.as_str()})
                .await
                .map_err(|source| unavailable("match lookup", source))?
                .ok_or_else(|| StorageError::Rejected(format!("match `{match_id}` not found")))?;

            let participants = store.participant_collection();
            let members = participants
                .count_documents(doc! {"match_id": key.as_str()})
                .await
                .map_err(|source| unavailable("participant count", source))?;
            if members >= entity.mode.required_players() as u64 {
                return Err(StorageError::Rejected(format!(
                    "match `{match_id}` already has {members} participants"
                )));
            }
            let already_member = participants
                .count_documents(doc! {"match_id": key.as_str(), "player_id": player_id.as_str()})
                .await
                .map_err(|source| unavailable("participant count", source))?;
            if already_member > 0 {
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
            participants
                .insert_one(ParticipantDocument {
                    id: participant.id.to_string(),
                    match_id: key,
                    player_id: participant.player_id.clone(),
                    project_name: participant.project_name.clone(),
                })
                .await
                .map_err(|source| unavailable("participant insert", source))?;
            Ok(participant)
        }
        .boxed()
    }

    fn participants(
        &self,
        match_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>> {
        let store = self.clone();
        async move {
            let cursor = store
                .participant_collection()
                .find(doc! {"match_id": match_id.to_string()})
                .await
                .map_err(|source| unavailable("participant lookup", source))?;
            let documents: Vec<ParticipantDocument> = cursor
                .try_collect()
                .await
                .map_err(|source| unavailable("participant lookup", source))?;
            documents.into_iter().map(TryInto::try_into).collect()
        }
        .boxed()
    }

    fn set_match_status(
        &self,
        id: Uuid,
        status: MatchStatus,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        async move {
            let result = store
                .matches()
                .update_one(doc! {"_id": id.to_string()}, status_update(status, store.now()))
                .await
                .map_err(|source| unavailable("status update", source))?;
            if result.matched_count == 0 {
                return Err(StorageError::Rejected(format!("match `{id}` not found")));
            }
            Ok(())
        }
        .boxed()
    }

    fn transition_match_status(
        &self,
        id: Uuid,
        from: Vec<MatchStatus>,
        to: MatchStatus,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        async move {
            let from = from.iter().map(|status| status.as_str()).collect::<Vec<_>>();
            let result = store
                .matches()
                .update_one(
                    doc! {"_id": id.to_string(), "status": {"$in": from}},
                    status_update(to, store.now()),
                )
                .await
                .map_err(|source| unavailable("status transition", source))?;
            Ok(result.matched_count == 1)
        }
        .boxed()
    }

    fn get_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        async move {
            let document = store
                .matches()
                .find_one(doc! {"_id": id.to_string()})
                .await
                .map_err(|source| unavailable("match lookup", source))?;
            document.map(TryInto::try_into).transpose()
        }
        .boxed()
    }

    fn get_active_matches(&self) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
        let store = self.clone();
        async move {
            let cursor = store
                .matches()
                .find(doc! {"status": {"$in": ["active", "voting"]}})
                .sort(doc! {"created_at": 1})
                .await
                .map_err(|source| unavailable("active match lookup", source))?;
            let documents: Vec<MatchDocument> = cursor
                .try_collect()
                .await
                .map_err(|source| unavailable("active match lookup", source))?;
            documents.into_iter().map(TryInto::try_into).collect()
        }
        .boxed()
    }

    fn get_active_match_for_player(
        &self,
        player_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        async move {
            let cursor = store
                .participant_collection()
                .find(doc! {"player_id": player_id.as_str()})
                .await
                .map_err(|source| unavailable("participant lookup", source))?;
            let memberships: Vec<ParticipantDocument> = cursor
                .try_collect()
                .await
                .map_err(|source| unavailable("participant lookup", source))?;
            if memberships.is_empty() {
                return Ok(None);
            }

            let match_ids = memberships
                .into_iter()
                .map(|membership| membership.match_id)
                .collect::<Vec<_>>();
            let document = store
                .matches()
                .find_one(doc! {"_id": {"$in": match_ids}, "status": MatchStatus::Active.as_str()})
                .await
                .map_err(|source| unavailable("match lookup", source))?;
            document.map(TryInto::try_into).transpose()
        }
        .boxed()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        async move {
            store
                .mongo
                .ping()
                .await
                .map_err(|err| StorageError::unavailable(err.to_string(), err))
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;

    #[test]
    fn activation_update_stamps_start_time() {
        let now = DateTime::from_millis(1_000);
        let update = status_update(MatchStatus::Active, now);
        let set = update.get_document("$set").unwrap();
        assert_eq!(set.get_str("status").unwrap(), "active");
        assert_eq!(set.get_datetime("start_time").unwrap(), &now);
        assert!(set.get("end_time").is_none());
    }

    #[test]
    fn completion_update_stamps_end_time() {
        let now = DateTime::from_millis(2_000);
        let update = status_update(MatchStatus::Completed, now);
        let set = update.get_document("$set").unwrap();
        assert_eq!(set.get_datetime("end_time").unwrap(), &now);
        assert!(set.get("start_time").is_none());
    }

    #[test]
    fn match_documents_convert_back_to_entities() {
        let created = SystemTime::UNIX_EPOCH + Duration::from_millis(5_000);
        let mut entity = MatchEntity::new(
            NewMatch {
                category: "jazz".into(),
                mode: GameMode::Group,
                sample: SampleRef {
                    name: "Study".into(),
                    url: "/samples/jazz/study.mp3".into(),
                },
            },
            created,
        );
        entity.apply_status(MatchStatus::Active, created);

        let restored = MatchEntity::try_from(MatchDocument::from(&entity)).unwrap();
        assert_eq!(restored, entity);
    }

    #[test]
    fn corrupted_ids_are_reported() {
        let document = ParticipantDocument {
            id: "not-a-uuid".into(),
            match_id: Uuid::new_v4().to_string(),
            player_id: "p1".into(),
            project_name: "New Project".into(),
        };
        assert!(matches!(
            ParticipantEntity::try_from(document),
            Err(StorageError::Corrupted(_))
        ));
    }
}
