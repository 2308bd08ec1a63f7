use std::time::Duration;

use mongodb::{
    Client, Database, IndexModel,
    bson::{Document, doc},
    error::Error as MongoError,
    options::{ClientOptions, IndexOptions},
};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{info, warn};

const DEFAULT_DB: &str = "flip_battle";
const MAX_CONNECT_ATTEMPTS: u32 = 5;
const BASE_RETRY_DELAY_MS: u64 = 250;
const MAX_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Collection holding one document per queued player (`_id` is the player id).
pub const QUEUE_COLLECTION: &str = "matchmaking_queue";
/// Collection holding match records.
pub const MATCH_COLLECTION: &str = "matches";
/// Collection holding match participants.
pub const PARTICIPANT_COLLECTION: &str = "match_participants";

/// Connected MongoDB database. Reconnection is driven by the storage supervisor, which drops
/// the manager and connects again once health checks keep failing.
#[derive(Clone)]
pub struct MongoManager {
    // The driver pools connections per client; keep it alive with the database handle.
    _client: Client,
    database: Database,
}

type Result<T> = std::result::Result<T, MongoDaoError>;

/// Failures raised while connecting to or preparing MongoDB.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// The connection string is malformed.
    #[error("failed to parse MongoDB connection URI")]
    InvalidUri(#[source] MongoError),
    /// The driver rejected the parsed options.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction(#[source] MongoError),
    /// Every initial ping failed.
    #[error("MongoDB did not answer after {attempts} ping(s)")]
    Unreachable {
        /// Pings sent before giving up.
        attempts: u32,
        /// Last driver error.
        #[source]
        source: MongoError,
    },
    /// A single ping failed.
    #[error("MongoDB ping failed")]
    Ping(#[source] MongoError),
    /// Index creation failed.
    #[error("failed to ensure index `{index}` on `{collection}`")]
    EnsureIndex {
        /// Target collection.
        collection: &'static str,
        /// Index name.
        index: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
}

/// Parse `uri`, build a client and wait for the first successful ping.
pub async fn connect(uri: &str, db_name: Option<&str>) -> Result<MongoManager> {
    let options = ClientOptions::parse(uri)
        .await
        .map_err(MongoDaoError::InvalidUri)?;
    let client = Client::with_options(options).map_err(MongoDaoError::ClientConstruction)?;
    let database = client.database(db_name.unwrap_or(DEFAULT_DB));

    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match ping(&database).await {
            Ok(()) => {
                info!(attempt, database = database.name(), "connected to MongoDB");
                return Ok(MongoManager {
                    _client: client,
                    database,
                });
            }
            Err(MongoDaoError::Ping(source)) if attempt >= MAX_CONNECT_ATTEMPTS => {
                return Err(MongoDaoError::Unreachable {
                    attempts: attempt,
                    source,
                });
            }
            Err(err) => {
                let wait = retry_delay(attempt);
                warn!(attempt, wait_ms = wait.as_millis(), error = %err, "MongoDB not reachable yet");
                sleep(wait).await;
            }
        }
    }
}

/// Indexes backing the FIFO bucket scan, the per-player participant lookup, and the
/// per-match participant listing.
pub async fn ensure_indexes(database: &Database) -> Result<()> {
    let indexes: [(&'static str, &'static str, Document, bool); 3] = [
        (
            QUEUE_COLLECTION,
            "bucket_fifo",
            doc! {"category": 1, "mode": 1, "joined_at": 1},
            false,
        ),
        (
            PARTICIPANT_COLLECTION,
            "match_player",
            doc! {"match_id": 1, "player_id": 1},
            true,
        ),
        (PARTICIPANT_COLLECTION, "by_player", doc! {"player_id": 1}, false),
    ];

    for (collection, index, keys, unique) in indexes {
        let options = IndexOptions::builder()
            .name(index.to_owned())
            .unique(unique)
            .build();
        let model = IndexModel::builder().keys(keys).options(options).build();
        database
            .collection::<Document>(collection)
            .create_index(model)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection,
                index,
                source,
            })?;
    }
    Ok(())
}

impl MongoManager {
    /// Handle on the configured database.
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Round-trip a `ping` command.
    pub async fn ping(&self) -> Result<()> {
        ping(&self.database).await
    }
}

async fn ping(database: &Database) -> Result<()> {
    database
        .run_command(doc! {"ping": 1})
        .await
        .map(|_| ())
        .map_err(MongoDaoError::Ping)
}

fn retry_delay(attempt: u32) -> Duration {
    let backoff_multiplier = 1u64 << (attempt.saturating_sub(1).min(4));
    Duration::from_millis(BASE_RETRY_DELAY_MS * backoff_multiplier).min(MAX_RETRY_DELAY)
}
