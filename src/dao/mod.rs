/// Persistence gateway consumed by the matchmaker and the lifecycle controller.
pub mod match_store;
/// Database model definitions.
pub mod models;
/// MongoDB connection management.
#[cfg(feature = "mongo-store")]
pub mod mongodb;
/// Storage abstraction layer for database operations.
pub mod storage;
