use rand::seq::IndexedRandom;

use crate::{config::AppConfig, dao::models::SampleRef, error::ServiceError};

/// Draw a random sample from the pool of `category`.
pub fn pick_sample(config: &AppConfig, category: &str) -> Result<SampleRef, ServiceError> {
    let pool = config
        .samples(category)
        .ok_or_else(|| ServiceError::InvalidInput(format!("unknown category `{category}`")))?;
    pool.choose(&mut rand::rng())
        .cloned()
        .ok_or_else(|| ServiceError::InvalidState(format!("no samples for category `{category}`")))
}
