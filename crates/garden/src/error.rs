use thiserror::Error;

use crate::schema::PlantId;

pub type GardenResult<T> = core::result::Result<T, GardenError>;

/// Failures of the durable layer (plant journal, achievement ledger).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum GardenError {
    /// The plant is gone, usually because a deletion won the race.  Callers
    /// treat this as a soft no-op.
    #[error("plant not found: {0}")]
    NotFound(PlantId),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The write did not commit; nothing was applied.
    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

impl GardenError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
