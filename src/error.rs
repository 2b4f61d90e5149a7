use natal_ephemeris::EphemerisError;
use thiserror::Error;

use crate::request::ValidationError;
use crate::store::StoreError;

/// Request-level failure. House problems never show up here; they are
/// recorded in the chart's house block instead.
#[derive(Debug, Error)]
pub enum ChartError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("planet positions unavailable: {0}")]
    Positions(#[source] EphemerisError),
    #[error("chart could not be stored: {0}")]
    Persistence(#[from] StoreError),
    #[error("chart record is malformed: {0}")]
    Record(#[from] serde_json::Error),
}
