//! Natal chart core.
//!
//! Turns a birth date, time and place into a chart record: ten planet
//! longitudes decomposed into sign, degree and minute, twelve house cusps with
//! the Ascendant and Midheaven, and the house each planet falls in. House
//! results are cached under a content hash of the birth parameters, and a
//! missing or failing house engine only degrades the house block.

pub mod cache;
pub mod chart;
pub mod config;
pub mod error;
pub mod houses;
pub mod request;
pub mod store;
pub mod time;
pub mod zodiac;

pub use natal_ephemeris as ephemeris;

pub use crate::cache::{cache_key, CacheEntry, HouseCache};
pub use crate::chart::{ChartMetadata, ChartRecord, ChartService, HouseBlock, PlanetEntry, StoredChart};
pub use crate::config::{ConfigError, Settings};
pub use crate::error::ChartError;
pub use crate::houses::{assign_planet_to_house, houses_from_cusps, Angle, HouseComputationResult, HouseCusp};
pub use crate::request::{ChartRequest, ValidationError};
pub use crate::store::{FileStore, KeyValueStore, MemoryStore, StoreError};
pub use crate::time::{to_julian_day, BirthParameters};
pub use crate::zodiac::{normalize, DegreeInfo, ZodiacSign};
