use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type JulianDay = f64;

/// Bodies carried in a natal chart, numbered the way the Swiss Ephemeris numbers them.
#[repr(i32)]
#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Body {
    Sun = 0,
    Moon = 1,
    Mercury = 2,
    Venus = 3,
    Mars = 4,
    Jupiter = 5,
    Saturn = 6,
    Uranus = 7,
    Neptune = 8,
    Pluto = 9,
}

impl Body {
    pub const ALL: [Body; 10] = [
        Body::Sun,
        Body::Moon,
        Body::Mercury,
        Body::Venus,
        Body::Mars,
        Body::Jupiter,
        Body::Saturn,
        Body::Uranus,
        Body::Neptune,
        Body::Pluto,
    ];

    pub fn iter() -> impl Iterator<Item = Body> {
        Self::ALL.iter().copied()
    }

    /// Lowercase key used in chart records.
    pub fn name(&self) -> &'static str {
        match self {
            Body::Sun => "sun",
            Body::Moon => "moon",
            Body::Mercury => "mercury",
            Body::Venus => "venus",
            Body::Mars => "mars",
            Body::Jupiter => "jupiter",
            Body::Saturn => "saturn",
            Body::Uranus => "uranus",
            Body::Neptune => "neptune",
            Body::Pluto => "pluto",
        }
    }
}

impl fmt::Display for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[repr(i32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Calendar {
    Julian = 0,
    Gregorian = 1,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HouseSystem {
    #[default]
    Placidus,
    Porphyry,
}

impl HouseSystem {
    /// Single-letter code understood by `swe_houses`.
    pub fn code(&self) -> char {
        match self {
            HouseSystem::Placidus => 'P',
            HouseSystem::Porphyry => 'O',
        }
    }
}

impl fmt::Display for HouseSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HouseSystem::Placidus => "placidus",
            HouseSystem::Porphyry => "porphyry",
        };
        write!(f, "{}", name)
    }
}

/// Raw house geometry as produced by an engine, before any validation.
#[derive(Debug, Clone, PartialEq)]
pub struct HouseCusps {
    /// Cusp longitudes for houses 1..=12, index 0 is house 1.
    pub cusps: Vec<f64>,
    pub ascendant: f64,
    pub midheaven: f64,
    /// System the engine actually used; may differ from the request at polar latitudes.
    pub system: HouseSystem,
}

impl HouseCusps {
    /// Checks that every value is present and finite.
    pub fn ensure_complete(&self) -> Result<(), EphemerisError> {
        if self.cusps.len() != 12 {
            return Err(EphemerisError::Incomplete(format!(
                "expected 12 cusps, engine returned {}",
                self.cusps.len()
            )));
        }
        if let Some(i) = self.cusps.iter().position(|c| !c.is_finite()) {
            return Err(EphemerisError::Incomplete(format!("cusp {} is not finite", i + 1)));
        }
        if !self.ascendant.is_finite() {
            return Err(EphemerisError::Incomplete("ascendant is not finite".into()));
        }
        if !self.midheaven.is_finite() {
            return Err(EphemerisError::Incomplete("midheaven is not finite".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyCoordinates {
    pub longitude: f64,
    pub latitude: f64,
    /// Geocentric distance in kilometres.
    pub distance_km: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyPosition {
    pub body: Body,
    pub coordinates: BodyCoordinates,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("CalculationError {{ code: {code} message: {message} }}")]
pub struct CalculationError {
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EphemerisError {
    #[error("ephemeris unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Calculation(#[from] CalculationError),
    #[error("{system} cusp {house} did not converge after {iterations} iterations")]
    NonConvergent {
        system: HouseSystem,
        house: u8,
        iterations: usize,
    },
    #[error("incomplete house result: {0}")]
    Incomplete(String),
    #[error("ephemeris path {path} is not usable: {message}")]
    InvalidPath { path: String, message: String },
}

/// A house/position engine. Implementations may hold process-level native
/// state; callers go through [`EngineSession`] so `close` always runs.
pub trait EphemerisEngine: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> String;

    /// Acquire whatever the engine needs for a computation.
    fn open(&self) -> Result<(), EphemerisError> {
        Ok(())
    }

    /// Release what `open` acquired. Must be safe to call after a failed computation.
    fn close(&self) {}

    fn julian_day(&self, year: i32, month: u32, day: u32, hour: f64, calendar: Calendar) -> JulianDay;

    fn houses(
        &self,
        julian_day: JulianDay,
        latitude: f64,
        longitude: f64,
        system: HouseSystem,
    ) -> Result<HouseCusps, EphemerisError>;

    fn body_longitude(&self, julian_day: JulianDay, body: Body) -> Result<BodyCoordinates, EphemerisError>;
}

/// Open engine handle; dropping it closes the engine on every exit path.
pub struct EngineSession<'a> {
    engine: &'a dyn EphemerisEngine,
}

impl<'a> EngineSession<'a> {
    pub fn open(engine: &'a dyn EphemerisEngine) -> Result<Self, EphemerisError> {
        engine.open()?;
        Ok(EngineSession { engine })
    }

    pub fn houses(
        &self,
        julian_day: JulianDay,
        latitude: f64,
        longitude: f64,
        system: HouseSystem,
    ) -> Result<HouseCusps, EphemerisError> {
        self.engine.houses(julian_day, latitude, longitude, system)
    }

    pub fn body_longitude(&self, julian_day: JulianDay, body: Body) -> Result<BodyCoordinates, EphemerisError> {
        self.engine.body_longitude(julian_day, body)
    }
}

impl Drop for EngineSession<'_> {
    fn drop(&mut self) {
        self.engine.close();
    }
}

/// The house capability, resolved once at start-up.
#[derive(Clone)]
pub enum Ephemeris {
    Available(Arc<dyn EphemerisEngine>),
    Unavailable { reason: String },
}

impl Ephemeris {
    pub fn available<E: EphemerisEngine + 'static>(engine: E) -> Self {
        Ephemeris::Available(Arc::new(engine))
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Ephemeris::Unavailable { reason: reason.into() }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Ephemeris::Available(_))
    }

    /// Julian Day through the engine's own calendar routine, or the built-in
    /// conversion when no engine is available.
    pub fn julian_day(&self, year: i32, month: u32, day: u32, hour: f64, calendar: Calendar) -> JulianDay {
        match self {
            Ephemeris::Available(engine) => engine.julian_day(year, month, day, hour, calendar),
            Ephemeris::Unavailable { .. } => crate::julian::julian_day(year, month, day, hour, calendar),
        }
    }

    /// Engine identifier recorded in chart metadata.
    pub fn version(&self) -> String {
        match self {
            Ephemeris::Available(engine) => format!("{} {}", engine.name(), engine.version()),
            Ephemeris::Unavailable { .. } => "unavailable".to_string(),
        }
    }
}

impl fmt::Debug for Ephemeris {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ephemeris::Available(engine) => f.debug_tuple("Available").field(&engine.name()).finish(),
            Ephemeris::Unavailable { reason } => {
                f.debug_struct("Unavailable").field("reason", reason).finish()
            }
        }
    }
}

/// Source of the chart's planet longitudes. Kept apart from the house engine
/// so a house outage never blocks planets.
pub trait PositionProvider: Send + Sync {
    fn name(&self) -> &str;

    fn positions(&self, julian_day: JulianDay) -> Result<Vec<BodyPosition>, EphemerisError>;
}
