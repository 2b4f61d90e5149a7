//! Ephemeris engines for natal charts: Julian Day conversion, house cusps and
//! geocentric planet positions.
//!
//! The house capability is selected once, at start-up, through
//! [`Ephemeris::init`]. Callers that need houses take an [`EngineSession`],
//! which opens the engine and closes it again when dropped.

pub mod analytic;
pub mod engine;
pub mod elements;
pub mod julian;
#[cfg(feature = "swisseph")]
pub mod swiss;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub use crate::analytic::AnalyticEngine;
pub use crate::engine::*;
pub use crate::elements::{ElementsProvider, AU_KM, EARTH_RADIUS_KM};
#[cfg(feature = "swisseph")]
pub use crate::swiss::SwissEphemeris;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    #[default]
    Analytic,
    Swisseph,
    None,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EphemerisSettings {
    #[serde(default)]
    pub engine: EngineKind,
    /// Directory holding the `.se1` data files; only read by the swisseph engine.
    #[serde(default)]
    pub ephe_path: Option<PathBuf>,
}

impl Ephemeris {
    /// Resolves the configured engine. Never fails: a missing engine yields
    /// `Unavailable` and charts are produced without houses.
    pub fn init(settings: &EphemerisSettings) -> Ephemeris {
        let eph = match settings.engine {
            EngineKind::Analytic => Ephemeris::available(AnalyticEngine::new()),
            EngineKind::Swisseph => swiss_engine(settings),
            EngineKind::None => Ephemeris::unavailable("house engine disabled by configuration"),
        };
        match &eph {
            Ephemeris::Available(engine) => info!(engine = engine.name(), "house engine ready"),
            Ephemeris::Unavailable { reason } => warn!(%reason, "house engine unavailable, charts will omit houses"),
        }
        eph
    }
}

#[cfg(feature = "swisseph")]
fn swiss_engine(settings: &EphemerisSettings) -> Ephemeris {
    let path = settings
        .ephe_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("/usr/local/share/swisseph"));
    match SwissEphemeris::new(&path) {
        Ok(engine) => Ephemeris::available(engine),
        Err(e) => Ephemeris::unavailable(e.to_string()),
    }
}

#[cfg(not(feature = "swisseph"))]
fn swiss_engine(_settings: &EphemerisSettings) -> Ephemeris {
    Ephemeris::unavailable("built without swisseph support")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analytic_is_the_default() {
        let eph = Ephemeris::init(&EphemerisSettings::default());
        assert!(eph.is_available());
        assert!(eph.version().starts_with("analytic"));
    }

    #[test]
    fn disabled_engine_is_unavailable() {
        let settings = EphemerisSettings {
            engine: EngineKind::None,
            ephe_path: None,
        };
        match Ephemeris::init(&settings) {
            Ephemeris::Unavailable { reason } => assert!(reason.contains("disabled")),
            other => panic!("expected unavailable, got {:?}", other),
        }
    }

    #[cfg(not(feature = "swisseph"))]
    #[test]
    fn swisseph_without_feature_is_unavailable() {
        let settings = EphemerisSettings {
            engine: EngineKind::Swisseph,
            ephe_path: None,
        };
        assert!(!Ephemeris::init(&settings).is_available());
    }
}
