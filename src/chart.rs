use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use natal_ephemeris::{
    Body, BodyPosition, EngineSession, Ephemeris, EphemerisEngine, HouseSystem, JulianDay, PositionProvider,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::{cache_key, HouseCache};
use crate::config::{Settings, StoreBackend};
use crate::error::ChartError;
use crate::houses::{compute_result, Angle, HouseComputationResult, HouseCusp, HouseError};
use crate::request::ChartRequest;
use crate::store::{FileStore, KeyValueStore, MemoryStore, StoreError};
use crate::time::BirthParameters;
use crate::zodiac::{format_dms, normalize, normalize_degrees, ZodiacSign};

pub const CHART_SORT_KEY: &str = "NATAL_CHART";
pub const CHART_TYPE: &str = "natal";
pub const DEFAULT_ALGO_VERSION: &str = "natal-placidus-1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum HouseBlock {
    Success { data: Vec<HouseCusp> },
    Failed { error: String },
}

impl HouseBlock {
    pub fn is_success(&self) -> bool {
        matches!(self, HouseBlock::Success { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanetEntry {
    pub name: String,
    pub longitude: f64,
    pub longitude_display: String,
    pub distance_km: f64,
    pub sign: ZodiacSign,
    pub degree_in_sign: u8,
    pub minutes: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub house: Option<u8>,
}

impl PlanetEntry {
    fn new(position: &BodyPosition, house: Option<u8>) -> Self {
        let longitude = normalize_degrees(position.coordinates.longitude);
        let info = normalize(longitude);
        PlanetEntry {
            name: position.body.name().to_string(),
            longitude,
            longitude_display: format_dms(longitude),
            distance_km: position.coordinates.distance_km,
            sign: info.sign,
            degree_in_sign: info.degree_in_sign,
            minutes: info.minutes,
            house,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    pub algo_version: String,
    pub ephemeris_version: String,
    pub position_source: String,
    pub input_hash: String,
    pub calculation_timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub house_system: Option<HouseSystem>,
    pub houses_from_cache: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartRecord {
    pub birth_info: BirthParameters,
    pub planets: BTreeMap<String, PlanetEntry>,
    pub houses: HouseBlock,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ascendant: Option<Angle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub midheaven: Option<Angle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planet_houses: Option<BTreeMap<String, u8>>,
    pub metadata: ChartMetadata,
}

/// The item written to the chart store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredChart {
    pub subject_id: String,
    pub chart_type: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub chart: ChartRecord,
}

struct HouseOutcome {
    result: Result<HouseComputationResult, HouseError>,
    from_cache: bool,
}

/// Process-scoped chart handle: build it once and share it across requests.
pub struct ChartService {
    ephemeris: Ephemeris,
    positions: Arc<dyn PositionProvider>,
    store: Arc<dyn KeyValueStore>,
    cache: HouseCache,
    house_system: HouseSystem,
    algo_version: String,
    store_timeout: Duration,
}

impl ChartService {
    /// A service with a 30 day house cache over `store`.
    pub fn new(ephemeris: Ephemeris, positions: Arc<dyn PositionProvider>, store: Arc<dyn KeyValueStore>) -> Self {
        let store_timeout = Duration::from_secs(2);
        ChartService {
            cache: HouseCache::new(store.clone(), Duration::from_secs(30 * 86_400), store_timeout),
            ephemeris,
            positions,
            store,
            house_system: HouseSystem::Placidus,
            algo_version: DEFAULT_ALGO_VERSION.to_string(),
            store_timeout,
        }
    }

    pub fn from_settings(settings: &Settings, positions: Arc<dyn PositionProvider>) -> Result<Self, StoreError> {
        let store: Arc<dyn KeyValueStore> = match settings.store.backend {
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
            StoreBackend::File => Arc::new(FileStore::new(&settings.store.root)?),
        };
        let timeout = settings.store.timeout();
        let cache = if settings.cache.enabled {
            HouseCache::new(store.clone(), settings.cache.ttl(), timeout)
        } else {
            HouseCache::disabled(store.clone())
        };
        let ephemeris = Ephemeris::init(&settings.ephemeris.engine_settings());
        Ok(ChartService::new(ephemeris, positions, store)
            .with_cache(cache)
            .with_house_system(settings.ephemeris.house_system)
            .with_algo_version(&settings.chart.algo_version)
            .with_store_timeout(timeout))
    }

    pub fn with_cache(mut self, cache: HouseCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_house_system(mut self, house_system: HouseSystem) -> Self {
        self.house_system = house_system;
        self
    }

    pub fn with_algo_version(mut self, algo_version: &str) -> Self {
        self.algo_version = algo_version.to_string();
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn cache_key(&self, params: &BirthParameters) -> String {
        cache_key(params, self.house_system, &self.algo_version)
    }

    /// Validates, computes and stores a chart for the request's subject.
    pub async fn generate(&self, request: &ChartRequest) -> Result<StoredChart, ChartError> {
        let (subject_id, params) = request.validate()?;
        let chart = self.compute(&params).await?;
        let stored = StoredChart {
            subject_id,
            chart_type: CHART_TYPE.to_string(),
            created_at: Utc::now(),
            chart,
        };
        self.persist(&stored).await?;
        Ok(stored)
    }

    /// Reads back a stored chart.
    pub async fn fetch_chart(&self, subject_id: &str) -> Result<Option<StoredChart>, ChartError> {
        let read = tokio::time::timeout(self.store_timeout, self.store.get(subject_id, CHART_SORT_KEY))
            .await
            .map_err(|_| StoreError::Timeout {
                operation: "get",
                timeout_ms: self.store_timeout.as_millis() as u64,
            })??;
        match read {
            Some(item) => Ok(Some(serde_json::from_value(item)?)),
            None => Ok(None),
        }
    }

    async fn persist(&self, stored: &StoredChart) -> Result<(), ChartError> {
        let item = serde_json::to_value(stored)?;
        tokio::time::timeout(
            self.store_timeout,
            self.store.put(&stored.subject_id, CHART_SORT_KEY, item, None),
        )
        .await
        .map_err(|_| StoreError::Timeout {
            operation: "put",
            timeout_ms: self.store_timeout.as_millis() as u64,
        })??;
        info!(
            subject_id = %stored.subject_id,
            houses = if stored.chart.houses.is_success() { "success" } else { "failed" },
            "natal chart stored"
        );
        Ok(())
    }

    /// Builds the chart record. The planet path and the house path run
    /// concurrently; a house failure only marks the house block as failed.
    pub async fn compute(&self, params: &BirthParameters) -> Result<ChartRecord, ChartError> {
        let jd = params.julian_day_with(&self.ephemeris);
        let key = self.cache_key(params);
        debug!(julian_day = jd, cache_key = %key, "computing chart");

        let planet_path = async { self.positions.positions(jd).map_err(ChartError::Positions) };
        let (positions, outcome) = tokio::join!(planet_path, self.house_path(params, jd, &key));
        let positions = positions?;

        let (houses, ascendant, midheaven, planet_houses, house_system) = match outcome.result {
            Ok(result) => (
                HouseBlock::Success { data: result.houses },
                Some(result.ascendant),
                Some(result.midheaven),
                Some(result.planet_houses),
                Some(result.house_system),
            ),
            Err(e) => (HouseBlock::Failed { error: e.to_string() }, None, None, None, None),
        };

        let planets = positions
            .iter()
            .map(|p| {
                let house = planet_houses
                    .as_ref()
                    .and_then(|ph| ph.get(p.body.name()).copied());
                (p.body.name().to_string(), PlanetEntry::new(p, house))
            })
            .collect();

        Ok(ChartRecord {
            birth_info: params.clone(),
            planets,
            houses,
            ascendant,
            midheaven,
            planet_houses,
            metadata: ChartMetadata {
                algo_version: self.algo_version.clone(),
                ephemeris_version: self.ephemeris.version(),
                position_source: self.positions.name().to_string(),
                input_hash: key,
                calculation_timestamp: Utc::now(),
                house_system,
                houses_from_cache: outcome.from_cache,
            },
        })
    }

    async fn house_path(&self, params: &BirthParameters, jd: JulianDay, key: &str) -> HouseOutcome {
        if let Some(hit) = self.cache.get(key).await {
            return HouseOutcome {
                result: Ok(hit),
                from_cache: true,
            };
        }

        let result = match &self.ephemeris {
            Ephemeris::Available(engine) => {
                // native engines block, keep them off the async workers
                let (engine, params, system) = (engine.clone(), params.clone(), self.house_system);
                tokio::task::spawn_blocking(move || compute_houses(engine.as_ref(), &params, jd, system))
                    .await
                    .unwrap_or_else(|e| Err(HouseError::Aborted(e.to_string())))
            }
            Ephemeris::Unavailable { reason } => Err(HouseError::Unavailable(reason.clone())),
        };
        match &result {
            Ok(value) => {
                self.cache.put(key, value).await;
            }
            Err(e) => warn!(cache_key = key, error = %e, "house computation failed, chart will omit houses"),
        }
        HouseOutcome {
            result,
            from_cache: false,
        }
    }
}

/// Runs one house computation inside an engine session. The session closes
/// the engine on every return path.
fn compute_houses(
    engine: &dyn EphemerisEngine,
    params: &BirthParameters,
    jd: JulianDay,
    system: HouseSystem,
) -> Result<HouseComputationResult, HouseError> {
    let session = EngineSession::open(engine)?;
    let raw = session.houses(jd, params.latitude, params.longitude, system)?;
    let bodies = Body::iter()
        .map(|body| session.body_longitude(jd, body).map(|c| (body, c.longitude)))
        .collect::<Result<Vec<_>, _>>()?;
    compute_result(&raw, &bodies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use natal_ephemeris::{AnalyticEngine, ElementsProvider};

    fn einstein() -> BirthParameters {
        BirthParameters {
            birth_date: NaiveDate::from_ymd_opt(1879, 3, 14).unwrap(),
            birth_time: NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
            latitude: 48.4,
            longitude: 9.99,
            time_zone: chrono_tz::UTC,
        }
    }

    fn service(ephemeris: Ephemeris) -> ChartService {
        ChartService::new(ephemeris, Arc::new(ElementsProvider), Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn full_chart_with_analytic_engine() {
        let chart = service(Ephemeris::available(AnalyticEngine::new()))
            .compute(&einstein())
            .await
            .unwrap();

        assert_eq!(chart.planets.len(), 10);
        assert_eq!(chart.planets["sun"].sign, ZodiacSign::Pisces);
        match &chart.houses {
            HouseBlock::Success { data } => {
                assert_eq!(data.len(), 12);
                for (i, cusp) in data.iter().enumerate() {
                    assert_eq!(cusp.house_number as usize, i + 1);
                    assert!((0.0..360.0).contains(&cusp.cusp_degree));
                }
            }
            other => panic!("expected houses, got {:?}", other),
        }
        let planet_houses = chart.planet_houses.as_ref().unwrap();
        assert_eq!(planet_houses.len(), 10);
        assert!(planet_houses.values().all(|h| (1..=12).contains(h)));
        assert!(chart.planets.values().all(|p| p.house.is_some()));
        assert_eq!(chart.metadata.house_system, Some(HouseSystem::Placidus));
        assert!(!chart.metadata.houses_from_cache);
    }

    #[tokio::test]
    async fn unavailable_engine_degrades_houses_only() {
        let chart = service(Ephemeris::unavailable("no data files"))
            .compute(&einstein())
            .await
            .unwrap();

        assert!(!chart.planets.is_empty());
        assert!(chart.ascendant.is_none());
        assert!(chart.planet_houses.is_none());
        match chart.houses {
            HouseBlock::Failed { error } => assert!(error.contains("no data files")),
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(chart.metadata.ephemeris_version, "unavailable");
    }

    #[tokio::test]
    async fn polar_latitude_still_has_houses() {
        let mut params = einstein();
        params.latitude = 71.0;
        let chart = service(Ephemeris::available(AnalyticEngine::new()))
            .compute(&params)
            .await
            .unwrap();
        assert!(chart.houses.is_success());
        assert_eq!(chart.metadata.house_system, Some(HouseSystem::Porphyry));
    }

    #[test]
    fn house_block_wire_shape() {
        let failed = serde_json::to_value(HouseBlock::Failed { error: "boom".into() }).unwrap();
        assert_eq!(failed["status"], "failed");
        assert_eq!(failed["error"], "boom");

        let ok = serde_json::to_value(HouseBlock::Success { data: vec![] }).unwrap();
        assert_eq!(ok["status"], "success");
        assert!(ok["data"].as_array().unwrap().is_empty());
    }
}
