use tracing::debug;

use crate::engine::{
    Body, BodyCoordinates, Calendar, EphemerisEngine, EphemerisError, HouseCusps, HouseSystem, JulianDay,
};
use crate::elements;
use crate::julian::{self, wrap_degrees};

const MAX_ITERATIONS: usize = 100;
const CONVERGENCE_DEG: f64 = 1e-10;

/// Pure-Rust house engine: sidereal time, angles, Placidus and Porphyry cusps.
/// Holds no native state, so `open`/`close` are no-ops.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnalyticEngine;

impl AnalyticEngine {
    pub fn new() -> Self {
        AnalyticEngine
    }
}

impl EphemerisEngine for AnalyticEngine {
    fn name(&self) -> &str {
        "analytic"
    }

    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    fn julian_day(&self, year: i32, month: u32, day: u32, hour: f64, calendar: Calendar) -> JulianDay {
        julian::julian_day(year, month, day, hour, calendar)
    }

    fn houses(
        &self,
        julian_day: JulianDay,
        latitude: f64,
        longitude: f64,
        system: HouseSystem,
    ) -> Result<HouseCusps, EphemerisError> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(EphemerisError::Calculation(crate::CalculationError {
                code: -1,
                message: format!("coordinates out of range: {}, {}", latitude, longitude),
            }));
        }
        let ramc = julian::local_sidereal_degrees(julian_day, longitude);
        let eps = julian::mean_obliquity_degrees(julian_day);
        compute_houses(ramc, eps, latitude, system)
    }

    fn body_longitude(&self, julian_day: JulianDay, body: Body) -> Result<BodyCoordinates, EphemerisError> {
        Ok(elements::geocentric(body, julian_day))
    }
}

/// Midheaven longitude for a sidereal angle `ramc` and obliquity `eps`, in degrees.
pub fn midheaven(ramc: f64, eps: f64) -> f64 {
    let r = ramc.to_radians();
    wrap_degrees(r.sin().atan2(r.cos() * eps.to_radians().cos()).to_degrees())
}

/// Ascendant longitude, the ecliptic point rising on the eastern horizon.
pub fn ascendant(ramc: f64, eps: f64, latitude: f64) -> f64 {
    let (r, e, phi) = (ramc.to_radians(), eps.to_radians(), latitude.to_radians());
    let y = r.cos();
    let x = -(r.sin() * e.cos() + phi.tan() * e.sin());
    wrap_degrees(y.atan2(x).to_degrees())
}

/// Cusps and angles for the given sidereal angle. Placidus is undefined
/// inside the polar circles and falls back to Porphyry there.
pub fn compute_houses(ramc: f64, eps: f64, latitude: f64, system: HouseSystem) -> Result<HouseCusps, EphemerisError> {
    let mc = midheaven(ramc, eps);
    let mut asc = ascendant(ramc, eps, latitude);
    // keep the ascendant in the eastern half of the chart
    if wrap_degrees(asc - mc) > 180.0 {
        asc = wrap_degrees(asc + 180.0);
    }

    let used = match system {
        HouseSystem::Placidus if latitude.abs() >= 90.0 - eps => {
            debug!(latitude, "placidus undefined at this latitude, using porphyry");
            HouseSystem::Porphyry
        }
        s => s,
    };

    let quadrant = match used {
        HouseSystem::Placidus => placidus(ramc, eps, latitude)?,
        HouseSystem::Porphyry => porphyry(asc, mc),
    };
    let [c11, c12, c2, c3] = quadrant;

    let cusps = vec![
        asc,
        c2,
        c3,
        wrap_degrees(mc + 180.0),
        wrap_degrees(c11 + 180.0),
        wrap_degrees(c12 + 180.0),
        wrap_degrees(asc + 180.0),
        wrap_degrees(c2 + 180.0),
        wrap_degrees(c3 + 180.0),
        mc,
        c11,
        c12,
    ];
    Ok(HouseCusps {
        cusps,
        ascendant: asc,
        midheaven: mc,
        system: used,
    })
}

/// Intermediate cusps 11, 12, 2, 3 by trisecting the ecliptic quadrants.
fn porphyry(asc: f64, mc: f64) -> [f64; 4] {
    let upper = wrap_degrees(asc - mc);
    let lower = 180.0 - upper;
    [
        wrap_degrees(mc + upper / 3.0),
        wrap_degrees(mc + 2.0 * upper / 3.0),
        wrap_degrees(asc + lower / 3.0),
        wrap_degrees(asc + 2.0 * lower / 3.0),
    ]
}

/// Intermediate cusps 11, 12, 2, 3 by trisecting each point's own semi-arc.
fn placidus(ramc: f64, eps: f64, latitude: f64) -> Result<[f64; 4], EphemerisError> {
    Ok([
        placidus_cusp(ramc, eps, latitude, 1.0 / 3.0, true).map_err(|i| non_convergent(11, i))?,
        placidus_cusp(ramc, eps, latitude, 2.0 / 3.0, true).map_err(|i| non_convergent(12, i))?,
        placidus_cusp(ramc, eps, latitude, 2.0 / 3.0, false).map_err(|i| non_convergent(2, i))?,
        placidus_cusp(ramc, eps, latitude, 1.0 / 3.0, false).map_err(|i| non_convergent(3, i))?,
    ])
}

fn non_convergent(house: u8, iterations: usize) -> EphemerisError {
    EphemerisError::NonConvergent {
        system: HouseSystem::Placidus,
        house,
        iterations,
    }
}

/// Solves for the ecliptic point whose right ascension sits `fraction` of its
/// diurnal semi-arc east of the meridian (`diurnal`), or `fraction` of its
/// nocturnal semi-arc west of the lower meridian.
fn placidus_cusp(ramc: f64, eps: f64, latitude: f64, fraction: f64, diurnal: bool) -> Result<f64, usize> {
    let (e, tan_phi) = (eps.to_radians(), latitude.to_radians().tan());
    let right_ascension = |declination: f64| {
        let dsa = (-tan_phi * declination.tan()).clamp(-1.0, 1.0).acos().to_degrees();
        if diurnal {
            ramc + fraction * dsa
        } else {
            ramc + 180.0 - fraction * (180.0 - dsa)
        }
    };

    let mut alpha = right_ascension(0.0);
    for _ in 0..MAX_ITERATIONS {
        let a = alpha.to_radians();
        let lambda = a.sin().atan2(a.cos() * e.cos());
        let declination = (e.sin() * lambda.sin()).asin();
        let next = right_ascension(declination);
        if (next - alpha).abs() < CONVERGENCE_DEG {
            let a = next.to_radians();
            return Ok(wrap_degrees(a.sin().atan2(a.cos() * e.cos()).to_degrees()));
        }
        alpha = next;
    }
    Err(MAX_ITERATIONS)
}
