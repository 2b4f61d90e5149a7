use std::collections::BTreeMap;

use natal_ephemeris::{Body, EphemerisError, HouseCusps, HouseSystem};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::zodiac::{normalize, normalize_degrees, ZodiacSign};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HouseCusp {
    pub house_number: u8,
    pub cusp_degree: f64,
    pub cusp_sign: ZodiacSign,
    pub cusp_degree_in_sign: u8,
    pub cusp_minutes: u8,
}

/// Ascendant or Midheaven.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Angle {
    pub degree: f64,
    pub sign: ZodiacSign,
    pub degree_in_sign: u8,
    pub minutes: u8,
}

impl Angle {
    pub fn from_degree(degree: f64) -> Angle {
        let degree = normalize_degrees(degree);
        let info = normalize(degree);
        Angle {
            degree,
            sign: info.sign,
            degree_in_sign: info.degree_in_sign,
            minutes: info.minutes,
        }
    }
}

/// Everything the house pipeline produces for one set of birth parameters.
/// This is the value stored in the house cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HouseComputationResult {
    pub houses: Vec<HouseCusp>,
    pub ascendant: Angle,
    pub midheaven: Angle,
    pub planet_houses: BTreeMap<String, u8>,
    /// System actually used, Porphyry when Placidus was undefined.
    pub house_system: HouseSystem,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HouseError {
    #[error("house engine unavailable: {0}")]
    Unavailable(String),
    #[error("house calculation failed: {0}")]
    Engine(#[from] EphemerisError),
    #[error("no house contains {body} at {longitude:.4}°")]
    Unassigned { body: Body, longitude: f64 },
    #[error("house computation aborted: {0}")]
    Aborted(String),
}

/// Returns the 1-based house whose interval `[cusps[h], cusps[h + 1])` holds
/// `longitude`. A house whose start cusp is greater than its end cusp spans
/// 0°. The first matching house wins, so a body sitting on a cusp belongs to
/// the house that cusp opens.
pub fn assign_planet_to_house(longitude: f64, cusps: &[f64]) -> Option<u8> {
    let n = cusps.len();
    (0..n)
        .find(|&h| {
            let current = cusps[h];
            let next = cusps[(h + 1) % n];
            if current > next {
                longitude >= current || longitude < next
            } else {
                current <= longitude && longitude < next
            }
        })
        .map(|h| h as u8 + 1)
}

pub fn houses_from_cusps(cusps: &[f64]) -> Vec<HouseCusp> {
    cusps
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let cusp_degree = normalize_degrees(c);
            let info = normalize(cusp_degree);
            HouseCusp {
                house_number: i as u8 + 1,
                cusp_degree,
                cusp_sign: info.sign,
                cusp_degree_in_sign: info.degree_in_sign,
                cusp_minutes: info.minutes,
            }
        })
        .collect()
}

/// Builds the cached house result from raw engine output and body longitudes.
/// Fails if the engine output is incomplete or any body falls outside every
/// house interval.
pub fn compute_result(raw: &HouseCusps, bodies: &[(Body, f64)]) -> Result<HouseComputationResult, HouseError> {
    raw.ensure_complete()?;
    let houses = houses_from_cusps(&raw.cusps);
    let cusps: Vec<f64> = houses.iter().map(|h| h.cusp_degree).collect();

    let mut planet_houses = BTreeMap::new();
    for &(body, longitude) in bodies {
        let longitude = normalize_degrees(longitude);
        let house = assign_planet_to_house(longitude, &cusps).ok_or(HouseError::Unassigned { body, longitude })?;
        planet_houses.insert(body.name().to_string(), house);
    }

    Ok(HouseComputationResult {
        houses,
        ascendant: Angle::from_degree(raw.ascendant),
        midheaven: Angle::from_degree(raw.midheaven),
        planet_houses,
        house_system: raw.system,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn seam_cusps() -> Vec<f64> {
        vec![200.0, 230.0, 260.0, 290.0, 320.0, 350.0, 10.0, 50.0, 80.0, 110.0, 140.0, 170.0]
    }

    #[test]
    fn wrap_around_house() {
        let cusps = seam_cusps();
        assert_eq!(assign_planet_to_house(355.0, &cusps), Some(6));
        assert_eq!(assign_planet_to_house(5.0, &cusps), Some(6));
        assert_eq!(assign_planet_to_house(20.0, &cusps), Some(7));
    }

    #[test]
    fn cusp_belongs_to_house_it_opens() {
        let cusps = seam_cusps();
        assert_eq!(assign_planet_to_house(350.0, &cusps), Some(6));
        assert_eq!(assign_planet_to_house(10.0, &cusps), Some(7));
        assert_eq!(assign_planet_to_house(200.0, &cusps), Some(1));
        assert_eq!(assign_planet_to_house(0.0, &cusps), Some(6));
    }

    #[test]
    fn equal_houses_from_aries() {
        let cusps: Vec<f64> = (0..12).map(|i| i as f64 * 30.0).collect();
        assert_eq!(assign_planet_to_house(0.0, &cusps), Some(1));
        assert_eq!(assign_planet_to_house(45.0, &cusps), Some(2));
        assert_eq!(assign_planet_to_house(359.9, &cusps), Some(12));
    }

    #[test]
    fn degenerate_cusps_leave_gap() {
        let cusps = vec![10.0; 12];
        assert_eq!(assign_planet_to_house(100.0, &cusps), None);
    }

    #[test]
    fn house_numbers_in_order() {
        let houses = houses_from_cusps(&seam_cusps());
        let numbers: Vec<u8> = houses.iter().map(|h| h.house_number).collect();
        assert_eq!(numbers, (1..=12).collect::<Vec<u8>>());
        assert_eq!(houses[5].cusp_sign, ZodiacSign::Pisces);
        assert_eq!(houses[5].cusp_degree_in_sign, 20);
        assert_eq!(houses[6].cusp_sign, ZodiacSign::Aries);
    }

    #[test]
    fn angles_are_normalized() {
        let asc = Angle::from_degree(-30.5);
        assert_relative_eq!(asc.degree, 329.5);
        assert_eq!(asc.sign, ZodiacSign::Aquarius);
        assert_eq!(asc.degree_in_sign, 29);
        assert_eq!(asc.minutes, 30);
    }

    #[test]
    fn result_maps_every_body() {
        let raw = HouseCusps {
            cusps: seam_cusps(),
            ascendant: 200.0,
            midheaven: 110.0,
            system: HouseSystem::Placidus,
        };
        let bodies = [(Body::Sun, 355.0), (Body::Moon, 725.0), (Body::Mars, 20.0)];
        let result = compute_result(&raw, &bodies).unwrap();
        assert_eq!(result.planet_houses["sun"], 6);
        assert_eq!(result.planet_houses["moon"], 6);
        assert_eq!(result.planet_houses["mars"], 7);
        assert_eq!(result.houses.len(), 12);
        assert_eq!(result.ascendant.sign, ZodiacSign::Libra);
    }

    #[test]
    fn unassigned_body_fails_block() {
        let raw = HouseCusps {
            cusps: vec![10.0; 12],
            ascendant: 10.0,
            midheaven: 280.0,
            system: HouseSystem::Placidus,
        };
        let err = compute_result(&raw, &[(Body::Venus, 100.0)]).unwrap_err();
        assert!(matches!(err, HouseError::Unassigned { body: Body::Venus, .. }));
        assert!(err.to_string().contains("venus"));
    }

    #[test]
    fn incomplete_engine_output_fails() {
        let raw = HouseCusps {
            cusps: vec![0.0; 11],
            ascendant: 0.0,
            midheaven: 0.0,
            system: HouseSystem::Placidus,
        };
        assert!(matches!(compute_result(&raw, &[]), Err(HouseError::Engine(_))));
    }
}
