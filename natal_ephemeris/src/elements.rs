//! Low-precision geocentric positions from mean orbital elements.
//!
//! Elements and periodic terms follow Paul Schlyter's "How to compute
//! planetary positions". Accuracy is on the order of an arc-minute for the
//! Sun and a few arc-minutes for the planets, which is enough to place a body
//! in its sign and house. Longitudes are tropical, referred to the equinox of
//! date.

use crate::engine::{Body, BodyCoordinates, BodyPosition, EphemerisError, JulianDay, PositionProvider};
use crate::julian::wrap_degrees;

pub const AU_KM: f64 = 149_597_870.7;
pub const EARTH_RADIUS_KM: f64 = 6_378.14;

/// Day number used by the element polynomials: JD 2451543.5 is 2000 Jan 0.0 UT.
pub fn day_number(jd: JulianDay) -> f64 {
    jd - 2_451_543.5
}

#[derive(Debug, Clone, Copy)]
struct Elements {
    /// longitude of the ascending node
    node: f64,
    inclination: f64,
    /// argument of perihelion
    perihelion: f64,
    semi_major: f64,
    eccentricity: f64,
    mean_anomaly: f64,
}

fn elements(body: Body, d: f64) -> Elements {
    let (node, inclination, perihelion, semi_major, eccentricity, mean_anomaly) = match body {
        Body::Sun => (
            0.0,
            0.0,
            282.9404 + 4.70935e-5 * d,
            1.0,
            0.016709 - 1.151e-9 * d,
            356.0470 + 0.985_600_258_5 * d,
        ),
        Body::Moon => (
            125.1228 - 0.052_953_808_3 * d,
            5.1454,
            318.0634 + 0.164_357_322_3 * d,
            60.2666,
            0.054900,
            115.3654 + 13.064_992_950_9 * d,
        ),
        Body::Mercury => (
            48.3313 + 3.24587e-5 * d,
            7.0047 + 5.00e-8 * d,
            29.1241 + 1.01444e-5 * d,
            0.387098,
            0.205635 + 5.59e-10 * d,
            168.6562 + 4.092_334_436_8 * d,
        ),
        Body::Venus => (
            76.6799 + 2.46590e-5 * d,
            3.3946 + 2.75e-8 * d,
            54.8910 + 1.38374e-5 * d,
            0.723330,
            0.006773 - 1.302e-9 * d,
            48.0052 + 1.602_130_224_4 * d,
        ),
        Body::Mars => (
            49.5574 + 2.11081e-5 * d,
            1.8497 - 1.78e-8 * d,
            286.5016 + 2.92961e-5 * d,
            1.523688,
            0.093405 + 2.516e-9 * d,
            18.6021 + 0.524_020_776_6 * d,
        ),
        Body::Jupiter => (
            100.4542 + 2.76854e-5 * d,
            1.3030 - 1.557e-7 * d,
            273.8777 + 1.64505e-5 * d,
            5.20256,
            0.048498 + 4.469e-9 * d,
            19.8950 + 0.083_085_300_1 * d,
        ),
        Body::Saturn => (
            113.6634 + 2.38980e-5 * d,
            2.4886 - 1.081e-7 * d,
            339.3939 + 2.97661e-5 * d,
            9.55475,
            0.055546 - 9.499e-9 * d,
            316.9670 + 0.033_444_228_2 * d,
        ),
        Body::Uranus => (
            74.0005 + 1.3978e-5 * d,
            0.7733 + 1.9e-8 * d,
            96.6612 + 3.0565e-5 * d,
            19.18171 - 1.55e-8 * d,
            0.047318 + 7.45e-9 * d,
            142.5905 + 0.011_725_806 * d,
        ),
        Body::Neptune => (
            131.7806 + 3.0173e-5 * d,
            1.7700 - 2.55e-7 * d,
            272.8461 - 6.027e-6 * d,
            30.05826 + 3.313e-8 * d,
            0.008606 + 2.15e-9 * d,
            260.2471 + 0.005_995_147 * d,
        ),
        // fitted separately in `pluto`
        Body::Pluto => (0.0, 0.0, 0.0, 0.0, 0.0, 0.0),
    };
    Elements {
        node,
        inclination,
        perihelion,
        semi_major,
        eccentricity,
        mean_anomaly: wrap_degrees(mean_anomaly),
    }
}

fn sin_d(x: f64) -> f64 {
    x.to_radians().sin()
}

fn cos_d(x: f64) -> f64 {
    x.to_radians().cos()
}

/// Solves Kepler's equation, returning the eccentric anomaly in degrees.
fn eccentric_anomaly(mean_anomaly: f64, e: f64) -> f64 {
    let m = mean_anomaly.to_radians();
    let mut ecc = m + e * m.sin() * (1.0 + e * m.cos());
    for _ in 0..50 {
        let delta = (ecc - e * ecc.sin() - m) / (1.0 - e * ecc.cos());
        ecc -= delta;
        if delta.abs() < 1e-12 {
            break;
        }
    }
    ecc.to_degrees()
}

/// True anomaly (degrees) and radius vector (units of `semi_major`).
fn orbit_position(el: &Elements) -> (f64, f64) {
    let e = el.eccentricity;
    let ecc = eccentric_anomaly(el.mean_anomaly, e);
    let xv = el.semi_major * (cos_d(ecc) - e);
    let yv = el.semi_major * (1.0 - e * e).sqrt() * sin_d(ecc);
    (yv.atan2(xv).to_degrees(), xv.hypot(yv))
}

/// Rectangular ecliptic coordinates of the orbiting body around its primary.
fn ecliptic_rect(el: &Elements) -> [f64; 3] {
    let (v, r) = orbit_position(el);
    let u = v + el.perihelion;
    let (sn, cn) = (sin_d(el.node), cos_d(el.node));
    let (su, cu) = (sin_d(u), cos_d(u));
    let ci = cos_d(el.inclination);
    [
        r * (cn * cu - sn * su * ci),
        r * (sn * cu + cn * su * ci),
        r * su * sin_d(el.inclination),
    ]
}

fn spherical(rect: [f64; 3]) -> (f64, f64, f64) {
    let [x, y, z] = rect;
    let lon = wrap_degrees(y.atan2(x).to_degrees());
    let lat = z.atan2(x.hypot(y)).to_degrees();
    (lon, lat, (x * x + y * y + z * z).sqrt())
}

fn rect(lon: f64, lat: f64, r: f64) -> [f64; 3] {
    [r * cos_d(lon) * cos_d(lat), r * sin_d(lon) * cos_d(lat), r * sin_d(lat)]
}

/// Geocentric rectangular position of the Sun in AU.
fn sun_rect(d: f64) -> [f64; 3] {
    let el = elements(Body::Sun, d);
    let (v, r) = orbit_position(&el);
    let lon = v + el.perihelion;
    [r * cos_d(lon), r * sin_d(lon), 0.0]
}

fn moon(d: f64) -> BodyCoordinates {
    let el = elements(Body::Moon, d);
    let (lon, lat, r) = spherical(ecliptic_rect(&el));

    let sun = elements(Body::Sun, d);
    let ms = sun.mean_anomaly;
    let mm = el.mean_anomaly;
    let ls = ms + sun.perihelion;
    let lm = mm + el.perihelion + el.node;
    let dd = lm - ls;
    let f = lm - el.node;

    let dlon = -1.274 * sin_d(mm - 2.0 * dd) + 0.658 * sin_d(2.0 * dd) - 0.186 * sin_d(ms)
        - 0.059 * sin_d(2.0 * mm - 2.0 * dd)
        - 0.057 * sin_d(mm - 2.0 * dd + ms)
        + 0.053 * sin_d(mm + 2.0 * dd)
        + 0.046 * sin_d(2.0 * dd - ms)
        + 0.041 * sin_d(mm - ms)
        - 0.035 * sin_d(dd)
        - 0.031 * sin_d(mm + ms)
        - 0.015 * sin_d(2.0 * f - 2.0 * dd)
        + 0.011 * sin_d(mm - 4.0 * dd);
    let dlat = -0.173 * sin_d(f - 2.0 * dd) - 0.055 * sin_d(mm - f - 2.0 * dd) - 0.046 * sin_d(mm + f - 2.0 * dd)
        + 0.033 * sin_d(f + 2.0 * dd)
        + 0.017 * sin_d(2.0 * mm + f);
    let dr = -0.58 * cos_d(mm - 2.0 * dd) - 0.46 * cos_d(2.0 * dd);

    BodyCoordinates {
        longitude: wrap_degrees(lon + dlon),
        latitude: lat + dlat,
        distance_km: (r + dr) * EARTH_RADIUS_KM,
    }
}

/// Heliocentric longitude, latitude and distance (AU) of Pluto, J2000 fit.
fn pluto_heliocentric(d: f64) -> (f64, f64, f64) {
    let s = 50.03 + 0.033_459_652 * d;
    let p = 238.95 + 0.003_968_789 * d;

    let lon = 238.9508 + 0.004_007_03 * d - 19.799 * sin_d(p) + 19.848 * cos_d(p) + 0.897 * sin_d(2.0 * p)
        - 4.956 * cos_d(2.0 * p)
        + 0.610 * sin_d(3.0 * p)
        + 1.211 * cos_d(3.0 * p)
        - 0.341 * sin_d(4.0 * p)
        - 0.190 * cos_d(4.0 * p)
        + 0.128 * sin_d(5.0 * p)
        - 0.034 * cos_d(5.0 * p)
        - 0.038 * sin_d(6.0 * p)
        + 0.031 * cos_d(6.0 * p)
        + 0.020 * sin_d(s - p)
        - 0.010 * cos_d(s - p);
    let lat = -3.9082 - 5.453 * sin_d(p) - 14.975 * cos_d(p) + 3.527 * sin_d(2.0 * p) + 1.673 * cos_d(2.0 * p)
        - 1.051 * sin_d(3.0 * p)
        + 0.328 * cos_d(3.0 * p)
        + 0.179 * sin_d(4.0 * p)
        - 0.292 * cos_d(4.0 * p)
        + 0.019 * sin_d(5.0 * p)
        + 0.100 * cos_d(5.0 * p)
        - 0.031 * sin_d(6.0 * p)
        - 0.026 * cos_d(6.0 * p)
        + 0.011 * cos_d(s - p);
    let r = 40.72 + 6.68 * sin_d(p) + 6.90 * cos_d(p) - 1.18 * sin_d(2.0 * p) - 0.03 * cos_d(2.0 * p)
        + 0.15 * sin_d(3.0 * p)
        - 0.14 * cos_d(3.0 * p);

    // J2000 to equinox of date
    (lon + 3.823_94e-5 * d, lat, r)
}

/// Heliocentric longitude, latitude and distance (AU) of a major planet,
/// including the mutual Jupiter/Saturn/Uranus terms.
fn planet_heliocentric(body: Body, d: f64) -> (f64, f64, f64) {
    let (mut lon, mut lat, r) = spherical(ecliptic_rect(&elements(body, d)));

    let mj = elements(Body::Jupiter, d).mean_anomaly;
    let ms = elements(Body::Saturn, d).mean_anomaly;
    let mu = elements(Body::Uranus, d).mean_anomaly;
    match body {
        Body::Jupiter => {
            lon += -0.332 * sin_d(2.0 * mj - 5.0 * ms - 67.6) - 0.056 * sin_d(2.0 * mj - 2.0 * ms + 21.0)
                + 0.042 * sin_d(3.0 * mj - 5.0 * ms + 21.0)
                - 0.036 * sin_d(mj - 2.0 * ms)
                + 0.022 * cos_d(mj - ms)
                + 0.023 * sin_d(2.0 * mj - 3.0 * ms + 52.0)
                - 0.016 * sin_d(mj - 5.0 * ms - 69.0);
        }
        Body::Saturn => {
            lon += 0.812 * sin_d(2.0 * mj - 5.0 * ms - 67.6) - 0.229 * cos_d(2.0 * mj - 4.0 * ms - 2.0)
                + 0.119 * sin_d(mj - 2.0 * ms - 3.0)
                + 0.046 * sin_d(2.0 * mj - 6.0 * ms - 69.0)
                + 0.014 * sin_d(mj - 3.0 * ms + 32.0);
            lat += -0.020 * cos_d(2.0 * mj - 4.0 * ms - 2.0) + 0.018 * sin_d(2.0 * mj - 6.0 * ms - 49.0);
        }
        Body::Uranus => {
            lon += 0.040 * sin_d(ms - 2.0 * mu + 6.0) + 0.035 * sin_d(ms - 3.0 * mu + 33.0)
                - 0.015 * sin_d(mj - mu + 20.0);
        }
        _ => {}
    }
    (lon, lat, r)
}

/// Geocentric ecliptic position of `body` at `jd` (UT).
pub fn geocentric(body: Body, jd: JulianDay) -> BodyCoordinates {
    let d = day_number(jd);
    let sun = sun_rect(d);
    let (lon, lat, r) = match body {
        Body::Sun => spherical(sun),
        Body::Moon => return moon(d),
        Body::Pluto => {
            let (l, b, r) = pluto_heliocentric(d);
            helio_to_geo(rect(l, b, r), sun)
        }
        _ => {
            let (l, b, r) = planet_heliocentric(body, d);
            helio_to_geo(rect(l, b, r), sun)
        }
    };
    BodyCoordinates {
        longitude: lon,
        latitude: lat,
        distance_km: r * AU_KM,
    }
}

fn helio_to_geo(helio: [f64; 3], sun: [f64; 3]) -> (f64, f64, f64) {
    spherical([helio[0] + sun[0], helio[1] + sun[1], helio[2] + sun[2]])
}

/// Planet positions for all ten chart bodies from the element model.
#[derive(Debug, Default, Clone, Copy)]
pub struct ElementsProvider;

impl PositionProvider for ElementsProvider {
    fn name(&self) -> &str {
        "orbital-elements"
    }

    fn positions(&self, julian_day: JulianDay) -> Result<Vec<BodyPosition>, EphemerisError> {
        if !julian_day.is_finite() {
            return Err(EphemerisError::Unavailable(format!("invalid julian day {}", julian_day)));
        }
        Ok(Body::iter()
            .map(|body| BodyPosition {
                body,
                coordinates: geocentric(body, julian_day),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::julian::{julian_day, J2000};
    use crate::Calendar;
    use approx::assert_relative_eq;

    #[test]
    fn sun_at_j2000() {
        let sun = geocentric(Body::Sun, J2000);
        assert_relative_eq!(sun.longitude, 280.38, epsilon = 0.1);
        assert_relative_eq!(sun.latitude, 0.0, epsilon = 1e-9);
        assert_relative_eq!(sun.distance_km / AU_KM, 0.9833, epsilon = 0.001);
    }

    #[test]
    fn sun_in_pisces_march_1879() {
        let jd = julian_day(1879, 3, 14, 10.5, Calendar::Gregorian);
        let sun = geocentric(Body::Sun, jd);
        assert!(sun.longitude >= 330.0 && sun.longitude < 360.0, "sun at {}", sun.longitude);
    }

    #[test]
    fn moon_distance_is_lunar() {
        for offset in [0.0, 7.3, 14.1, 21.9] {
            let moon = geocentric(Body::Moon, J2000 + offset);
            assert!(moon.distance_km > 350_000.0 && moon.distance_km < 410_000.0);
            assert!(moon.latitude.abs() < 5.5);
        }
    }

    #[test]
    fn slow_planets_at_j2000() {
        assert_relative_eq!(geocentric(Body::Jupiter, J2000).longitude, 25.2, epsilon = 1.5);
        assert_relative_eq!(geocentric(Body::Saturn, J2000).longitude, 40.4, epsilon = 1.5);
        assert_relative_eq!(geocentric(Body::Pluto, J2000).longitude, 251.4, epsilon = 1.5);
    }

    #[test]
    fn inner_planets_stay_near_the_sun() {
        let sun = geocentric(Body::Sun, J2000).longitude;
        for (body, max_elongation) in [(Body::Mercury, 28.5), (Body::Venus, 47.5)] {
            let lon = geocentric(body, J2000).longitude;
            let diff = (lon - sun + 540.0).rem_euclid(360.0) - 180.0;
            assert!(diff.abs() <= max_elongation, "{} elongation {}", body, diff);
        }
    }

    #[test]
    fn provider_returns_every_body() {
        let positions = ElementsProvider.positions(J2000).unwrap();
        assert_eq!(positions.len(), 10);
        for p in &positions {
            assert!((0.0..360.0).contains(&p.coordinates.longitude));
            assert!(p.coordinates.distance_km > 0.0);
        }
        assert!(ElementsProvider.positions(f64::NAN).is_err());
    }
}
