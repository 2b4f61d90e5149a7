//! Calendar and sidereal time conversions.

use crate::engine::{Calendar, JulianDay};

/// Julian Day of the J2000.0 epoch.
pub const J2000: JulianDay = 2_451_545.0;

const DAYS_PER_CENTURY: f64 = 36_525.0;

/// Julian Day for a calendar date, `hour` being decimal UT hours.
///
/// Standard astronomical algorithm (Meeus ch. 7): January and February count
/// as months 13 and 14 of the previous year, and the Gregorian correction is
/// skipped for the Julian calendar.
pub fn julian_day(year: i32, month: u32, day: u32, hour: f64, calendar: Calendar) -> JulianDay {
    let (mut y, mut m) = (year as f64, month as f64);
    if month <= 2 {
        y -= 1.0;
        m += 12.0;
    }
    let b = match calendar {
        Calendar::Gregorian => {
            let a = (y / 100.0).floor();
            2.0 - a + (a / 4.0).floor()
        }
        Calendar::Julian => 0.0,
    };
    (365.25 * (y + 4716.0)).floor() + (30.6001 * (m + 1.0)).floor() + day as f64 + b - 1524.5 + hour / 24.0
}

/// Julian centuries since J2000.0.
pub fn julian_centuries(jd: JulianDay) -> f64 {
    (jd - J2000) / DAYS_PER_CENTURY
}

/// Greenwich mean sidereal time in degrees, from the Earth Rotation Angle
/// plus the IERS 2003 polynomial.
pub fn gmst_degrees(jd: JulianDay) -> f64 {
    let du = jd - J2000;
    let era = 360.0 * (0.779_057_273_264_0 + 1.002_737_811_911_354_48 * du);

    let t = julian_centuries(jd);
    let t2 = t * t;
    let t3 = t2 * t;
    let t4 = t3 * t;
    let t5 = t4 * t;
    let poly_arcsec = 0.014506 + 4612.156534 * t + 1.3915817 * t2 - 0.00000044 * t3 - 0.000029956 * t4
        - 0.0000000368 * t5;

    wrap_degrees(era + poly_arcsec / 3600.0)
}

/// Local sidereal time in degrees for an east-positive longitude.
pub fn local_sidereal_degrees(jd: JulianDay, east_longitude: f64) -> f64 {
    wrap_degrees(gmst_degrees(jd) + east_longitude)
}

/// Mean obliquity of the ecliptic in degrees.
pub fn mean_obliquity_degrees(jd: JulianDay) -> f64 {
    let t = julian_centuries(jd);
    23.439_291 - 0.013_004_2 * t
}

pub(crate) fn wrap_degrees(x: f64) -> f64 {
    let r = x.rem_euclid(360.0);
    if r >= 360.0 {
        0.0
    } else {
        r
    }
}
