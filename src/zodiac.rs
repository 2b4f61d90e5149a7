use std::fmt;

use serde::{Deserialize, Serialize};

const ARCMIN_PER_SIGN: i64 = 30 * 60;
const ARCMIN_PER_CIRCLE: i64 = 360 * 60;
const ARCSEC_PER_CIRCLE: i64 = 360 * 3600;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ZodiacSign {
    Aries = 0,
    Taurus,
    Gemini,
    Cancer,
    Leo,
    Virgo,
    Libra,
    Scorpio,
    Sagittarius,
    Capricorn,
    Aquarius,
    Pisces,
}

impl ZodiacSign {
    pub const ALL: [ZodiacSign; 12] = [
        ZodiacSign::Aries,
        ZodiacSign::Taurus,
        ZodiacSign::Gemini,
        ZodiacSign::Cancer,
        ZodiacSign::Leo,
        ZodiacSign::Virgo,
        ZodiacSign::Libra,
        ZodiacSign::Scorpio,
        ZodiacSign::Sagittarius,
        ZodiacSign::Capricorn,
        ZodiacSign::Aquarius,
        ZodiacSign::Pisces,
    ];
}

impl fmt::Display for ZodiacSign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ZodiacSign::Aries => "Aries",
            ZodiacSign::Taurus => "Taurus",
            ZodiacSign::Gemini => "Gemini",
            ZodiacSign::Cancer => "Cancer",
            ZodiacSign::Leo => "Leo",
            ZodiacSign::Virgo => "Virgo",
            ZodiacSign::Libra => "Libra",
            ZodiacSign::Scorpio => "Scorpio",
            ZodiacSign::Sagittarius => "Sagittarius",
            ZodiacSign::Capricorn => "Capricorn",
            ZodiacSign::Aquarius => "Aquarius",
            ZodiacSign::Pisces => "Pisces",
        };
        write!(f, "{}", name)
    }
}

/// Sign, whole degree within the sign, and arc-minutes of an ecliptic longitude.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DegreeInfo {
    pub sign: ZodiacSign,
    pub degree_in_sign: u8,
    pub minutes: u8,
}

/// Maps any real longitude into [0, 360).
pub fn normalize_degrees(degree: f64) -> f64 {
    let r = degree.rem_euclid(360.0);
    // rem_euclid can return exactly 360.0 for tiny negative inputs
    if r >= 360.0 {
        0.0
    } else {
        r
    }
}

/// Decomposes a longitude into sign, degree and minutes.
///
/// The longitude is rounded to whole arc-minutes before it is split, so a
/// value that rounds up to 60' carries into the next degree, and from 29°60'
/// into the next sign: 359.9999° reads as Aries 0°00'. Non-finite input reads
/// as Aries 0°00'.
pub fn normalize(degree: f64) -> DegreeInfo {
    let total = if degree.is_finite() {
        ((normalize_degrees(degree) * 60.0).round() as i64).rem_euclid(ARCMIN_PER_CIRCLE)
    } else {
        0
    };
    DegreeInfo {
        sign: ZodiacSign::ALL[(total / ARCMIN_PER_SIGN) as usize],
        degree_in_sign: ((total % ARCMIN_PER_SIGN) / 60) as u8,
        minutes: (total % 60) as u8,
    }
}

/// 360° display form, e.g. `10°00'00"`.
pub fn format_dms(degree: f64) -> String {
    let total = if degree.is_finite() {
        ((normalize_degrees(degree) * 3600.0).round() as i64).rem_euclid(ARCSEC_PER_CIRCLE)
    } else {
        0
    };
    format!("{}°{:02}'{:02}\"", total / 3600, (total % 3600) / 60, total % 60)
}
