use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use natal_ephemeris::{julian, Calendar, Ephemeris, JulianDay};
use serde::{Deserialize, Serialize};

/// Validated birth data. Together with the algorithm version it identifies one
/// house computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BirthParameters {
    pub birth_date: NaiveDate,
    pub birth_time: NaiveTime,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "ianaTimeZone")]
    pub time_zone: Tz,
}

impl BirthParameters {
    pub fn local_datetime(&self) -> NaiveDateTime {
        self.birth_date.and_time(self.birth_time)
    }

    /// The birth instant in UTC. A repeated local time resolves to the earlier
    /// instant; a skipped one is moved forward by the length of the gap.
    pub fn utc_datetime(&self) -> DateTime<Utc> {
        local_to_utc(self.time_zone, self.local_datetime())
    }

    pub fn julian_day(&self) -> JulianDay {
        to_julian_day(&self.utc_datetime())
    }

    /// Julian Day of the birth instant as the given ephemeris computes it.
    pub fn julian_day_with(&self, ephemeris: &Ephemeris) -> JulianDay {
        let utc = self.utc_datetime();
        ephemeris.julian_day(utc.year(), utc.month(), utc.day(), fractional_hour(&utc), Calendar::Gregorian)
    }
}

pub fn local_to_utc(tz: Tz, local: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            // use the offset in force before the transition
            let before = tz.offset_from_utc_datetime(&(local - Duration::days(1))).fix();
            let utc = local - Duration::seconds(before.local_minus_utc() as i64);
            Utc.from_utc_datetime(&utc)
        }
    }
}

/// Julian Day (UT) for a UTC instant, Gregorian calendar.
pub fn to_julian_day(utc: &DateTime<Utc>) -> JulianDay {
    julian::julian_day(utc.year(), utc.month(), utc.day(), fractional_hour(utc), Calendar::Gregorian)
}

fn fractional_hour(utc: &DateTime<Utc>) -> f64 {
    utc.hour() as f64 + utc.minute() as f64 / 60.0 + (utc.second() as f64 + utc.nanosecond() as f64 / 1e9) / 3600.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn params(date: &str, time: &str, tz: Tz) -> BirthParameters {
        BirthParameters {
            birth_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            birth_time: NaiveTime::parse_from_str(time, "%H:%M:%S").unwrap(),
            latitude: 0.0,
            longitude: 0.0,
            time_zone: tz,
        }
    }

    #[test]
    fn utc_noon_is_j2000() {
        let p = params("2000-01-01", "12:00:00", Tz::UTC);
        assert_relative_eq!(p.julian_day(), 2_451_545.0);
    }

    #[test]
    fn applies_zone_offset() {
        let p = params("1990-01-01", "12:00:00", chrono_tz::America::Los_Angeles);
        assert_eq!(p.utc_datetime().to_rfc3339(), "1990-01-01T20:00:00+00:00");
        let expected = to_julian_day(&Utc.with_ymd_and_hms(1990, 1, 1, 20, 0, 0).unwrap());
        assert_relative_eq!(p.julian_day(), expected);
    }

    #[test]
    fn ambiguous_time_takes_earlier_instant() {
        // 01:30 happens twice on 2021-11-07 in New York
        let p = params("2021-11-07", "01:30:00", chrono_tz::America::New_York);
        assert_eq!(p.utc_datetime().to_rfc3339(), "2021-11-07T05:30:00+00:00");
    }

    #[test]
    fn skipped_time_moves_forward() {
        // 02:30 does not exist on 2021-03-14 in New York
        let p = params("2021-03-14", "02:30:00", chrono_tz::America::New_York);
        assert_eq!(p.utc_datetime().to_rfc3339(), "2021-03-14T07:30:00+00:00");
    }

    #[test]
    fn seconds_contribute_to_fraction() {
        let a = to_julian_day(&Utc.with_ymd_and_hms(1879, 3, 14, 10, 30, 0).unwrap());
        let b = to_julian_day(&Utc.with_ymd_and_hms(1879, 3, 14, 10, 30, 36).unwrap());
        assert_relative_eq!(a, 2_407_422.9375, epsilon = 1e-9);
        assert_relative_eq!(b - a, 36.0 / 86_400.0, epsilon = 1e-9);
    }

    #[test]
    fn ephemeris_julian_day_matches_builtin() {
        let p = params("1990-01-01", "12:00:00", chrono_tz::America::Los_Angeles);
        let eph = Ephemeris::available(natal_ephemeris::AnalyticEngine::new());
        assert_relative_eq!(p.julian_day_with(&eph), p.julian_day());
        assert_relative_eq!(p.julian_day_with(&Ephemeris::unavailable("none")), p.julian_day());
    }

    #[test]
    fn serializes_zone_name() {
        let p = params("1990-01-01", "12:00:00", chrono_tz::America::Los_Angeles);
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["birthDate"], "1990-01-01");
        assert_eq!(json["birthTime"], "12:00:00");
        assert_eq!(json["ianaTimeZone"], "America/Los_Angeles");
    }
}
