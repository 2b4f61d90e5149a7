use chrono::{NaiveDate, NaiveTime};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::time::BirthParameters;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Missing required event properties")]
    MissingProperties,
    #[error("Birth time is required for house calculations")]
    MissingBirthTime,
    #[error("latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("longitude {0} is outside [-180, 180]")]
    LongitudeOutOfRange(f64),
    #[error("unknown time zone {0:?}")]
    UnknownTimeZone(String),
    #[error("birth date {0:?} is not YYYY-MM-DD")]
    InvalidDate(String),
    #[error("birth time {0:?} is not HH:MM or HH:MM:SS")]
    InvalidTime(String),
}

/// Chart request as received from the intake side. Everything is optional
/// here so that missing fields surface as validation errors rather than
/// deserialization failures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartRequest {
    #[serde(alias = "userId")]
    pub subject_id: Option<String>,
    pub birth_date: Option<String>,
    pub birth_time: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub iana_time_zone: Option<String>,
}

impl ChartRequest {
    /// Returns the subject id and validated birth parameters.
    pub fn validate(&self) -> Result<(String, BirthParameters), ValidationError> {
        let (Some(subject_id), Some(date), Some(latitude), Some(longitude), Some(zone)) = (
            non_blank(&self.subject_id),
            non_blank(&self.birth_date),
            self.latitude,
            self.longitude,
            non_blank(&self.iana_time_zone),
        ) else {
            return Err(ValidationError::MissingProperties);
        };
        let time = non_blank(&self.birth_time).ok_or(ValidationError::MissingBirthTime)?;

        if !(-90.0..=90.0).contains(&latitude) {
            return Err(ValidationError::LatitudeOutOfRange(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(ValidationError::LongitudeOutOfRange(longitude));
        }
        let time_zone: Tz = zone
            .parse()
            .map_err(|_| ValidationError::UnknownTimeZone(zone.to_string()))?;
        let birth_date =
            NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| ValidationError::InvalidDate(date.to_string()))?;
        let birth_time = parse_time(time)?;

        Ok((
            subject_id.to_string(),
            BirthParameters {
                birth_date,
                birth_time,
                latitude,
                longitude,
                time_zone,
            },
        ))
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_time(time: &str) -> Result<NaiveTime, ValidationError> {
    NaiveTime::parse_from_str(time, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M"))
        .map_err(|_| ValidationError::InvalidTime(time.to_string()))
}
