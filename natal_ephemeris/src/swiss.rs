//! Swiss Ephemeris engine, compiled with the `swisseph` feature.

use std::ffi::CString;
use std::os::raw::c_char;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ::swisseph::swe::{calc_ut, houses_ex, julday};
use ::swisseph::{AscMc, Cusp};
use tracing::{debug, warn};

use crate::engine::{
    Body, BodyCoordinates, CalculationError, Calendar, EphemerisEngine, EphemerisError, HouseCusps, HouseSystem,
    JulianDay,
};
use crate::AU_KM;

mod bindings {
    use std::os::raw::c_char;

    extern "C" {
        pub fn swe_set_ephe_path(path: *const c_char);
        pub fn swe_close();
    }
}

const SEFLG_SWIEPH: u32 = 2;

// The C library keeps global state and is not reentrant.
static SWE_LOCK: Mutex<()> = Mutex::new(());

pub struct SwissEphemeris {
    ephe_path: PathBuf,
    c_path: CString,
}

impl SwissEphemeris {
    pub fn new(ephe_path: impl AsRef<Path>) -> Result<Self, EphemerisError> {
        let ephe_path = ephe_path.as_ref().to_path_buf();
        if !ephe_path.is_dir() {
            return Err(EphemerisError::InvalidPath {
                path: ephe_path.display().to_string(),
                message: "directory does not exist".into(),
            });
        }
        let c_path = CString::new(ephe_path.to_string_lossy().as_bytes()).map_err(|e| EphemerisError::InvalidPath {
            path: ephe_path.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(SwissEphemeris { ephe_path, c_path })
    }

    fn ptr(&self) -> *const c_char {
        self.c_path.as_ptr()
    }
}

impl EphemerisEngine for SwissEphemeris {
    fn name(&self) -> &str {
        "swisseph"
    }

    fn version(&self) -> String {
        "2.10".to_string()
    }

    fn open(&self) -> Result<(), EphemerisError> {
        let _guard = SWE_LOCK.lock().map_err(|_| EphemerisError::Unavailable("swisseph lock poisoned".into()))?;
        debug!(path = %self.ephe_path.display(), "setting ephemeris path");
        unsafe { bindings::swe_set_ephe_path(self.ptr()) };
        Ok(())
    }

    fn close(&self) {
        match SWE_LOCK.lock() {
            Ok(_guard) => unsafe { bindings::swe_close() },
            Err(_) => warn!("swisseph lock poisoned, skipping swe_close"),
        }
    }

    fn julian_day(&self, year: i32, month: u32, day: u32, hour: f64, calendar: Calendar) -> JulianDay {
        julday(year, month as i32, day as i32, hour, calendar as i32)
    }

    fn houses(
        &self,
        julian_day: JulianDay,
        latitude: f64,
        longitude: f64,
        system: HouseSystem,
    ) -> Result<HouseCusps, EphemerisError> {
        let _guard = SWE_LOCK.lock().map_err(|_| EphemerisError::Unavailable("swisseph lock poisoned".into()))?;
        let (c, a) = houses_ex(julian_day, 0, latitude, longitude, system.code() as i32);
        let cusp = Cusp::from_array(c);
        let ascmc = AscMc::from_array(a);
        let cusps = vec![
            cusp.first,
            cusp.second,
            cusp.third,
            cusp.fourth,
            cusp.fifth,
            cusp.sixth,
            cusp.seventh,
            cusp.eighth,
            cusp.ninth,
            cusp.tenth,
            cusp.eleventh,
            cusp.twelfth,
        ];
        // swe_houses returns all zeros when it cannot compute the system
        if cusps.iter().all(|c| *c == 0.0) {
            return Err(CalculationError {
                code: -1,
                message: "Error calculating houses".into(),
            }
            .into());
        }
        Ok(HouseCusps {
            cusps: cusps.into_iter().map(|c| c.rem_euclid(360.0)).collect(),
            ascendant: ascmc.ascendant.rem_euclid(360.0),
            midheaven: ascmc.mc.rem_euclid(360.0),
            system,
        })
    }

    fn body_longitude(&self, julian_day: JulianDay, body: Body) -> Result<BodyCoordinates, EphemerisError> {
        let _guard = SWE_LOCK.lock().map_err(|_| EphemerisError::Unavailable("swisseph lock poisoned".into()))?;
        let result = calc_ut(julian_day, body as u32, SEFLG_SWIEPH).map_err(|e| CalculationError {
            code: -1,
            message: format!("Error calculating {}: {}", body, e),
        })?;
        Ok(BodyCoordinates {
            longitude: result.out[0].rem_euclid(360.0),
            latitude: result.out[1],
            distance_km: result.out[2] * AU_KM,
        })
    }
}
