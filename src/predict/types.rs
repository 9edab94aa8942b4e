use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sgp4::{Constants, Elements};
use strum_macros::Display;

use crate::predict::error::PredictError;

pub const WGS84_A_KM: f64 = 6378.137;
pub const WGS84_E2: f64 = 0.006_694_379_990_14;
const EARTH_MU_KM3_S2: f64 = 398_600.4418;

/// Observer location on the WGS-84 ellipsoid. Fixed for a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Observer {
    pub lat_deg: f64,
    pub lon_deg: f64,
    pub alt_km: f64,
}

impl Observer {
    pub fn new(lat_deg: f64, lon_deg: f64, alt_km: f64) -> Self {
        Self {
            lat_deg,
            lon_deg,
            alt_km,
        }
    }

    pub fn lat_rad(&self) -> f64 {
        self.lat_deg.to_radians()
    }

    pub fn lon_rad(&self) -> f64 {
        self.lon_deg.to_radians()
    }

    pub fn position_ecef_km(&self) -> [f64; 3] {
        let lat = self.lat_rad();
        let lon = self.lon_rad();
        let sin_lat = lat.sin();
        let cos_lat = lat.cos();
        let n = WGS84_A_KM / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
        [
            (n + self.alt_km) * cos_lat * lon.cos(),
            (n + self.alt_km) * cos_lat * lon.sin(),
            (n * (1.0 - WGS84_E2) + self.alt_km) * sin_lat,
        ]
    }
}

/// Parsed SGP4 elements plus the propagator constants derived from them.
///
/// Opaque to the tracking engine: only a [`TrajectoryProvider`] looks inside.
///
/// [`TrajectoryProvider`]: crate::predict::TrajectoryProvider
pub struct OrbitalElements {
    elements: Elements,
    constants: Constants,
}

impl OrbitalElements {
    pub fn from_tle(name: Option<String>, line1: &str, line2: &str) -> Result<Self, PredictError> {
        let elements = Elements::from_tle(name, line1.as_bytes(), line2.as_bytes())?;
        let constants = Constants::from_elements(&elements)?;
        Ok(Self {
            elements,
            constants,
        })
    }

    pub fn elements(&self) -> &Elements {
        &self.elements
    }

    pub fn constants(&self) -> &Constants {
        &self.constants
    }

    pub fn norad_id(&self) -> u32 {
        self.elements.norad_id as u32
    }

    /// Apogee altitude above the equatorial radius, from mean motion and eccentricity.
    pub fn apogee_km(&self) -> f64 {
        let n_rad_s = self.elements.mean_motion * std::f64::consts::TAU / 86_400.0;
        let semi_major = (EARTH_MU_KM3_S2 / (n_rad_s * n_rad_s)).cbrt();
        semi_major * (1.0 + self.elements.eccentricity) - WGS84_A_KM
    }
}

impl fmt::Debug for OrbitalElements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrbitalElements")
            .field("norad_id", &self.elements.norad_id)
            .field("epoch", &self.elements.datetime)
            .finish()
    }
}

/// A tracked object as loaded from the catalog.
#[derive(Debug, Clone)]
pub struct Satellite {
    pub norad_id: u32,
    pub name: String,
    pub elements: Arc<OrbitalElements>,
}

impl Satellite {
    pub fn new(norad_id: u32, name: impl Into<String>, elements: OrbitalElements) -> Self {
        Self {
            norad_id,
            name: name.into(),
            elements: Arc::new(elements),
        }
    }
}

/// Topocentric direction and distance from the observer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LookAngle {
    pub azimuth_deg: f64,
    pub elevation_deg: f64,
    pub range_km: f64,
    /// Positive when receding
    pub range_rate_km_s: f64,
}

/// Geodetic ground projection of a satellite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SubPoint {
    pub lat_deg: f64,
    pub lon_deg: f64,
    pub alt_km: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SunPoint {
    pub lat_deg: f64,
    pub lon_deg: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum EventKind {
    #[strum(serialize = "AOS")]
    Rise,
    #[strum(serialize = "TCA")]
    Culminate,
    #[strum(serialize = "LOS")]
    Set,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassEvent {
    pub time: DateTime<Utc>,
    pub kind: EventKind,
}

impl PassEvent {
    pub fn new(time: DateTime<Utc>, kind: EventKind) -> Self {
        Self { time, kind }
    }
}

/// Something whose illumination can be queried.
#[derive(Debug, Clone, Copy)]
pub enum Body<'a> {
    Satellite(&'a Satellite),
    Observer(&'a Observer),
}
