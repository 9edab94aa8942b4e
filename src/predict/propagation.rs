use chrono::{DateTime, Duration, Utc};

use crate::predict::error::PredictError;
use crate::predict::pass_finder::find_passes;
use crate::predict::provider::TrajectoryProvider;
use crate::predict::sun::sun_position_eci_km;
use crate::predict::types::{
    Body, LookAngle, Observer, OrbitalElements, PassEvent, Satellite, SubPoint, SunPoint,
    WGS84_A_KM, WGS84_E2,
};

const CIVIL_TWILIGHT_DEG: f64 = -6.0;
const EARTH_ROTATION_RAD_S: f64 = 7.292_115_146_706_979e-5;
const COARSE_STEP: Duration = Duration::seconds(60);

/// [`TrajectoryProvider`] backed by the `sgp4` crate.
#[derive(Debug, Clone)]
pub struct Sgp4Provider {
    coarse_step: Duration,
}

impl Default for Sgp4Provider {
    fn default() -> Self {
        Self {
            coarse_step: COARSE_STEP,
        }
    }
}

impl TrajectoryProvider for Sgp4Provider {
    fn look_angle(
        &self,
        observer: &Observer,
        satellite: &Satellite,
        time: DateTime<Utc>,
    ) -> Result<LookAngle, PredictError> {
        let prediction = propagate_teme(&satellite.elements, time)?;
        let theta = gmst(time);
        let sat_ecef = teme_to_ecef_position(prediction.position, theta);
        let sat_velocity = teme_to_ecef_velocity(prediction.velocity, sat_ecef, theta);
        Ok(topocentric(observer, sat_ecef, sat_velocity))
    }

    fn sub_point(
        &self,
        satellite: &Satellite,
        time: DateTime<Utc>,
    ) -> Result<SubPoint, PredictError> {
        let position = propagate_teme(&satellite.elements, time)?.position;
        Ok(ecef_to_geodetic(teme_to_ecef_position(position, gmst(time))))
    }

    fn is_sunlit(&self, body: Body<'_>, time: DateTime<Utc>) -> Result<bool, PredictError> {
        let sun = sun_position_eci_km(time);
        match body {
            Body::Satellite(satellite) => {
                let position = propagate_teme(&satellite.elements, time)?.position;
                Ok(outside_umbra(position, sun))
            }
            Body::Observer(observer) => {
                let sun_ecef = teme_to_ecef_position(sun, gmst(time));
                Ok(topocentric(observer, sun_ecef, [0.0; 3]).elevation_deg > CIVIL_TWILIGHT_DEG)
            }
        }
    }

    fn sun_subpoint(&self, time: DateTime<Utc>) -> SunPoint {
        let [x, y, z] = teme_to_ecef_position(sun_position_eci_km(time), gmst(time));
        SunPoint {
            lat_deg: z.atan2(x.hypot(y)).to_degrees(),
            lon_deg: y.atan2(x).to_degrees(),
        }
    }

    fn find_events(
        &self,
        observer: &Observer,
        satellite: &Satellite,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        min_elevation_deg: f64,
    ) -> Result<Vec<PassEvent>, PredictError> {
        find_passes(
            |t| self.look_angle(observer, satellite, t).map(|look| look.elevation_deg),
            start,
            end,
            min_elevation_deg,
            self.coarse_step,
        )
    }
}

fn propagate_teme(
    elements: &OrbitalElements,
    timestamp: DateTime<Utc>,
) -> Result<sgp4::Prediction, PredictError> {
    let minutes = elements
        .elements()
        .datetime_to_minutes_since_epoch(&timestamp.naive_utc())
        .map_err(|e| PredictError::Propagation(e.to_string()))?;
    Ok(elements.constants().propagate(minutes)?)
}

fn gmst(timestamp: DateTime<Utc>) -> f64 {
    sgp4::iau_epoch_to_sidereal_time(sgp4::julian_years_since_j2000(&timestamp.naive_utc()))
}

fn teme_to_ecef_position(pos_teme: [f64; 3], gmst: f64) -> [f64; 3] {
    let cos_gmst = gmst.cos();
    let sin_gmst = gmst.sin();
    [
        pos_teme[0] * cos_gmst + pos_teme[1] * sin_gmst,
        -pos_teme[0] * sin_gmst + pos_teme[1] * cos_gmst,
        pos_teme[2],
    ]
}

/// Rotate a TEME velocity into the Earth-fixed frame, removing the frame's own rotation.
fn teme_to_ecef_velocity(vel_teme: [f64; 3], pos_ecef: [f64; 3], gmst: f64) -> [f64; 3] {
    let [vx, vy, vz] = teme_to_ecef_position(vel_teme, gmst);
    [
        vx + EARTH_ROTATION_RAD_S * pos_ecef[1],
        vy - EARTH_ROTATION_RAD_S * pos_ecef[0],
        vz,
    ]
}

fn ecef_to_enu(dr: [f64; 3], lat_rad: f64, lon_rad: f64) -> (f64, f64, f64) {
    let sin_lat = lat_rad.sin();
    let cos_lat = lat_rad.cos();
    let sin_lon = lon_rad.sin();
    let cos_lon = lon_rad.cos();

    let east = -sin_lon * dr[0] + cos_lon * dr[1];
    let north = -sin_lat * cos_lon * dr[0] - sin_lat * sin_lon * dr[1] + cos_lat * dr[2];
    let up = cos_lat * cos_lon * dr[0] + cos_lat * sin_lon * dr[1] + sin_lat * dr[2];
    (east, north, up)
}

/// Look angle to a target; `target_velocity` is Earth-fixed, km/s.
fn topocentric(
    observer: &Observer,
    target_ecef: [f64; 3],
    target_velocity: [f64; 3],
) -> LookAngle {
    let sta = observer.position_ecef_km();
    let dr = [
        target_ecef[0] - sta[0],
        target_ecef[1] - sta[1],
        target_ecef[2] - sta[2],
    ];
    let range_km = (dr[0] * dr[0] + dr[1] * dr[1] + dr[2] * dr[2]).sqrt();

    let (east, north, up) = ecef_to_enu(dr, observer.lat_rad(), observer.lon_rad());
    let azimuth = east.atan2(north).to_degrees().rem_euclid(360.0);
    let elevation = if range_km > 0.0 {
        (up / range_km).asin().to_degrees()
    } else {
        0.0
    };

    let range_rate_km_s = if range_km > 0.0 {
        (dr[0] * target_velocity[0] + dr[1] * target_velocity[1] + dr[2] * target_velocity[2])
            / range_km
    } else {
        0.0
    };

    LookAngle {
        azimuth_deg: azimuth,
        elevation_deg: elevation,
        range_km,
        range_rate_km_s,
    }
}

fn ecef_to_geodetic([x, y, z]: [f64; 3]) -> SubPoint {
    let lon = y.atan2(x);
    let p = x.hypot(y);
    let mut lat = z.atan2(p * (1.0 - WGS84_E2));
    let mut alt = 0.0;
    for _ in 0..5 {
        let sin_lat = lat.sin();
        let n = WGS84_A_KM / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
        alt = p / lat.cos() - n;
        lat = z.atan2(p * (1.0 - WGS84_E2 * n / (n + alt)));
    }
    SubPoint {
        lat_deg: lat.to_degrees(),
        lon_deg: lon.to_degrees(),
        alt_km: alt,
    }
}

/// Cylindrical-cone shadow test: lit unless behind the Earth within the umbra half-angle.
fn outside_umbra(sat: [f64; 3], sun: [f64; 3]) -> bool {
    let sat_norm = (sat[0] * sat[0] + sat[1] * sat[1] + sat[2] * sat[2]).sqrt();
    let sun_norm = (sun[0] * sun[0] + sun[1] * sun[1] + sun[2] * sun[2]).sqrt();
    if sat_norm <= WGS84_A_KM || sun_norm == 0.0 {
        return false;
    }
    let umbra = (WGS84_A_KM / sat_norm).asin();
    let cos_angle = (sat[0] * sun[0] + sat[1] * sun[1] + sat[2] * sun[2]) / (sat_norm * sun_norm);
    let angle = cos_angle.clamp(-1.0, 1.0).acos();
    angle < std::f64::consts::FRAC_PI_2 || (std::f64::consts::PI - angle) >= umbra
}
