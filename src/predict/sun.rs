use chrono::{DateTime, Utc};

const AU_KM: f64 = 149_597_870.7;
const J2000_JD: f64 = 2_451_545.0;
const UNIX_EPOCH_JD: f64 = 2_440_587.5;

pub fn julian_date(time: DateTime<Utc>) -> f64 {
    let seconds = time.timestamp() as f64 + f64::from(time.timestamp_subsec_nanos()) * 1e-9;
    UNIX_EPOCH_JD + seconds / 86_400.0
}

/// Low-precision solar position (about 0.01 deg), equatorial frame, km.
pub fn sun_position_eci_km(time: DateTime<Utc>) -> [f64; 3] {
    let n = julian_date(time) - J2000_JD;
    let mean_longitude = (280.460 + 0.985_647_4 * n).rem_euclid(360.0);
    let mean_anomaly = (357.528 + 0.985_600_3 * n).rem_euclid(360.0).to_radians();
    let ecliptic_longitude = (mean_longitude
        + 1.915 * mean_anomaly.sin()
        + 0.020 * (2.0 * mean_anomaly).sin())
    .to_radians();
    let obliquity = (23.439 - 0.000_000_4 * n).to_radians();

    [
        AU_KM * ecliptic_longitude.cos(),
        AU_KM * obliquity.cos() * ecliptic_longitude.sin(),
        AU_KM * obliquity.sin() * ecliptic_longitude.sin(),
    ]
}
