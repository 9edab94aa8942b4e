use chrono::{DateTime, Utc};

use crate::predict::error::PredictError;
use crate::predict::types::{Body, LookAngle, Observer, PassEvent, Satellite, SubPoint, SunPoint};

/// Orbit geometry capability consumed by the tracking engine.
///
/// Implementations must be cheap to share across threads: the tracking loop
/// calls the per-tick methods, and pass-prediction workers call
/// [`find_events`](TrajectoryProvider::find_events) concurrently.
pub trait TrajectoryProvider: Send + Sync {
    fn look_angle(
        &self,
        observer: &Observer,
        satellite: &Satellite,
        time: DateTime<Utc>,
    ) -> Result<LookAngle, PredictError>;

    fn sub_point(&self, satellite: &Satellite, time: DateTime<Utc>)
        -> Result<SubPoint, PredictError>;

    /// For a satellite: outside Earth's shadow. For an observer: the sun is
    /// above civil twilight.
    fn is_sunlit(&self, body: Body<'_>, time: DateTime<Utc>) -> Result<bool, PredictError>;

    fn sun_subpoint(&self, time: DateTime<Utc>) -> SunPoint;

    /// Rise, culmination and set events in `[start, end]`, ordered by time.
    fn find_events(
        &self,
        observer: &Observer,
        satellite: &Satellite,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        min_elevation_deg: f64,
    ) -> Result<Vec<PassEvent>, PredictError>;
}
