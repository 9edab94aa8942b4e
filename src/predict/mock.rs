//! Scripted [`TrajectoryProvider`] for tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Mutex};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};

use crate::predict::error::PredictError;
use crate::predict::provider::TrajectoryProvider;
use crate::predict::types::{
    Body, EventKind, LookAngle, Observer, OrbitalElements, PassEvent, Satellite, SubPoint,
    SunPoint,
};

pub const ISS_LINE1: &str =
    "1 25544U 98067A   08264.51782528 -.00002182  00000-0 -11606-4 0  2927";
pub const ISS_LINE2: &str =
    "2 25544  51.6416 247.4627 0006703 130.5360 325.0288 15.72125391563537";

pub fn iss_elements() -> OrbitalElements {
    OrbitalElements::from_tle(Some("ISS (ZARYA)".into()), ISS_LINE1, ISS_LINE2)
        .expect("fixture TLE parses")
}

/// A satellite with the given identity. Mock lookups key on `norad_id` only.
pub fn satellite(norad_id: u32, name: &str) -> Satellite {
    Satellite::new(norad_id, name, iss_elements())
}

pub struct MockProvider {
    elevations: Mutex<HashMap<u32, f64>>,
    broken: Mutex<HashSet<u32>>,
    satellite_sunlit: AtomicBool,
    observer_sunlit: AtomicBool,
    fail_events: AtomicBool,
    events: Mutex<Option<Vec<(i64, EventKind)>>>,
    gate: Mutex<Option<mpsc::Receiver<()>>>,
    find_calls: AtomicUsize,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            elevations: Mutex::new(HashMap::new()),
            broken: Mutex::new(HashSet::new()),
            satellite_sunlit: AtomicBool::new(true),
            observer_sunlit: AtomicBool::new(false),
            fail_events: AtomicBool::new(false),
            events: Mutex::new(None),
            gate: Mutex::new(None),
            find_calls: AtomicUsize::new(0),
        }
    }
}

impl MockProvider {
    pub fn with_elevation(self, norad_id: u32, elevation_deg: f64) -> Self {
        self.set_elevation(norad_id, elevation_deg);
        self
    }

    pub fn with_lighting(self, satellite_sunlit: bool, observer_sunlit: bool) -> Self {
        self.satellite_sunlit.store(satellite_sunlit, Ordering::SeqCst);
        self.observer_sunlit.store(observer_sunlit, Ordering::SeqCst);
        self
    }

    /// Events returned by `find_events`, as (minutes after start, kind).
    pub fn with_events(self, events: Vec<(i64, EventKind)>) -> Self {
        *self.events.lock().unwrap() = Some(events);
        self
    }

    pub fn set_elevation(&self, norad_id: u32, elevation_deg: f64) {
        self.elevations
            .lock()
            .unwrap()
            .insert(norad_id, elevation_deg);
    }

    /// Make propagation fail for one satellite.
    pub fn break_satellite(&self, norad_id: u32) {
        self.broken.lock().unwrap().insert(norad_id);
    }

    pub fn fail_events(&self, fail: bool) {
        self.fail_events.store(fail, Ordering::SeqCst);
    }

    /// Block `find_events` until the returned sender fires (or is dropped).
    pub fn gate(&self) -> mpsc::Sender<()> {
        let (tx, rx) = mpsc::channel();
        *self.gate.lock().unwrap() = Some(rx);
        tx
    }

    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    fn check(&self, satellite: &Satellite) -> Result<(), PredictError> {
        if self.broken.lock().unwrap().contains(&satellite.norad_id) {
            return Err(PredictError::Propagation(format!(
                "no solution for {}",
                satellite.norad_id
            )));
        }
        Ok(())
    }
}

impl TrajectoryProvider for MockProvider {
    fn look_angle(
        &self,
        _observer: &Observer,
        satellite: &Satellite,
        _time: DateTime<Utc>,
    ) -> Result<LookAngle, PredictError> {
        self.check(satellite)?;
        let elevation_deg = self
            .elevations
            .lock()
            .unwrap()
            .get(&satellite.norad_id)
            .copied()
            .unwrap_or(0.0);
        Ok(LookAngle {
            azimuth_deg: 180.0,
            elevation_deg,
            range_km: 1000.0,
            range_rate_km_s: -2.5,
        })
    }

    fn sub_point(
        &self,
        satellite: &Satellite,
        time: DateTime<Utc>,
    ) -> Result<SubPoint, PredictError> {
        self.check(satellite)?;
        // Longitude drifts with time so trail samples are distinguishable.
        let minutes = (time.timestamp() / 60 % 360) as f64;
        Ok(SubPoint {
            lat_deg: 10.0,
            lon_deg: minutes - 180.0,
            alt_km: 420.0,
        })
    }

    fn is_sunlit(&self, body: Body<'_>, _time: DateTime<Utc>) -> Result<bool, PredictError> {
        match body {
            Body::Satellite(satellite) => {
                self.check(satellite)?;
                Ok(self.satellite_sunlit.load(Ordering::SeqCst))
            }
            Body::Observer(_) => Ok(self.observer_sunlit.load(Ordering::SeqCst)),
        }
    }

    fn sun_subpoint(&self, _time: DateTime<Utc>) -> SunPoint {
        SunPoint {
            lat_deg: 5.0,
            lon_deg: -30.0,
        }
    }

    fn find_events(
        &self,
        _observer: &Observer,
        satellite: &Satellite,
        start: DateTime<Utc>,
        _end: DateTime<Utc>,
        _min_elevation_deg: f64,
    ) -> Result<Vec<PassEvent>, PredictError> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = self.gate.lock().unwrap().take() {
            let _ = gate.recv_timeout(StdDuration::from_secs(5));
        }
        self.check(satellite)?;
        if self.fail_events.load(Ordering::SeqCst) {
            return Err(PredictError::Propagation("scripted failure".into()));
        }
        let script = self.events.lock().unwrap().clone().unwrap_or_else(|| {
            vec![
                (10, EventKind::Rise),
                (15, EventKind::Culminate),
                (20, EventKind::Set),
            ]
        });
        Ok(script
            .into_iter()
            .map(|(minutes, kind)| PassEvent::new(start + Duration::minutes(minutes), kind))
            .collect())
    }
}
