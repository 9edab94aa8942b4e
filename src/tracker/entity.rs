use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use utoipa::ToSchema;

use crate::predict::{
    Body, LookAngle, Observer, PredictError, Satellite, SubPoint, TrajectoryProvider,
};

use super::schedule::{NextEvent, ScheduleSlot};

/// Optical visibility class of a solved entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    #[strum(serialize = "ECL")]
    Eclipsed,
    #[strum(serialize = "VIS")]
    SunlitVisible,
    #[strum(serialize = "DAY")]
    Daylit,
}

pub fn classify(satellite_sunlit: bool, observer_sunlit: bool) -> Visibility {
    match (satellite_sunlit, observer_sunlit) {
        (false, _) => Visibility::Eclipsed,
        (true, false) => Visibility::SunlitVisible,
        (true, true) => Visibility::Daylit,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Fix {
    NoSolution {
        reason: String,
    },
    Solved {
        look: LookAngle,
        subpoint: SubPoint,
        visibility: Visibility,
    },
}

impl Fix {
    pub fn elevation(&self) -> Option<f64> {
        match self {
            Fix::Solved { look, .. } => Some(look.elevation_deg),
            Fix::NoSolution { .. } => None,
        }
    }

    pub fn visibility(&self) -> Option<Visibility> {
        match self {
            Fix::Solved { visibility, .. } => Some(*visibility),
            Fix::NoSolution { .. } => None,
        }
    }
}

/// Ground-track window sampled around the current time.
#[derive(Debug, Clone, Copy)]
pub struct TrailConfig {
    pub window: Duration,
    pub step: Duration,
}

impl TrailConfig {
    #[cfg(test)]
    pub fn disabled() -> Self {
        Self {
            window: Duration::zero(),
            step: Duration::seconds(60),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.window > Duration::zero() && self.step > Duration::zero()
    }
}

/// Values shared by every entity refresh within one tick.
#[derive(Debug, Clone, Copy)]
pub struct TickContext {
    pub now: DateTime<Utc>,
    /// `None` when the observer lighting could not be computed.
    pub observer_sunlit: Option<bool>,
}

#[derive(Debug)]
pub struct EntityState {
    pub satellite: Satellite,
    pub fix: Fix,
    pub trail: Vec<(f64, f64)>,
    pub schedule: Arc<ScheduleSlot>,
    pub next_event: NextEvent,
}

impl EntityState {
    pub fn new(satellite: Satellite) -> Self {
        Self {
            satellite,
            fix: Fix::NoSolution {
                reason: "not sampled yet".into(),
            },
            trail: Vec::new(),
            schedule: Arc::new(ScheduleSlot::default()),
            next_event: NextEvent::Calculating,
        }
    }

    /// Recompute geometry, visibility and trail for `ctx.now`.
    ///
    /// A provider failure replaces the previous fix with `NoSolution`.
    pub fn refresh(
        &mut self,
        provider: &dyn TrajectoryProvider,
        observer: &Observer,
        ctx: &TickContext,
        trail: &TrailConfig,
    ) {
        self.fix = match self.solve(provider, observer, ctx) {
            Ok(fix) => fix,
            Err(e) => {
                log::debug!("No solution for {}: {}", self.satellite.norad_id, e);
                Fix::NoSolution {
                    reason: e.to_string(),
                }
            }
        };

        self.trail = if trail.is_enabled() {
            sample_trail(provider, &self.satellite, ctx.now, trail)
        } else {
            Vec::new()
        };
    }

    fn solve(
        &self,
        provider: &dyn TrajectoryProvider,
        observer: &Observer,
        ctx: &TickContext,
    ) -> Result<Fix, PredictError> {
        let look = provider.look_angle(observer, &self.satellite, ctx.now)?;
        let subpoint = provider.sub_point(&self.satellite, ctx.now)?;
        let satellite_sunlit = provider.is_sunlit(Body::Satellite(&self.satellite), ctx.now)?;
        let observer_sunlit = ctx.observer_sunlit.ok_or_else(|| {
            PredictError::Propagation("observer lighting unavailable".into())
        })?;

        Ok(Fix::Solved {
            look,
            subpoint,
            visibility: classify(satellite_sunlit, observer_sunlit),
        })
    }
}

fn sample_trail(
    provider: &dyn TrajectoryProvider,
    satellite: &Satellite,
    now: DateTime<Utc>,
    trail: &TrailConfig,
) -> Vec<(f64, f64)> {
    let end = now + trail.window;
    let mut t = now - trail.window;
    let mut points = Vec::new();
    while t <= end {
        if let Ok(sub) = provider.sub_point(satellite, t) {
            points.push((sub.lat_deg, sub.lon_deg));
        }
        t += trail.step;
    }
    points
}
