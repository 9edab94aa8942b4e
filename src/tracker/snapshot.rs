use chrono::{DateTime, Utc};

use crate::predict::{LookAngle, SubPoint, SunPoint};

use super::entity::{EntityState, Fix, Visibility};

/// One entity as captured in a published snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub norad_id: u32,
    pub name: String,
    pub sampled_at: DateTime<Utc>,
    pub look: Option<LookAngle>,
    pub subpoint: Option<SubPoint>,
    pub visibility: Option<Visibility>,
    /// Why geometry is missing, when it is
    pub no_solution: Option<String>,
    pub apogee_km: f64,
    pub next_event: String,
    pub degraded: bool,
    pub trail: Vec<(f64, f64)>,
}

impl EntityRecord {
    pub fn capture(entity: &EntityState, sampled_at: DateTime<Utc>, degraded_after: u32) -> Self {
        let (look, subpoint, visibility, no_solution) = match &entity.fix {
            Fix::Solved {
                look,
                subpoint,
                visibility,
            } => (Some(*look), Some(*subpoint), Some(*visibility), None),
            Fix::NoSolution { reason } => (None, None, None, Some(reason.clone())),
        };
        Self {
            norad_id: entity.satellite.norad_id,
            name: entity.satellite.name.clone(),
            sampled_at,
            look,
            subpoint,
            visibility,
            no_solution,
            apogee_km: entity.satellite.elements.apogee_km(),
            next_event: entity.next_event.to_string(),
            degraded: entity.schedule.is_degraded(degraded_after),
            trail: entity.trail.clone(),
        }
    }

    pub fn elevation(&self) -> Option<f64> {
        self.look.map(|l| l.elevation_deg)
    }

    pub fn range_rate(&self) -> Option<f64> {
        self.look.map(|l| l.range_rate_km_s)
    }
}

/// Immutable state of every displayed entity at one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    pub timestamp: DateTime<Utc>,
    pub sun: SunPoint,
    pub records: Vec<EntityRecord>,
    pub tracked: usize,
    pub degraded: usize,
    pub selected: Option<u32>,
}

impl StateSnapshot {
    /// Placeholder served before the first tick completes.
    pub fn empty() -> Self {
        Self {
            timestamp: DateTime::UNIX_EPOCH,
            sun: SunPoint {
                lat_deg: 0.0,
                lon_deg: 0.0,
            },
            records: Vec::new(),
            tracked: 0,
            degraded: 0,
            selected: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.timestamp == DateTime::UNIX_EPOCH
    }
}
