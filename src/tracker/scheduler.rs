use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::runtime::Handle;
use tokio::sync::Semaphore;

use crate::predict::{Observer, Satellite, TrajectoryProvider};

use super::error::TrackerError;
use super::schedule::{EventSchedule, ScheduleSlot};

/// Outcome of a staleness check for one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Fresh,
    InFlight,
    BackingOff,
    Submitted,
}

#[derive(Debug, Clone)]
pub struct SchedulePolicy {
    pub horizon: Duration,
    pub refresh_lead: Duration,
    pub min_elevation_deg: f64,
    pub retry_base: Duration,
    pub retry_max: Duration,
    pub degraded_after: u32,
}

impl Default for SchedulePolicy {
    fn default() -> Self {
        Self {
            horizon: Duration::hours(24),
            refresh_lead: Duration::zero(),
            min_elevation_deg: 0.0,
            retry_base: Duration::seconds(30),
            retry_max: Duration::minutes(10),
            degraded_after: 3,
        }
    }
}

impl SchedulePolicy {
    /// Wait before retrying after `failures` consecutive failures.
    pub fn backoff(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::zero();
        }
        let factor = 1i32 << (failures - 1).min(20);
        self.retry_base
            .checked_mul(factor)
            .map_or(self.retry_max, |d| d.min(self.retry_max))
    }
}

/// Dispatches event-schedule recomputation onto a bounded set of blocking workers.
pub struct PassScheduler {
    provider: Arc<dyn TrajectoryProvider>,
    observer: Observer,
    policy: SchedulePolicy,
    permits: Arc<Semaphore>,
    runtime: Handle,
}

impl PassScheduler {
    /// Must be called from within a tokio runtime.
    pub fn new(
        provider: Arc<dyn TrajectoryProvider>,
        observer: Observer,
        policy: SchedulePolicy,
        workers: usize,
    ) -> Result<Self, TrackerError> {
        let runtime = Handle::try_current().map_err(|_| TrackerError::NoRuntime)?;
        Ok(Self {
            provider,
            observer,
            policy,
            permits: Arc::new(Semaphore::new(workers.max(1))),
            runtime,
        })
    }

    pub fn policy(&self) -> &SchedulePolicy {
        &self.policy
    }

    /// Submit a recompute for `satellite` if its schedule is stale and none is running.
    pub fn evaluate(
        &self,
        satellite: &Satellite,
        slot: &Arc<ScheduleSlot>,
        now: DateTime<Utc>,
    ) -> Dispatch {
        let dispatch = slot.try_claim(now, &self.policy);
        if dispatch == Dispatch::Submitted {
            self.submit(satellite.clone(), Arc::clone(slot), now);
        }
        dispatch
    }

    fn submit(&self, satellite: Satellite, slot: Arc<ScheduleSlot>, now: DateTime<Utc>) {
        let provider = Arc::clone(&self.provider);
        let permits = Arc::clone(&self.permits);
        let observer = self.observer;
        let Some(end) = now.checked_add_signed(self.policy.horizon) else {
            let failures = slot.fail(now);
            log::warn!(
                "Horizon {} out of range for {} ({}), attempt {}",
                self.policy.horizon,
                satellite.name,
                satellite.norad_id,
                failures
            );
            return;
        };
        let min_elevation = self.policy.min_elevation_deg;
        let degraded_after = self.policy.degraded_after;

        self.runtime.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                slot.fail(now);
                return;
            };

            let norad_id = satellite.norad_id;
            let name = satellite.name.clone();
            let result = tokio::task::spawn_blocking(move || {
                provider.find_events(&observer, &satellite, now, end, min_elevation)
            })
            .await;

            let error = match result {
                Ok(Ok(events)) => {
                    let schedule = EventSchedule::new(now, end, events);
                    log::debug!(
                        "Schedule for {} ({}): {} events in {} .. {}",
                        name,
                        norad_id,
                        schedule.events().len(),
                        schedule.computed_at(),
                        schedule.covers_until()
                    );
                    slot.install(schedule);
                    return;
                }
                Ok(Err(e)) => e.to_string(),
                Err(e) => format!("worker aborted: {}", e),
            };

            let failures = slot.fail(now);
            log::warn!(
                "Pass prediction for {} ({}) failed, attempt {}: {}",
                name,
                norad_id,
                failures,
                error
            );
            if failures == degraded_after {
                log::warn!("{} ({}) marked degraded", name, norad_id);
            }
        });
    }
}
