use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;

use crate::config::Config;
use crate::display::render_table;
use crate::predict::{Body, Observer, Satellite, TrajectoryProvider};
use crate::shutdown::ShutdownSignal;

use super::distributor::StateDistributor;
use super::entity::{EntityState, TickContext, TrailConfig};
use super::error::TrackerError;
use super::filter::by_elevation;
use super::scheduler::PassScheduler;
use super::snapshot::{EntityRecord, StateSnapshot};

/// Fixed-cadence driver that refreshes every entity and publishes snapshots.
pub struct TrackingLoop {
    config: Arc<Config>,
    observer: Observer,
    trail: TrailConfig,
    provider: Arc<dyn TrajectoryProvider>,
    scheduler: PassScheduler,
    entities: Vec<EntityState>,
    distributor: Arc<StateDistributor>,
}

impl TrackingLoop {
    /// Must be called from within a tokio runtime.
    pub fn new(
        config: Arc<Config>,
        provider: Arc<dyn TrajectoryProvider>,
        satellites: Vec<Satellite>,
        distributor: Arc<StateDistributor>,
    ) -> Result<Self, TrackerError> {
        if satellites.is_empty() {
            return Err(TrackerError::NoSatellites);
        }
        let observer = config.observer();
        let scheduler = PassScheduler::new(
            Arc::clone(&provider),
            observer,
            config.schedule_policy(),
            config.tracking.workers,
        )?;
        Ok(Self {
            observer,
            trail: config.trail(),
            provider,
            scheduler,
            entities: satellites.into_iter().map(EntityState::new).collect(),
            distributor,
            config,
        })
    }

    #[cfg(test)]
    pub fn entities(&self) -> &[EntityState] {
        &self.entities
    }

    /// Refresh every entity at `now` and build the filtered snapshot.
    pub fn tick(&mut self, now: DateTime<Utc>) -> StateSnapshot {
        let sun = self.provider.sun_subpoint(now);
        let observer_sunlit = match self.provider.is_sunlit(Body::Observer(&self.observer), now) {
            Ok(lit) => Some(lit),
            Err(e) => {
                log::warn!("Observer lighting unavailable: {}", e);
                None
            }
        };
        let ctx = TickContext {
            now,
            observer_sunlit,
        };
        let degraded_after = self.scheduler.policy().degraded_after;

        for entity in &mut self.entities {
            entity.refresh(self.provider.as_ref(), &self.observer, &ctx, &self.trail);
            self.scheduler.evaluate(&entity.satellite, &entity.schedule, now);
            entity.next_event = entity.schedule.next_event(now, degraded_after);
        }

        let mut shown: Vec<&EntityState> = self
            .entities
            .iter()
            .filter(|e| self.config.mode.admits(&e.fix, self.config.min_elevation_deg))
            .collect();
        shown.sort_by(|a, b| by_elevation(&a.fix, &b.fix));
        shown.truncate(self.config.max_sats);

        StateSnapshot {
            timestamp: now,
            sun,
            records: shown
                .into_iter()
                .map(|e| EntityRecord::capture(e, now, degraded_after))
                .collect(),
            tracked: self.entities.len(),
            degraded: self
                .entities
                .iter()
                .filter(|e| e.schedule.is_degraded(degraded_after))
                .count(),
            selected: self.distributor.selected(),
        }
    }

    /// Tick, render and publish.
    pub fn step(&mut self, now: DateTime<Utc>) {
        let snapshot = self.tick(now);
        let text = render_table(&snapshot, &self.config);
        self.distributor.publish(snapshot, text);
    }

    pub async fn run(mut self, mut shutdown: ShutdownSignal) {
        let cadence = self.config.tracking.tick;
        let mut interval = tokio::time::interval(cadence);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        log::info!(
            "Tracking {} satellites every {:?} ({} mode)",
            self.entities.len(),
            cadence,
            self.config.mode
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.triggered() => break,
            }

            let started = Instant::now();
            self.step(Utc::now());

            let elapsed = started.elapsed();
            if elapsed > cadence {
                log::warn!("Tick took {:?}, longer than the {:?} cadence", elapsed, cadence);
            }

            if shutdown.is_triggered() {
                break;
            }
        }

        log::info!("Tracking loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predict::mock::{self, MockProvider};
    use crate::shutdown::{Shutdown, ShutdownReason};
    use crate::tracker::{DisplayFilter, Visibility};
    use chrono::{Duration, TimeZone};
    use std::time::Duration as StdDuration;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap()
    }

    fn config(mode: DisplayFilter, min_elevation_deg: f64) -> Arc<Config> {
        Arc::new(Config {
            mode,
            min_elevation_deg,
            trail_minutes: 0,
            ..Config::default()
        })
    }

    fn satellites(ids: &[u32]) -> Vec<Satellite> {
        ids.iter()
            .map(|id| mock::satellite(*id, &format!("SAT {id}")))
            .collect()
    }

    fn elevations(snapshot: &StateSnapshot) -> Vec<Option<f64>> {
        snapshot.records.iter().map(EntityRecord::elevation).collect()
    }

    #[tokio::test]
    async fn optical_mode_shows_only_visible_passes_in_order() {
        let provider = Arc::new(
            MockProvider::default()
                .with_elevation(1, 20.0)
                .with_elevation(2, -5.0)
                .with_elevation(3, 1.0)
                .with_lighting(true, false),
        );
        let mut tracking = TrackingLoop::new(
            config(DisplayFilter::Optical, 0.0),
            provider,
            satellites(&[1, 2, 3]),
            Arc::new(StateDistributor::new()),
        )
        .unwrap();

        let snapshot = tracking.tick(t0());

        assert_eq!(elevations(&snapshot), vec![Some(20.0), Some(1.0)]);
        assert!(snapshot
            .records
            .iter()
            .all(|r| r.visibility == Some(Visibility::SunlitVisible) && r.sampled_at == t0()));
        assert_eq!(snapshot.tracked, 3);
        assert_eq!(snapshot.timestamp, t0());
    }

    #[tokio::test]
    async fn show_all_includes_unsolved_last_and_truncates() {
        let provider = Arc::new(
            MockProvider::default()
                .with_elevation(1, -30.0)
                .with_elevation(2, 50.0)
                .with_elevation(3, 10.0)
                .with_lighting(false, true),
        );
        provider.break_satellite(4);
        let mut tracking = TrackingLoop::new(
            config(DisplayFilter::ShowAll, 10.0),
            Arc::clone(&provider) as Arc<dyn TrajectoryProvider>,
            satellites(&[4, 1, 2, 3]),
            Arc::new(StateDistributor::new()),
        )
        .unwrap();

        let snapshot = tracking.tick(t0());
        assert_eq!(
            elevations(&snapshot),
            vec![Some(50.0), Some(10.0), Some(-30.0), None]
        );
        assert_eq!(snapshot.records[3].norad_id, 4);
        assert_eq!(snapshot.records[3].visibility, None);

        let limited = Arc::new(Config {
            max_sats: 2,
            ..(*config(DisplayFilter::ShowAll, 10.0)).clone()
        });
        let mut tracking = TrackingLoop::new(
            limited,
            provider,
            satellites(&[4, 1, 2, 3]),
            Arc::new(StateDistributor::new()),
        )
        .unwrap();
        assert_eq!(
            elevations(&tracking.tick(t0())),
            vec![Some(50.0), Some(10.0)]
        );
    }

    #[tokio::test]
    async fn radio_mode_ignores_lighting() {
        let provider = Arc::new(
            MockProvider::default()
                .with_elevation(1, 10.0)
                .with_elevation(2, 4.0)
                .with_lighting(true, true),
        );
        let mut tracking = TrackingLoop::new(
            config(DisplayFilter::Radio, 5.0),
            provider,
            satellites(&[1, 2]),
            Arc::new(StateDistributor::new()),
        )
        .unwrap();

        let snapshot = tracking.tick(t0());
        assert_eq!(elevations(&snapshot), vec![Some(10.0)]);
        assert_eq!(snapshot.records[0].visibility, Some(Visibility::Daylit));
    }

    #[tokio::test]
    async fn schedules_arrive_without_blocking_ticks() {
        let provider = Arc::new(MockProvider::default().with_elevation(1, 30.0));
        let release = provider.gate();
        let distributor = Arc::new(StateDistributor::new());
        let mut tracking = TrackingLoop::new(
            config(DisplayFilter::Radio, 0.0),
            Arc::clone(&provider) as Arc<dyn TrajectoryProvider>,
            satellites(&[1]),
            Arc::clone(&distributor),
        )
        .unwrap();

        tracking.step(t0());
        tracking.step(t0() + Duration::seconds(1));
        let first = distributor.latest();
        assert_eq!(first.records[0].next_event, "Calculating...");
        assert!(distributor.rendered().contains("Calculating..."));

        release.send(()).unwrap();
        let slot = Arc::clone(&tracking.entities()[0].schedule);
        tokio::time::timeout(StdDuration::from_secs(5), async {
            while slot.current().is_none() {
                tokio::time::sleep(StdDuration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        // Mock schedule: rise 10 min after the dispatch tick.
        tracking.step(t0() + Duration::seconds(5));
        let latest = distributor.latest();
        assert_eq!(latest.records[0].next_event, "AOS 9m 55s");
        assert_eq!(provider.find_calls(), 1);
    }

    #[tokio::test]
    async fn selection_reaches_snapshot() {
        let provider = Arc::new(MockProvider::default().with_elevation(7, 30.0));
        let distributor = Arc::new(StateDistributor::new());
        let mut tracking = TrackingLoop::new(
            config(DisplayFilter::Radio, 0.0),
            provider,
            satellites(&[7]),
            Arc::clone(&distributor),
        )
        .unwrap();

        distributor.select(7);
        tracking.step(t0());
        assert_eq!(distributor.latest().selected, Some(7));
        assert!(distributor
            .rendered()
            .lines()
            .any(|l| l.starts_with('>') && l.contains("SAT 7")));
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let provider = Arc::new(MockProvider::default());
        let distributor = Arc::new(StateDistributor::new());
        let tracking = TrackingLoop::new(
            config(DisplayFilter::ShowAll, 0.0),
            provider,
            satellites(&[1]),
            Arc::clone(&distributor),
        )
        .unwrap();

        let shutdown = Shutdown::new();
        let handle = tokio::spawn(tracking.run(shutdown.signal()));

        let mut frames = distributor.subscribe();
        tokio::time::timeout(StdDuration::from_secs(5), frames.changed())
            .await
            .unwrap()
            .unwrap();
        shutdown.trigger(ShutdownReason::Interrupted);

        tokio::time::timeout(StdDuration::from_secs(5), handle)
            .await
            .expect("loop exits")
            .unwrap();
        assert_eq!(distributor.latest().records.len(), 1);
    }

    #[tokio::test]
    async fn empty_catalog_is_rejected() {
        let result = TrackingLoop::new(
            config(DisplayFilter::Radio, 0.0),
            Arc::new(MockProvider::default()),
            Vec::new(),
            Arc::new(StateDistributor::new()),
        );
        assert!(matches!(result, Err(TrackerError::NoSatellites)));
    }
}
