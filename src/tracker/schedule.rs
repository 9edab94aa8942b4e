use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};

use crate::predict::{EventKind, PassEvent};

use super::scheduler::{Dispatch, SchedulePolicy};

/// Rise/culminate/set events computed for one window. Immutable once built.
#[derive(Debug, Clone)]
pub struct EventSchedule {
    computed_at: DateTime<Utc>,
    covers_until: DateTime<Utc>,
    events: Vec<PassEvent>,
}

impl EventSchedule {
    /// Events are sorted by time; later events sharing a timestamp are dropped.
    pub fn new(
        computed_at: DateTime<Utc>,
        covers_until: DateTime<Utc>,
        mut events: Vec<PassEvent>,
    ) -> Self {
        events.sort_by_key(|e| e.time);
        events.dedup_by_key(|e| e.time);
        Self {
            computed_at,
            covers_until,
            events,
        }
    }

    pub fn computed_at(&self) -> DateTime<Utc> {
        self.computed_at
    }

    pub fn covers_until(&self) -> DateTime<Utc> {
        self.covers_until
    }

    pub fn events(&self) -> &[PassEvent] {
        &self.events
    }

    pub fn is_stale(&self, now: DateTime<Utc>, refresh_lead: Duration) -> bool {
        self.covers_until - now < refresh_lead
    }

    /// The coverage window has ended; its events say nothing about `now`.
    pub fn is_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.covers_until <= now
    }

    /// First event strictly after `now`.
    pub fn next_event(&self, now: DateTime<Utc>) -> Option<&PassEvent> {
        let idx = self.events.partition_point(|e| e.time <= now);
        self.events.get(idx)
    }
}

/// What the next-event column shows for an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextEvent {
    Calculating,
    Unavailable,
    NoneWithinHorizon,
    Upcoming { kind: EventKind, remaining: Duration },
}

impl fmt::Display for NextEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NextEvent::Calculating => write!(f, "Calculating..."),
            NextEvent::Unavailable => write!(f, "N/A"),
            NextEvent::NoneWithinHorizon => write!(f, "No pass"),
            NextEvent::Upcoming { kind, remaining } => {
                let secs = remaining.num_seconds().max(0);
                if secs >= 3600 {
                    write!(f, "{} {}h {:02}m", kind, secs / 3600, secs % 3600 / 60)
                } else {
                    write!(f, "{} {}m {:02}s", kind, secs / 60, secs % 60)
                }
            }
        }
    }
}

#[derive(Debug, Default)]
struct SlotState {
    schedule: Option<Arc<EventSchedule>>,
    in_flight: bool,
    failures: u32,
    last_failure: Option<DateTime<Utc>>,
}

/// Per-entity schedule cell shared between the tracking loop and one worker.
///
/// The worker holding `in_flight` is the only writer; it installs a complete
/// schedule (or records a failure) and clears the flag under the same lock.
#[derive(Debug, Default)]
pub struct ScheduleSlot {
    state: Mutex<SlotState>,
}

impl ScheduleSlot {
    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    pub fn current(&self) -> Option<Arc<EventSchedule>> {
        self.lock().schedule.clone()
    }

    #[cfg(test)]
    pub fn is_in_flight(&self) -> bool {
        self.lock().in_flight
    }

    #[cfg(test)]
    pub fn failures(&self) -> u32 {
        self.lock().failures
    }

    pub fn is_degraded(&self, degraded_after: u32) -> bool {
        self.lock().failures >= degraded_after
    }

    /// Check staleness and, if a recompute is due, mark the slot in flight.
    ///
    /// Only a `Dispatch::Submitted` result hands ownership to the caller, who
    /// must later call [`install`](Self::install) or [`fail`](Self::fail).
    pub fn try_claim(&self, now: DateTime<Utc>, policy: &SchedulePolicy) -> Dispatch {
        let mut state = self.lock();
        if state.in_flight {
            return Dispatch::InFlight;
        }
        if let Some(schedule) = &state.schedule {
            if !schedule.is_stale(now, policy.refresh_lead) {
                return Dispatch::Fresh;
            }
        }
        if let Some(failed_at) = state.last_failure {
            let retry_at = failed_at.checked_add_signed(policy.backoff(state.failures));
            if retry_at.map_or(true, |at| now < at) {
                return Dispatch::BackingOff;
            }
        }
        state.in_flight = true;
        Dispatch::Submitted
    }

    pub fn install(&self, schedule: EventSchedule) {
        let mut state = self.lock();
        state.schedule = Some(Arc::new(schedule));
        state.in_flight = false;
        state.failures = 0;
        state.last_failure = None;
    }

    /// Record a failed computation. Returns the consecutive failure count.
    pub fn fail(&self, at: DateTime<Utc>) -> u32 {
        let mut state = self.lock();
        state.in_flight = false;
        state.failures += 1;
        state.last_failure = Some(at);
        state.failures
    }

    /// Countdown text source. A lapsed schedule counts as no schedule.
    pub fn next_event(&self, now: DateTime<Utc>, degraded_after: u32) -> NextEvent {
        let state = self.lock();
        match state.schedule.as_ref().filter(|s| !s.is_lapsed(now)) {
            Some(schedule) => match schedule.next_event(now) {
                Some(event) => NextEvent::Upcoming {
                    kind: event.kind,
                    remaining: event.time - now,
                },
                None => NextEvent::NoneWithinHorizon,
            },
            None if state.failures >= degraded_after => NextEvent::Unavailable,
            None => NextEvent::Calculating,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
    }

    fn at(minutes: i64, kind: EventKind) -> PassEvent {
        PassEvent::new(t0() + Duration::minutes(minutes), kind)
    }

    #[test]
    fn schedule_is_strictly_increasing() {
        let schedule = EventSchedule::new(
            t0(),
            t0() + Duration::hours(24),
            vec![
                at(30, EventKind::Set),
                at(10, EventKind::Rise),
                at(20, EventKind::Culminate),
                at(10, EventKind::Culminate),
            ],
        );
        let events = schedule.events();
        assert_eq!(events.len(), 3);
        assert!(events.windows(2).all(|w| w[0].time < w[1].time));
        assert_eq!(events[0].kind, EventKind::Rise);
    }

    #[test]
    fn empty_schedule_has_no_next_event() {
        let schedule = EventSchedule::new(t0(), t0() + Duration::hours(24), Vec::new());
        assert!(schedule.next_event(t0()).is_none());

        let slot = ScheduleSlot::default();
        slot.install(schedule);
        assert_eq!(slot.next_event(t0(), 3), NextEvent::NoneWithinHorizon);
    }

    #[test]
    fn next_event_skips_past_entries() {
        let schedule = EventSchedule::new(
            t0(),
            t0() + Duration::hours(24),
            vec![at(10, EventKind::Rise), at(20, EventKind::Set)],
        );
        let next = schedule.next_event(t0() + Duration::minutes(10)).unwrap();
        assert_eq!(next.kind, EventKind::Set);
        assert!(schedule.next_event(t0() + Duration::minutes(21)).is_none());
    }

    #[test]
    fn staleness_follows_coverage_window() {
        let schedule = EventSchedule::new(t0(), t0() + Duration::hours(24), Vec::new());
        assert!(!schedule.is_stale(t0() + Duration::hours(23), Duration::zero()));
        assert!(schedule.is_stale(t0() + Duration::hours(25), Duration::zero()));
        assert!(schedule.is_stale(t0() + Duration::hours(23), Duration::hours(2)));
    }

    #[test]
    fn placeholders_depend_on_failures() {
        let slot = ScheduleSlot::default();
        assert_eq!(slot.next_event(t0(), 2), NextEvent::Calculating);
        slot.fail(t0());
        assert_eq!(slot.next_event(t0(), 2), NextEvent::Calculating);
        slot.fail(t0());
        assert_eq!(slot.next_event(t0(), 2), NextEvent::Unavailable);
        assert!(slot.is_degraded(2));
    }

    #[test]
    fn lapsed_schedule_is_never_shown() {
        let slot = ScheduleSlot::default();
        let policy = SchedulePolicy::default();
        slot.install(EventSchedule::new(t0(), t0() + Duration::hours(24), Vec::new()));
        assert_eq!(
            slot.next_event(t0() + Duration::hours(23), 3),
            NextEvent::NoneWithinHorizon
        );

        let later = t0() + Duration::hours(25);
        assert_eq!(slot.try_claim(later, &policy), Dispatch::Submitted);
        assert_eq!(slot.next_event(later, 3), NextEvent::Calculating);

        slot.fail(later);
        slot.fail(later);
        slot.fail(later);
        assert!(slot.is_degraded(3));
        assert_eq!(slot.next_event(later, 3), NextEvent::Unavailable);
        assert_eq!(slot.next_event(later, 3).to_string(), "N/A");
    }

    #[test]
    fn countdown_text() {
        let soon = NextEvent::Upcoming {
            kind: EventKind::Rise,
            remaining: Duration::seconds(12 * 60 + 5),
        };
        assert_eq!(soon.to_string(), "AOS 12m 05s");

        let later = NextEvent::Upcoming {
            kind: EventKind::Set,
            remaining: Duration::seconds(3 * 3600 + 2 * 60 + 59),
        };
        assert_eq!(later.to_string(), "LOS 3h 02m");
        assert_eq!(NextEvent::Calculating.to_string(), "Calculating...");
        assert_eq!(NextEvent::Unavailable.to_string(), "N/A");
    }

    #[test]
    fn claim_is_exclusive_until_released() {
        let slot = ScheduleSlot::default();
        let policy = SchedulePolicy::default();
        assert_eq!(slot.try_claim(t0(), &policy), Dispatch::Submitted);
        assert_eq!(slot.try_claim(t0(), &policy), Dispatch::InFlight);

        slot.install(EventSchedule::new(t0(), t0() + Duration::hours(24), Vec::new()));
        assert!(!slot.is_in_flight());
        assert_eq!(
            slot.try_claim(t0() + Duration::hours(23), &policy),
            Dispatch::Fresh
        );
        assert_eq!(
            slot.try_claim(t0() + Duration::hours(25), &policy),
            Dispatch::Submitted
        );
    }
}
