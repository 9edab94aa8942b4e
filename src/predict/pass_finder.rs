use chrono::{DateTime, Duration, Utc};

use crate::predict::error::PredictError;
use crate::predict::types::{EventKind, PassEvent};

const FINE_STEP_SECONDS: i64 = 1;

/// Scan `[start, end]` for threshold crossings of `elevation_at`.
///
/// Coarse sampling finds each crossing, a binary search refines it to one
/// second. Culmination is the highest coarse sample inside a pass. A pass
/// already in progress at `start` yields no rise; one still in progress at
/// `end` yields no set.
pub fn find_passes<F>(
    elevation_at: F,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    min_elevation: f64,
    coarse_step: Duration,
) -> Result<Vec<PassEvent>, PredictError>
where
    F: Fn(DateTime<Utc>) -> Result<f64, PredictError>,
{
    let mut events = Vec::new();
    if end <= start {
        return Ok(events);
    }

    let mut cursor = start;
    let mut prev_el = elevation_at(cursor)?;
    let mut prev_visible = prev_el >= min_elevation;
    let mut rise: Option<DateTime<Utc>> = None;
    let mut max_el = prev_el;
    let mut max_el_time = cursor;

    while cursor < end {
        let next = (cursor + coarse_step).min(end);
        let el = elevation_at(next)?;
        let visible = el >= min_elevation;

        if visible && !prev_visible {
            let aos = refine_crossing(&elevation_at, cursor, next, true, min_elevation)?;
            events.push(PassEvent::new(aos, EventKind::Rise));
            rise = Some(aos);
            max_el = el;
            max_el_time = next;
        } else if visible {
            if el > max_el {
                max_el = el;
                max_el_time = next;
            }
        } else if prev_visible {
            let los = refine_crossing(&elevation_at, cursor, next, false, min_elevation)?;
            push_culmination(&mut events, rise, start, max_el_time, los);
            events.push(PassEvent::new(los, EventKind::Set));
            rise = None;
        }

        if !visible {
            max_el = f64::NEG_INFINITY;
        }
        prev_visible = visible;
        prev_el = el;
        cursor = next;
    }

    if prev_visible && prev_el < max_el {
        // Past the peak when the window closed.
        push_culmination(&mut events, rise, start, max_el_time, end + Duration::seconds(1));
    }

    Ok(events)
}

fn push_culmination(
    events: &mut Vec<PassEvent>,
    rise: Option<DateTime<Utc>>,
    window_start: DateTime<Utc>,
    tca: DateTime<Utc>,
    before: DateTime<Utc>,
) {
    let after = rise.unwrap_or(window_start);
    if tca > after && tca < before {
        events.push(PassEvent::new(tca, EventKind::Culminate));
    }
}

/// Binary search for the exact threshold crossing time
fn refine_crossing<F>(
    elevation_at: &F,
    before: DateTime<Utc>,
    after: DateTime<Utc>,
    rising: bool,
    threshold: f64,
) -> Result<DateTime<Utc>, PredictError>
where
    F: Fn(DateTime<Utc>) -> Result<f64, PredictError>,
{
    let mut low = before;
    let mut high = after;

    while (high - low).num_seconds() > FINE_STEP_SECONDS {
        let mid = low + (high - low) / 2;
        let above = elevation_at(mid)? >= threshold;
        if above == rising {
            high = mid;
        } else {
            low = mid;
        }
    }

    Ok(high)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    /// Triangle-shaped pass: rises at +10 min, peaks 30 deg at +20 min, sets at +30 min.
    fn triangle(t: DateTime<Utc>) -> Result<f64, PredictError> {
        let minutes = (t - t0()).num_seconds() as f64 / 60.0;
        Ok(30.0 - 3.0 * (minutes - 20.0).abs())
    }

    #[test]
    fn finds_rise_culmination_and_set() {
        let events =
            find_passes(triangle, t0(), t0() + Duration::hours(1), 0.0, Duration::seconds(60))
                .unwrap();

        let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::Rise, EventKind::Culminate, EventKind::Set]);
        assert!((events[0].time - (t0() + Duration::minutes(10))).num_seconds().abs() <= 1);
        assert_eq!(events[1].time, t0() + Duration::minutes(20));
        assert!((events[2].time - (t0() + Duration::minutes(30))).num_seconds().abs() <= 1);
    }

    #[test]
    fn threshold_shortens_the_pass() {
        let events =
            find_passes(triangle, t0(), t0() + Duration::hours(1), 15.0, Duration::seconds(60))
                .unwrap();
        assert!((events[0].time - (t0() + Duration::minutes(15))).num_seconds().abs() <= 1);
        assert!((events[2].time - (t0() + Duration::minutes(25))).num_seconds().abs() <= 1);
    }

    #[test]
    fn pass_in_progress_at_start_has_no_rise() {
        let start = t0() + Duration::minutes(15);
        let events =
            find_passes(triangle, start, t0() + Duration::hours(1), 0.0, Duration::seconds(60))
                .unwrap();
        let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::Culminate, EventKind::Set]);
    }

    #[test]
    fn propagation_error_is_returned() {
        let result = find_passes(
            |_| Err(PredictError::Propagation("decayed".into())),
            t0(),
            t0() + Duration::hours(1),
            0.0,
            Duration::seconds(60),
        );
        assert!(matches!(result, Err(PredictError::Propagation(_))));
    }

    #[test]
    fn empty_window_yields_nothing() {
        let events = find_passes(triangle, t0(), t0(), 0.0, Duration::seconds(60)).unwrap();
        assert!(events.is_empty());
    }
}
