use std::fmt::Write as _;
use std::sync::Arc;

use crate::config::Config;
use crate::shutdown::ShutdownSignal;
use crate::tracker::{EntityRecord, StateDistributor, StateSnapshot};

const NAME_WIDTH: usize = 24;

/// Fixed-width text table shared by the terminal view and the text mirror.
pub fn render_table(snapshot: &StateSnapshot, config: &Config) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "VISIBLE EPHEMERIS  {}",
        snapshot.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(
        out,
        "Observer {:.4}, {:.4}  alt {:.3} km | mode {} | min el {:.1} | tracked {} | shown {} | degraded {}",
        config.observer.lat,
        config.observer.lon,
        config.observer.alt_km,
        config.mode,
        config.min_elevation_deg,
        snapshot.tracked,
        snapshot.records.len(),
        snapshot.degraded,
    );
    let _ = writeln!(
        out,
        "Sun subpoint {:.2}, {:.2}",
        snapshot.sun.lat_deg, snapshot.sun.lon_deg
    );
    out.push('\n');
    let _ = writeln!(
        out,
        "  {:>6}  {:<w$}  {:>6}  {:>6}  {:>8}  {:>6}  {:>3}  {:>7}  {:>7}  {:>7}  {:>7}  {}",
        "NORAD",
        "NAME",
        "AZ",
        "EL",
        "RANGE",
        "RRATE",
        "VIS",
        "LAT",
        "LON",
        "ALT",
        "APO",
        "NEXT EVENT",
        w = NAME_WIDTH
    );

    for record in &snapshot.records {
        render_row(&mut out, record, snapshot.selected == Some(record.norad_id));
    }

    if snapshot.records.is_empty() {
        out.push_str("  (no satellites match the current filter)\n");
    }
    out
}

fn render_row(out: &mut String, record: &EntityRecord, selected: bool) {
    let marker = if selected { '>' } else { ' ' };
    let name: String = record.name.chars().take(NAME_WIDTH).collect();
    let num = |value: Option<f64>, precision: usize| match value {
        Some(v) => format!("{:.*}", precision, v),
        None => "N/A".to_string(),
    };
    let visibility = record
        .visibility
        .map_or_else(|| "N/A".to_string(), |v| v.to_string());
    let degraded = if record.degraded { " !" } else { "" };

    let _ = writeln!(
        out,
        "{} {:>6}  {:<w$}  {:>6}  {:>6}  {:>8}  {:>6}  {:>3}  {:>7}  {:>7}  {:>7}  {:>7.0}  {}{}",
        marker,
        record.norad_id,
        name,
        num(record.look.map(|l| l.azimuth_deg), 1),
        num(record.elevation(), 1),
        num(record.look.map(|l| l.range_km), 1),
        num(record.range_rate(), 2),
        visibility,
        num(record.subpoint.map(|s| s.lat_deg), 2),
        num(record.subpoint.map(|s| s.lon_deg), 2),
        num(record.subpoint.map(|s| s.alt_km), 1),
        record.apogee_km,
        record.next_event,
        degraded,
        w = NAME_WIDTH
    );
}

/// Print every newly published table to stdout until shutdown.
pub async fn run_terminal_view(distributor: Arc<StateDistributor>, mut shutdown: ShutdownSignal) {
    let mut frames = distributor.subscribe();
    loop {
        tokio::select! {
            changed = frames.changed() => {
                if changed.is_err() {
                    break;
                }
                let text = Arc::clone(&frames.borrow_and_update().text);
                println!("{}", text);
            }
            _ = shutdown.triggered() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predict::{LookAngle, SubPoint};
    use crate::tracker::Visibility;
    use chrono::{TimeZone, Utc};

    fn record(norad_id: u32, name: &str, solved: bool) -> EntityRecord {
        EntityRecord {
            norad_id,
            name: name.into(),
            sampled_at: Utc.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap(),
            look: solved.then_some(LookAngle {
                azimuth_deg: 123.45,
                elevation_deg: 45.67,
                range_km: 1234.5,
                range_rate_km_s: 6.789,
            }),
            subpoint: solved.then_some(SubPoint {
                lat_deg: 12.3456,
                lon_deg: -45.6789,
                alt_km: 420.1,
            }),
            visibility: solved.then_some(Visibility::SunlitVisible),
            no_solution: (!solved).then(|| "decayed".to_string()),
            apogee_km: if solved { 421.0 } else { 1200.0 },
            next_event: "LOS 3m 05s".into(),
            degraded: !solved,
            trail: Vec::new(),
        }
    }

    fn snapshot(records: Vec<EntityRecord>, selected: Option<u32>) -> StateSnapshot {
        StateSnapshot {
            timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap(),
            tracked: 10,
            records,
            selected,
            ..StateSnapshot::empty()
        }
    }

    #[test]
    fn header_and_rows() {
        let text = render_table(
            &snapshot(
                vec![
                    record(25544, "ISS (ZARYA)", true),
                    record(99999, "A VERY LONG SATELLITE NAME THAT IS CUT", false),
                ],
                Some(25544),
            ),
            &Config::default(),
        );
        let lines: Vec<&str> = text.lines().collect();

        assert!(lines[0].contains("2026-03-01 20:00:00 UTC"));
        assert!(lines[1].contains("mode OPTICAL"));
        assert!(lines[1].contains("tracked 10"));
        assert!(lines[1].contains("shown 2"));

        let iss = lines.iter().find(|l| l.contains("25544")).unwrap();
        assert!(iss.starts_with('>'));
        assert!(iss.contains("45.7"));
        assert!(iss.contains("VIS"));
        assert!(iss.contains("LOS 3m 05s"));
        assert!(iss.contains("6.79"));
        assert!(iss.contains(" 421 "));

        let unsolved = lines.iter().find(|l| l.contains("99999")).unwrap();
        assert!(unsolved.starts_with(' '));
        assert!(unsolved.contains("N/A"));
        assert!(unsolved.contains(" 1200 "));
        assert!(!unsolved.contains("THAT IS CUT"));
        assert!(unsolved.ends_with(" !"));
    }

    #[test]
    fn empty_filter_result_is_explained() {
        let text = render_table(&snapshot(Vec::new(), None), &Config::default());
        assert!(text.contains("no satellites match"));
    }
}
