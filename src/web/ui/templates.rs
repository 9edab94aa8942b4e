use askama::Template;
use askama_web::WebTemplate;

use crate::config::Config;
use crate::tracker::{EntityRecord, StateSnapshot};

pub struct DashboardRow {
    pub selected: bool,
    pub id: u32,
    pub name: String,
    pub az: String,
    pub el: String,
    pub range: String,
    pub range_rate: String,
    pub apogee: String,
    pub visibility: String,
    pub next_event: String,
    pub degraded: bool,
}

impl DashboardRow {
    fn new(record: &EntityRecord, selected: Option<u32>) -> Self {
        let fmt = |v: Option<f64>| v.map_or_else(|| "N/A".to_string(), |v| format!("{:.1}", v));
        Self {
            selected: selected == Some(record.norad_id),
            id: record.norad_id,
            name: record.name.clone(),
            az: fmt(record.look.map(|l| l.azimuth_deg)),
            el: fmt(record.look.map(|l| l.elevation_deg)),
            range: fmt(record.look.map(|l| l.range_km)),
            range_rate: record
                .range_rate()
                .map_or_else(|| "N/A".to_string(), |v| format!("{:+.2}", v)),
            apogee: format!("{:.0}", record.apogee_km),
            visibility: record
                .visibility
                .map_or_else(|| "N/A".to_string(), |v| v.to_string()),
            next_event: record.next_event.clone(),
            degraded: record.degraded,
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub timestamp: String,
    pub observer: String,
    pub mode: String,
    pub min_el: String,
    pub tracked: usize,
    pub degraded: usize,
    pub rows: Vec<DashboardRow>,
}

impl DashboardTemplate {
    pub fn new(config: &Config, snapshot: &StateSnapshot) -> Self {
        Self {
            timestamp: if snapshot.is_empty() {
                "waiting for first update".to_string()
            } else {
                snapshot.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
            },
            observer: format!(
                "{:.4}, {:.4} ({:.3} km)",
                config.observer.lat, config.observer.lon, config.observer.alt_km
            ),
            mode: config.mode.to_string(),
            min_el: format!("{:.1}", config.min_elevation_deg),
            tracked: snapshot.tracked,
            degraded: snapshot.degraded,
            rows: snapshot
                .records
                .iter()
                .map(|r| DashboardRow::new(r, snapshot.selected))
                .collect(),
        }
    }
}
