use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::config::Config;
use crate::tracker::{DisplayFilter, EntityRecord, StateSnapshot, Visibility};
use crate::web::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::web::server::AppState;

/// Session settings plus per-snapshot summary.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub lat: f64,
    pub lon: f64,
    /// Observer altitude in km
    pub alt: f64,
    pub min_el: f64,
    pub mode: DisplayFilter,
    pub trail_mins: u32,
    pub groups: String,
    pub sun_lat: f64,
    pub sun_lon: f64,
    /// Absent until the first tick has been published
    pub timestamp: Option<DateTime<Utc>>,
    pub tracked: usize,
    pub degraded: usize,
    pub selected: Option<u32>,
}

impl SessionView {
    fn new(config: &Config, snapshot: &StateSnapshot) -> Self {
        Self {
            lat: config.observer.lat,
            lon: config.observer.lon,
            alt: config.observer.alt_km,
            min_el: config.min_elevation_deg,
            mode: config.mode,
            trail_mins: config.trail_minutes,
            groups: config.groups.clone(),
            sun_lat: snapshot.sun.lat_deg,
            sun_lon: snapshot.sun.lon_deg,
            timestamp: (!snapshot.is_empty()).then_some(snapshot.timestamp),
            tracked: snapshot.tracked,
            degraded: snapshot.degraded,
            selected: snapshot.selected,
        }
    }
}

/// One displayed satellite. Geometry fields are null when no solution exists.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SatelliteView {
    pub id: u32,
    pub name: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub az: Option<f64>,
    pub el: Option<f64>,
    pub range_km: Option<f64>,
    /// km/s, positive when receding
    pub range_rate_km_s: Option<f64>,
    pub visibility: Option<Visibility>,
    /// Present only when geometry could not be computed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub next_event_text: String,
    pub alt_km: Option<f64>,
    pub apogee_km: f64,
    pub degraded: bool,
    /// `[lat, lon]` pairs
    #[schema(value_type = Vec<Vec<f64>>)]
    pub trail: Vec<(f64, f64)>,
}

impl From<&EntityRecord> for SatelliteView {
    fn from(record: &EntityRecord) -> Self {
        Self {
            id: record.norad_id,
            name: record.name.clone(),
            lat: record.subpoint.map(|s| s.lat_deg),
            lon: record.subpoint.map(|s| s.lon_deg),
            az: record.look.map(|l| l.azimuth_deg),
            el: record.look.map(|l| l.elevation_deg),
            range_km: record.look.map(|l| l.range_km),
            range_rate_km_s: record.range_rate(),
            visibility: record.visibility,
            error: record.no_solution.clone(),
            next_event_text: record.next_event.clone(),
            alt_km: record.subpoint.map(|s| s.alt_km),
            apogee_km: record.apogee_km,
            degraded: record.degraded,
            trail: record.trail.clone(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SatellitesResponse {
    pub config: SessionView,
    pub satellites: Vec<SatelliteView>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SelectResponse {
    pub status: String,
    pub selected: u32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `starting` before the first tick, `degraded` if any schedule is failing
    pub status: String,
    pub tracked: usize,
    pub degraded: usize,
    pub timestamp: Option<DateTime<Utc>>,
}

#[utoipa::path(
    get,
    path = "/api/satellites",
    responses(
        (status = 200, description = "Latest snapshot", body = SatellitesResponse)
    ),
    tag = "satellites"
)]
pub async fn list_satellites(State(state): State<AppState>) -> Json<SatellitesResponse> {
    let snapshot = state.distributor.latest();
    Json(SatellitesResponse {
        config: SessionView::new(&state.config, &snapshot),
        satellites: snapshot.records.iter().map(SatelliteView::from).collect(),
    })
}

#[utoipa::path(
    get,
    path = "/api/select/{id}",
    params(
        ("id" = String, Path, description = "NORAD catalog number")
    ),
    responses(
        (status = 200, description = "Selection recorded", body = SelectResponse),
        (status = 400, description = "Not a catalog number", body = ErrorResponse)
    ),
    tag = "satellites"
)]
pub async fn select_satellite(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SelectResponse>> {
    let norad_id: u32 = id.trim().parse().map_err(|_| ApiError::InvalidId(id))?;
    state.distributor.select(norad_id);
    log::debug!("Selected {}", norad_id);
    Ok(Json(SelectResponse {
        status: "ok".to_string(),
        selected: norad_id,
    }))
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Engine status", body = HealthResponse)
    ),
    tag = "satellites"
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = state.distributor.latest();
    let status = if snapshot.is_empty() {
        "starting"
    } else if snapshot.degraded > 0 {
        "degraded"
    } else {
        "ok"
    };
    Json(HealthResponse {
        status: status.to_string(),
        tracked: snapshot.tracked,
        degraded: snapshot.degraded,
        timestamp: (!snapshot.is_empty()).then_some(snapshot.timestamp),
    })
}
