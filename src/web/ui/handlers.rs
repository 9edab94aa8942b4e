use axum::{extract::State, response::IntoResponse};

use crate::web::server::AppState;

use super::templates::DashboardTemplate;

pub async fn dashboard(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.distributor.latest();
    DashboardTemplate::new(&state.config, &snapshot)
}
