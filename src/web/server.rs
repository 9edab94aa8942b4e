use std::sync::Arc;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
use crate::shutdown::ShutdownSignal;
use crate::tracker::StateDistributor;

use super::api::satellites as satellite_handlers;
use super::api_doc::ApiDoc;
use super::ui::handlers as ui_handlers;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub distributor: Arc<StateDistributor>,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // UI routes
        .route("/", get(ui_handlers::dashboard))
        // API endpoints
        .route("/api/satellites", get(satellite_handlers::list_satellites))
        .route("/api/select/{id}", get(satellite_handlers::select_satellite))
        .route("/health", get(satellite_handlers::health))
        // OpenAPI / Swagger
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(
    listener: TcpListener,
    state: AppState,
    mut shutdown: ShutdownSignal,
) -> std::io::Result<()> {
    log::info!("Web API listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.triggered().await })
        .await
}
