use utoipa::OpenApi;

use super::api::error::ErrorResponse;
use super::api::satellites::{
    HealthResponse, SatelliteView, SatellitesResponse, SelectResponse, SessionView,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        super::api::satellites::list_satellites,
        super::api::satellites::select_satellite,
        super::api::satellites::health,
    ),
    components(
        schemas(
            SatellitesResponse,
            SessionView,
            SatelliteView,
            SelectResponse,
            HealthResponse,
            ErrorResponse,
            crate::tracker::DisplayFilter,
            crate::tracker::Visibility,
        )
    ),
    info(
        title = "Visible Ephemeris API",
        description = "Live satellite tracking state",
        version = "0.1.0"
    ),
    tags(
        (name = "satellites", description = "Tracking snapshot and selection")
    )
)]
pub struct ApiDoc;
