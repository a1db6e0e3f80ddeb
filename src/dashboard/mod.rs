//! Dashboard: the static service catalog, map panel and ride card shown
//! after onboarding.

pub mod model;
pub mod routes;

pub use model::{
    Coordinates, Dashboard, LocationReport, LocationStatus, MapView, RideStatus, ServiceOffer,
    service_catalog,
};
pub use routes::{DashboardRouteState, dashboard_routes};
