//! Dashboard data: the service catalog, map settings, location status and
//! the ride card.

use serde::{Deserialize, Serialize};

use crate::onboarding::ServiceType;

pub const TILE_URL: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";
pub const TILE_ATTRIBUTION: &str =
    "&copy; <a href=\"https://www.openstreetmap.org/copyright\">OpenStreetMap</a>";
pub const DEFAULT_ZOOM: u8 = 13;
pub const MARKER_LABEL: &str = "You are here";

pub const LOCATION_PENDING: &str = "Fetching your location...";
pub const LOCATION_UNAVAILABLE: &str = "Location access denied or unavailable.";

pub const REQUEST_LABEL: &str = "Request Ride";

/// One bookable service as listed in the sidebar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceOffer {
    pub service_type: ServiceType,
    pub hourly_rate_usd: u32,
    pub eta_minutes: u32,
    /// e.g. `$20/hr`
    pub price: String,
    /// e.g. `Available in 15 min`
    pub eta: String,
}

impl ServiceOffer {
    pub fn new(service_type: ServiceType, hourly_rate_usd: u32, eta_minutes: u32) -> Self {
        Self {
            service_type,
            hourly_rate_usd,
            eta_minutes,
            price: format!("${hourly_rate_usd}/hr"),
            eta: format!("Available in {eta_minutes} min"),
        }
    }
}

/// The fixed list of services offered on the dashboard.
pub fn service_catalog() -> Vec<ServiceOffer> {
    vec![
        ServiceOffer::new(ServiceType::Plumber, 20, 15),
        ServiceOffer::new(ServiceType::Electrician, 25, 10),
        ServiceOffer::new(ServiceType::Carpenter, 18, 20),
        ServiceOffer::new(ServiceType::Painter, 22, 30),
    ]
}

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, String> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(format!("Latitude out of range: {latitude}"));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(format!("Longitude out of range: {longitude}"));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// What the browser's one-shot geolocation call reported.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LocationReport {
    Position { latitude: f64, longitude: f64 },
    Denied {
        #[serde(default)]
        reason: Option<String>,
    },
}

/// Location shown by the map panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LocationStatus {
    Pending { message: String },
    Located { coordinates: Coordinates },
    Unavailable { message: String },
}

impl Default for LocationStatus {
    fn default() -> Self {
        Self::Pending {
            message: LOCATION_PENDING.to_string(),
        }
    }
}

impl LocationStatus {
    /// Interpret a geolocation report. Denials and impossible coordinates
    /// both show the same static message; neither is retried.
    pub fn from_report(report: &LocationReport) -> Self {
        let unavailable = || Self::Unavailable {
            message: LOCATION_UNAVAILABLE.to_string(),
        };
        match report {
            LocationReport::Position {
                latitude,
                longitude,
            } => match Coordinates::new(*latitude, *longitude) {
                Ok(coordinates) => Self::Located { coordinates },
                Err(_) => unavailable(),
            },
            LocationReport::Denied { .. } => unavailable(),
        }
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        match self {
            Self::Located { coordinates } => Some(*coordinates),
            _ => None,
        }
    }
}

/// Map widget settings. The map only renders once `center` is known.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapView {
    pub tile_url: &'static str,
    pub attribution: &'static str,
    pub zoom: u8,
    pub center: Option<Coordinates>,
    pub marker_label: &'static str,
}

impl MapView {
    pub fn centered_on(center: Option<Coordinates>) -> Self {
        Self {
            tile_url: TILE_URL,
            attribution: TILE_ATTRIBUTION,
            zoom: DEFAULT_ZOOM,
            center,
            marker_label: MARKER_LABEL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RideStatus {
    pub title: String,
    pub detail: String,
}

impl Default for RideStatus {
    fn default() -> Self {
        Self {
            title: "No ride in progress".to_string(),
            detail: "Your ride updates will appear here.".to_string(),
        }
    }
}

/// Placeholders for the pickup / destination inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationSearch {
    pub pickup_placeholder: &'static str,
    pub destination_placeholder: &'static str,
}

impl Default for LocationSearch {
    fn default() -> Self {
        Self {
            pickup_placeholder: "Enter pickup location",
            destination_placeholder: "Enter destination",
        }
    }
}

/// Everything the dashboard page renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub search: LocationSearch,
    pub services: Vec<ServiceOffer>,
    pub map: MapView,
    pub location: LocationStatus,
    pub ride: RideStatus,
    pub request_label: &'static str,
}

impl Dashboard {
    pub fn new(location: LocationStatus) -> Self {
        Self {
            search: LocationSearch::default(),
            services: service_catalog(),
            map: MapView::centered_on(location.coordinates()),
            location,
            ride: RideStatus::default(),
            request_label: REQUEST_LABEL,
        }
    }
}
