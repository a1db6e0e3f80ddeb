//! Role, service type and profile record models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Table holding profile records.
pub const PROFILE_TABLE: &str = "users";

/// Every column of the profile table, in write order.
pub const PROFILE_COLUMNS: &str = "id,name,email,role,service_type,created_at";

/// Role picked in the first onboarding step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoleChoice {
    #[serde(rename = "User")]
    User,
    #[serde(rename = "Service Provider")]
    ServiceProvider,
}

impl RoleChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::ServiceProvider => "Service Provider",
        }
    }
}

impl std::fmt::Display for RoleChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RoleChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "User" => Ok(Self::User),
            "Service Provider" => Ok(Self::ServiceProvider),
            other => Err(format!("Unknown role: {other}")),
        }
    }
}

/// Service categories a provider can register for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceType {
    Plumber,
    Electrician,
    Carpenter,
    Painter,
    Cleaner,
}

impl ServiceType {
    pub const ALL: [ServiceType; 5] = [
        Self::Plumber,
        Self::Electrician,
        Self::Carpenter,
        Self::Painter,
        Self::Cleaner,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plumber => "Plumber",
            Self::Electrician => "Electrician",
            Self::Carpenter => "Carpenter",
            Self::Painter => "Painter",
            Self::Cleaner => "Cleaner",
        }
    }
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ServiceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown service type: {s}"))
    }
}

/// A persisted role. Only providers carry a service type, so a user record
/// cannot have one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role")]
pub enum Role {
    #[serde(rename = "User")]
    User,
    #[serde(rename = "Service Provider")]
    ServiceProvider { service_type: ServiceType },
}

impl Role {
    pub fn choice(&self) -> RoleChoice {
        match self {
            Self::User => RoleChoice::User,
            Self::ServiceProvider { .. } => RoleChoice::ServiceProvider,
        }
    }

    pub fn service_type(&self) -> Option<ServiceType> {
        match self {
            Self::User => None,
            Self::ServiceProvider { service_type } => Some(*service_type),
        }
    }

    /// Where the user lands once onboarding finishes with this role.
    pub fn destination(&self) -> Destination {
        match self {
            Self::User => Destination::Dashboard,
            Self::ServiceProvider { .. } => Destination::ServiceProvider,
        }
    }
}

/// One row of the `users` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(flatten)]
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Pages the app routes users to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Boarding,
    Dashboard,
    ServiceProvider,
}

impl Destination {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Boarding => "/boarding",
            Self::Dashboard => "/dashboard",
            Self::ServiceProvider => "/service-provider",
        }
    }
}

impl Serialize for Destination {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.path())
    }
}
