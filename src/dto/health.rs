use serde::Serialize;
use utoipa::ToSchema;

/// Health payload returned by the `/health` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Domains mounted by this process.
    pub services: Vec<String>,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(services: Vec<String>) -> Self {
        Self {
            status: "ok".to_string(),
            services,
        }
    }

    /// Create a health response indicating the system is in degraded mode.
    pub fn degraded(services: Vec<String>) -> Self {
        Self {
            status: "degraded".to_string(),
            services,
        }
    }
}

/// Landing payload describing the running process.
#[derive(Debug, Serialize, ToSchema)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub services: Vec<String>,
}
