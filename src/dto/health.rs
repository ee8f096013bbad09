use serde::Serialize;
use utoipa::ToSchema;

use crate::state::StorageStatus;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Store currently answering requests.
    pub storage: StorageStatus,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(storage: StorageStatus) -> Self {
        Self {
            status: "ok".to_string(),
            storage,
        }
    }

    /// Create a health response indicating the system is in degraded mode.
    pub fn degraded(storage: StorageStatus) -> Self {
        Self {
            status: "degraded".to_string(),
            storage,
        }
    }
}
