use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report the storage status while logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.room_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        Err(_) => warn!("storage unavailable (degraded mode)"),
    }

    let storage = state.storage_status().await;
    if state.is_degraded() {
        HealthResponse::degraded(storage)
    } else {
        HealthResponse::ok(storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{AppConfig, StorageConfig, StorageMode},
        state::{AppState, StorageStatus},
    };

    #[tokio::test]
    async fn memory_mode_reports_ok() {
        let state = AppState::new(AppConfig::default());
        let health = health_status(&state).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.storage, StorageStatus::Memory);
    }

    #[tokio::test]
    async fn disconnected_durable_store_reports_degraded() {
        let state = AppState::new(AppConfig {
            storage: StorageConfig {
                mode: StorageMode::Mongo,
                fallback_to_memory: true,
            },
            ..AppConfig::default()
        });
        let health = health_status(&state).await;
        assert_eq!(health.status, "degraded");
        assert_eq!(health.storage, StorageStatus::Fallback);
    }
}
