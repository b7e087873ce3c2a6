use tracing::warn;

use crate::{
    dto::health::{HealthResponse, ServiceInfo},
    state::SharedState,
};

fn mounted(state: &SharedState) -> Vec<String> {
    state
        .config()
        .domains
        .iter()
        .map(|domain| domain.name().to_owned())
        .collect()
}

/// Report whether a storage backend is installed and answering.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let services = mounted(state);
    let Some(store) = state.store().await else {
        warn!("storage unavailable (degraded mode)");
        return HealthResponse::degraded(services);
    };
    match store.health_check().await {
        Ok(()) => HealthResponse::ok(services),
        Err(err) => {
            warn!(error = %err, "storage health check failed");
            HealthResponse::degraded(services)
        }
    }
}

pub fn service_info(state: &SharedState) -> ServiceInfo {
    ServiceInfo {
        name: env!("CARGO_PKG_NAME").to_owned(),
        version: env!("CARGO_PKG_VERSION").to_owned(),
        services: state
            .config()
            .domains
            .iter()
            .map(|domain| domain.prefix())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, state::AppState, state::test_support::memory_state};

    #[tokio::test]
    async fn degraded_without_store() {
        let state = AppState::new(AppConfig::for_tests());
        assert_eq!(health_status(&state).await.status, "degraded");
        assert_eq!(health_status(&memory_state().await).await.status, "ok");
    }
}
