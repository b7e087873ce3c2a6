use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::{
    config::StorageBackend,
    dao::{
        document_store::{DocumentStore, memory::MemoryStore},
        models::ensure_indexes,
        storage::{StorageError, StorageResult},
    },
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Open the configured backend.
pub async fn connect_backend(backend: &StorageBackend) -> StorageResult<Arc<dyn DocumentStore>> {
    match backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        #[cfg(feature = "mongo-store")]
        StorageBackend::Mongo { uri, database } => {
            use crate::dao::document_store::mongodb::{MongoConfig, MongoDocumentStore};

            let config = MongoConfig::from_uri(uri, Some(database)).await?;
            let store = MongoDocumentStore::connect(config).await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "mongo-store"))]
        StorageBackend::Mongo { .. } => Err(StorageError::unavailable(
            "built without the mongo-store feature".into(),
            std::io::Error::new(std::io::ErrorKind::Unsupported, "mongo-store disabled"),
        )),
    }
}

/// Keep a healthy, indexed store installed in the shared state, staying in
/// degraded mode while the backend is unreachable.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn DocumentStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        let store = match connect().await {
            Ok(store) => store,
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
                continue;
            }
        };

        if let Err(err) = ensure_indexes(store.as_ref()).await {
            error!(error = %err, "failed to ensure storage indexes; retrying");
            sleep(delay).await;
            delay = (delay * 2).min(MAX_DELAY);
            continue;
        }

        state.install_store(store.clone()).await;
        info!("storage connection established; leaving degraded mode");
        delay = INITIAL_DELAY;

        loop {
            sleep(HEALTH_POLL_INTERVAL).await;
            match store.health_check().await {
                Ok(()) => {
                    if state.is_degraded().await {
                        info!("storage healthy again; leaving degraded mode");
                        state.install_store(store.clone()).await;
                    }
                    delay = INITIAL_DELAY;
                }
                Err(err) => {
                    if !state.is_degraded().await {
                        warn!(error = %err, "storage health check failed; entering degraded mode");
                        state.clear_store().await;
                    }
                    sleep(delay).await;
                    delay = (delay * 2).min(MAX_DELAY);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, state::AppState};

    #[tokio::test]
    async fn installs_memory_store_and_leaves_degraded_mode() {
        let state = AppState::new(AppConfig::for_tests());
        let mut watcher = state.degraded_watcher();
        let backend = state.config().storage.clone();

        let supervisor = tokio::spawn(run(state.clone(), move || {
            let backend = backend.clone();
            async move { connect_backend(&backend).await }
        }));
        watcher.wait_for(|degraded| !degraded).await.unwrap();
        assert!(state.require_store().await.is_ok());
        supervisor.abort();
    }
}
