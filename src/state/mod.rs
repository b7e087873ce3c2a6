mod events;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{
    auth::TokenCodec,
    config::AppConfig,
    dao::document_store::{DocumentStore, Entity, Repository},
    error::ServiceError,
    services::{peers::PeerClient, recommender::TrainedModel},
};

pub use self::events::{DomainEvent, EventBus};

pub type SharedState = Arc<AppState>;

const EVENT_BUS_CAPACITY: usize = 256;

/// Central application state shared by every handler.
pub struct AppState {
    config: AppConfig,
    store: RwLock<Option<Arc<dyn DocumentStore>>>,
    degraded: watch::Sender<bool>,
    events: EventBus,
    peers: PeerClient,
    tokens: TokenCodec,
    model: RwLock<Option<Arc<TrainedModel>>>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        let peers = PeerClient::new(
            config.notification_service_url.clone(),
            config.user_service_url.clone(),
        );
        let tokens = TokenCodec::new(&config.auth_secret, config.access_token_ttl);
        Arc::new(Self {
            config,
            store: RwLock::new(None),
            degraded: degraded_tx,
            events: EventBus::new(EVENT_BUS_CAPACITY),
            peers,
            tokens,
            model: RwLock::new(None),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn peers(&self) -> &PeerClient {
        &self.peers
    }

    pub fn tokens(&self) -> &TokenCodec {
        &self.tokens
    }

    /// Obtain a handle to the current document store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn DocumentStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Current store, or [`ServiceError::Degraded`] while none is installed.
    pub async fn require_store(&self) -> Result<Arc<dyn DocumentStore>, ServiceError> {
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Typed repository over the current store.
    pub async fn repo<T: Entity>(&self) -> Result<Repository<T>, ServiceError> {
        Ok(Repository::new(self.require_store().await?))
    }

    /// Install a new store implementation and leave degraded mode.
    pub async fn install_store(&self, store: Arc<dyn DocumentStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.store.read().await;
        guard.is_none()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Latest trained collaborative-filtering model.
    pub async fn model(&self) -> Option<Arc<TrainedModel>> {
        self.model.read().await.clone()
    }

    pub async fn install_model(&self, model: Arc<TrainedModel>) {
        *self.model.write().await = Some(model);
    }

    /// Broadcast the degraded flag when the value changes.
    fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::dao::{document_store::memory::MemoryStore, models::ensure_indexes};

    /// Fresh state backed by an indexed in-memory store.
    pub async fn memory_state() -> SharedState {
        let state = AppState::new(AppConfig::for_tests());
        let store = Arc::new(MemoryStore::new());
        ensure_indexes(store.as_ref())
            .await
            .expect("memory indexes");
        state.install_store(store).await;
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starts_degraded_until_a_store_is_installed() {
        let state = AppState::new(AppConfig::for_tests());
        assert!(state.is_degraded().await);
        assert!(matches!(
            state.require_store().await,
            Err(ServiceError::Degraded)
        ));

        let watcher = state.degraded_watcher();
        state
            .install_store(Arc::new(crate::dao::document_store::memory::MemoryStore::new()))
            .await;
        assert!(!state.is_degraded().await);
        assert!(!*watcher.borrow());

        state.clear_store().await;
        assert!(state.is_degraded().await);
        assert!(*watcher.borrow());
    }
}
