pub mod catalog;
pub mod loadout;
pub mod room;
pub mod state_machine;
pub mod transitions;

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{RwLock, watch};
use tracing::debug;
use utoipa::ToSchema;

use crate::{
    config::{AppConfig, StorageConfig, StorageMode},
    dao::room_store::{InMemoryRoomStore, RoomStore},
    error::ServiceError,
    state::{catalog::CardCatalog, state_machine::MatchRules, transitions::RetryPolicy},
};

pub type SharedState = Arc<AppState>;

/// Which store is currently answering requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StorageStatus {
    /// Memory mode by configuration.
    Memory,
    /// Durable backend connected.
    Durable,
    /// Durable backend down, memory fallback in use.
    Fallback,
    /// Durable backend down and no fallback allowed.
    Unavailable,
}

/// Central application state: storage handles, catalog and rules.
pub struct AppState {
    durable_store: RwLock<Option<Arc<dyn RoomStore>>>,
    memory_store: Arc<InMemoryRoomStore>,
    storage: StorageConfig,
    catalog: CardCatalog,
    rules: MatchRules,
    retry: RetryPolicy,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// Durable modes start degraded until the supervisor installs a store.
    pub fn new(config: AppConfig) -> SharedState {
        let durable = config.storage.mode != StorageMode::Memory;
        let (degraded_tx, _rx) = watch::channel(durable);
        Arc::new(Self {
            durable_store: RwLock::new(None),
            memory_store: Arc::new(InMemoryRoomStore::new()),
            storage: config.storage,
            catalog: config.catalog,
            rules: config.rules,
            retry: config.retry,
            degraded: degraded_tx,
        })
    }

    /// Install a connected durable store and leave degraded mode.
    pub async fn set_room_store(&self, store: Arc<dyn RoomStore>) {
        {
            let mut guard = self.durable_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Drop the durable store and enter degraded mode.
    pub async fn clear_room_store(&self) {
        {
            let mut guard = self.durable_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Store that should serve the next request.
    pub async fn room_store(&self) -> Result<Arc<dyn RoomStore>, ServiceError> {
        if self.storage.mode == StorageMode::Memory {
            return Ok(self.memory_store.clone());
        }
        if !self.is_degraded() {
            if let Some(store) = self.durable_store.read().await.clone() {
                return Ok(store);
            }
        }
        if self.storage.fallback_to_memory {
            debug!("durable storage unavailable; serving from memory");
            return Ok(self.memory_store.clone());
        }
        Err(ServiceError::Degraded)
    }

    /// Enter degraded mode after the durable store failed during a request and
    /// hand out the memory store, when fallback is allowed.
    pub fn degrade_to_memory(&self) -> Option<Arc<dyn RoomStore>> {
        if self.storage.mode == StorageMode::Memory || !self.storage.fallback_to_memory {
            return None;
        }
        self.update_degraded(true);
        Some(self.memory_store.clone())
    }

    pub async fn storage_status(&self) -> StorageStatus {
        if self.storage.mode == StorageMode::Memory {
            return StorageStatus::Memory;
        }
        let connected = self.durable_store.read().await.is_some();
        match (connected && !self.is_degraded(), self.storage.fallback_to_memory) {
            (true, _) => StorageStatus::Durable,
            (false, true) => StorageStatus::Fallback,
            (false, false) => StorageStatus::Unavailable,
        }
    }

    pub fn storage_config(&self) -> &StorageConfig {
        &self.storage
    }

    pub fn catalog(&self) -> &CardCatalog {
        &self.catalog
    }

    pub fn rules(&self) -> &MatchRules {
        &self.rules
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }
}
