// crates/server/src/state.rs
//! Application state for the Axum server.

use std::sync::Arc;
use std::time::Instant;

use lada_core::memory::InMemoryStore;
use lada_core::store::FacilityDirectory;
use lada_server_jobs::{JobRegistry, RegistryConfig};

use crate::config::ServiceConfig;
use crate::jobs::Collaborators;
use crate::managers::{ExportJobManager, ImportJobManager};

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    /// The one registry both managers submit into.
    pub registry: Arc<JobRegistry>,
    pub exports: ExportJobManager,
    pub imports: ImportJobManager,
    /// Resolves the `X-LADA-MST` header before an import job is created.
    pub facilities: Arc<dyn FacilityDirectory>,
    pub config: ServiceConfig,
}

impl AppState {
    pub fn new(
        registry: Arc<JobRegistry>,
        collaborators: Collaborators,
        config: ServiceConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            start_time: Instant::now(),
            facilities: Arc::clone(&collaborators.facilities),
            exports: ExportJobManager::new(Arc::clone(&registry), collaborators.clone()),
            imports: ImportJobManager::new(Arc::clone(&registry), collaborators),
            registry,
            config,
        })
    }

    /// State with every collaborator backed by `store`.
    pub fn in_memory(
        store: Arc<InMemoryStore>,
        registry_config: RegistryConfig,
        config: ServiceConfig,
    ) -> Arc<Self> {
        let registry = JobRegistry::new(registry_config, store.clone());
        Self::new(registry, Collaborators::in_memory(store), config)
    }

    /// Get the server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
