//! Hosted data backend integration for lumen
//!
//! Profile records and chat histories live in a PostgREST-compatible
//! backend; this crate implements `lumen_core::store::DocumentStore` on top
//! of it and picks the configured backend at startup.

pub mod rest;

pub use rest::RestStore;

use lumen_core::config::{StorageBackend, StorageConfig};
use lumen_core::store::{DocumentStore, FileStore, MemoryStore};
use lumen_core::utils::expand_tilde;
use std::sync::Arc;

/// Open the document store selected by the storage configuration
pub fn open_store(config: &StorageConfig) -> Arc<dyn DocumentStore> {
    match config.backend {
        StorageBackend::File => Arc::new(FileStore::new(expand_tilde(&config.dir))),
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
        StorageBackend::Rest => Arc::new(RestStore::from_config(&config.rest)),
    }
}
